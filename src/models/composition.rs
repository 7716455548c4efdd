//! # 化学式与组分
//!
//! 将化学式字符串（如 `BeAlN2`、`Ca(OH)2`、`Fe0.5Ni0.5`）解析为
//! 有序的 (元素, 数量) 组分。
//!
//! ## 规则
//! - 元素按首次出现的顺序保存，重复元素合并
//! - 数量可以是正整数或小数，省略即为 1
//! - 支持圆括号分组和分组倍数
//! - 未知元素符号、零数量、括号不匹配均视为解析失败
//!
//! ## 依赖关系
//! - 被 `acquire/` 各阶段使用
//! - 使用 `models/element.rs` 校验符号

use crate::error::{CrysfetchError, Result};
use crate::models::element;

use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

/// 判断浮点数量是否为整数的容差
const INTEGER_TOLERANCE: f64 = 1e-6;

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Z][a-z]?)|(\()|(\))|(\d+(?:\.\d+)?|\.\d+)").expect("valid token regex")
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Element(String),
    Open,
    Close,
    Number(f64),
}

/// 化学组分，由化学式解析得到，解析后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    formula: String,
    entries: IndexMap<String, f64>,
}

impl Composition {
    /// 解析化学式
    pub fn parse(formula: &str) -> Result<Self> {
        let compact: String = formula.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = |reason: &str| CrysfetchError::InvalidFormula {
            formula: formula.to_string(),
            reason: reason.to_string(),
        };

        if compact.is_empty() {
            return Err(invalid("empty formula"));
        }

        let tokens = tokenize(&compact).ok_or_else(|| invalid("unexpected character"))?;

        let mut stack: Vec<IndexMap<String, f64>> = vec![IndexMap::new()];
        let mut iter = tokens.into_iter().peekable();

        while let Some(token) = iter.next() {
            match token {
                Token::Element(symbol) => {
                    if !element::is_known(&symbol) {
                        return Err(invalid(&format!("unknown element '{}'", symbol)));
                    }
                    let count = match iter.peek() {
                        Some(Token::Number(n)) => {
                            let n = *n;
                            iter.next();
                            n
                        }
                        _ => 1.0,
                    };
                    if count <= 0.0 {
                        return Err(invalid(&format!("non-positive count for '{}'", symbol)));
                    }
                    // stack 在括号闭合前至少保留一层
                    if let Some(group) = stack.last_mut() {
                        *group.entry(symbol).or_insert(0.0) += count;
                    }
                }
                Token::Open => stack.push(IndexMap::new()),
                Token::Close => {
                    if stack.len() < 2 {
                        return Err(invalid("unbalanced ')'"));
                    }
                    let group = stack.pop().unwrap_or_default();
                    let factor = match iter.peek() {
                        Some(Token::Number(n)) => {
                            let n = *n;
                            iter.next();
                            n
                        }
                        _ => 1.0,
                    };
                    if factor <= 0.0 {
                        return Err(invalid("non-positive group multiplier"));
                    }
                    if let Some(parent) = stack.last_mut() {
                        for (el, count) in group {
                            *parent.entry(el).or_insert(0.0) += count * factor;
                        }
                    }
                }
                Token::Number(_) => return Err(invalid("number without element")),
            }
        }

        if stack.len() != 1 {
            return Err(invalid("unbalanced '('"));
        }

        let entries = stack.pop().unwrap_or_default();
        if entries.is_empty() {
            return Err(invalid("no elements"));
        }
        if entries.values().any(|n| !n.is_finite()) {
            return Err(invalid("count out of range"));
        }

        Ok(Composition {
            formula: compact,
            entries,
        })
    }

    /// 从 (元素, 数量) 列表直接构造，主要用于测试与合成结构
    pub fn from_entries<S: Into<String>>(entries: impl IntoIterator<Item = (S, f64)>) -> Self {
        let mut map: IndexMap<String, f64> = IndexMap::new();
        for (el, count) in entries {
            *map.entry(el.into()).or_insert(0.0) += count;
        }
        let formula = map
            .iter()
            .map(|(el, n)| format_count(el, *n))
            .collect::<String>();
        Composition {
            formula,
            entries: map,
        }
    }

    /// 原始（去空白后的）化学式
    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// 不同元素的数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 元素列表（按出现顺序）
    pub fn elements(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// (元素, 数量) 迭代器
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(el, n)| (el.as_str(), *n))
    }

    /// 第 i 个元素与第 j 个元素的数量比
    pub fn ratio(&self, i: usize, j: usize) -> Option<f64> {
        let a = *self.entries.get_index(i)?.1;
        let b = *self.entries.get_index(j)?.1;
        if b == 0.0 {
            None
        } else {
            Some(a / b)
        }
    }

    /// 全部数量均为整数时返回整数数量
    pub fn integer_counts(&self) -> Option<Vec<u32>> {
        self.entries
            .values()
            .map(|&n| {
                let rounded = n.round();
                if (n - rounded).abs() < INTEGER_TOLERANCE
                    && rounded >= 1.0
                    && rounded <= u32::MAX as f64
                {
                    Some(rounded as u32)
                } else {
                    None
                }
            })
            .collect()
    }

    /// 以最大公约数约化后的整数比例
    pub fn reduced_counts(&self) -> Option<Vec<u32>> {
        let counts = self.integer_counts()?;
        let divisor = counts.iter().copied().fold(0, gcd);
        if divisor == 0 {
            return None;
        }
        Some(counts.into_iter().map(|n| n / divisor).collect())
    }

    /// 约化化学式单元中的原子数，溢出时为 `None`
    pub fn reduced_atom_count(&self) -> Option<u32> {
        self.reduced_counts()?
            .into_iter()
            .try_fold(0u32, |total, n| total.checked_add(n))
    }

    /// 约化化学式，非整数组分原样输出
    pub fn reduced_formula(&self) -> String {
        match self.reduced_counts() {
            Some(counts) => self
                .entries
                .keys()
                .zip(counts)
                .map(|(el, n)| format_count(el, n as f64))
                .collect(),
            None => self.formula.clone(),
        }
    }
}

/// 最大公约数
pub fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn format_count(element: &str, count: f64) -> String {
    if (count - 1.0).abs() < INTEGER_TOLERANCE {
        element.to_string()
    } else if (count - count.round()).abs() < INTEGER_TOLERANCE {
        format!("{}{}", element, count.round() as u64)
    } else {
        format!("{}{}", element, count)
    }
}

/// 将化学式切分为记号，遇到无法识别的字符返回 `None`
fn tokenize(formula: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for caps in token_regex().captures_iter(formula) {
        let whole = caps.get(0)?;
        if whole.start() != cursor {
            return None;
        }
        cursor = whole.end();

        let token = if let Some(m) = caps.get(1) {
            Token::Element(m.as_str().to_string())
        } else if caps.get(2).is_some() {
            Token::Open
        } else if caps.get(3).is_some() {
            Token::Close
        } else {
            Token::Number(whole.as_str().parse().ok()?)
        };
        tokens.push(token);
    }

    if cursor != formula.len() {
        return None;
    }
    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(comp: &Composition, element: &str) -> f64 {
        comp.iter().find(|(el, _)| *el == element).map(|(_, n)| n).unwrap_or(0.0)
    }

    #[test]
    fn test_parse_simple_binary() {
        let comp = Composition::parse("NaCl").unwrap();
        assert_eq!(comp.elements(), vec!["Na", "Cl"]);
        assert_eq!(comp.iter().map(|(_, n)| n).collect::<Vec<_>>(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_parse_ternary_keeps_order() {
        let comp = Composition::parse("BeAlN2").unwrap();
        assert_eq!(comp.elements(), vec!["Be", "Al", "N"]);
        assert!((count(&comp, "N") - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_parentheses_and_duplicates() {
        let comp = Composition::parse("Ca(OH)2").unwrap();
        assert_eq!(comp.elements(), vec!["Ca", "O", "H"]);
        assert!((count(&comp, "O") - 2.0).abs() < 1e-9);
        assert!((count(&comp, "H") - 2.0).abs() < 1e-9);

        let merged = Composition::parse("CH3CH3").unwrap();
        assert!((count(&merged, "C") - 2.0).abs() < 1e-9);
        assert!((count(&merged, "H") - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_fractional_counts() {
        let comp = Composition::parse("Fe0.5Ni0.5").unwrap();
        assert!((count(&comp, "Fe") - 0.5).abs() < 1e-9);
        assert!(comp.integer_counts().is_none());
        assert_eq!(comp.reduced_formula(), "Fe0.5Ni0.5");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Composition::parse("").is_err());
        assert!(Composition::parse("   ").is_err());
        assert!(Composition::parse("Xx2").is_err());
        assert!(Composition::parse("nacl").is_err());
        assert!(Composition::parse("Na0Cl").is_err());
        assert!(Composition::parse("Ca(OH2").is_err());
        assert!(Composition::parse("CaOH)2").is_err());
        assert!(Composition::parse("2NaCl").is_err());
        assert!(Composition::parse("Na-Cl").is_err());
    }

    #[test]
    fn test_reduced_counts() {
        let comp = Composition::parse("Mg2In2P4").unwrap();
        assert_eq!(comp.reduced_counts(), Some(vec![1, 1, 2]));
        assert_eq!(comp.reduced_atom_count(), Some(4));
        assert_eq!(comp.reduced_formula(), "MgInP2");
    }

    #[test]
    fn test_huge_counts_do_not_overflow() {
        let comp = Composition::parse("BeAl4000000000N4000000000").unwrap();
        assert_eq!(comp.reduced_counts(), Some(vec![1, 4_000_000_000, 4_000_000_000]));
        assert_eq!(comp.reduced_atom_count(), None);

        let beyond = Composition::parse("Fe5000000000O").unwrap();
        assert!(beyond.integer_counts().is_none());
        assert_eq!(beyond.reduced_atom_count(), None);

        let digits = format!("Na{}Cl", "9".repeat(400));
        assert!(Composition::parse(&digits).is_err());
    }

    #[test]
    fn test_ratio() {
        let comp = Composition::parse("AlN3").unwrap();
        assert!((comp.ratio(0, 1).unwrap() - 1.0 / 3.0).abs() < 1e-9);
        assert!((comp.ratio(1, 0).unwrap() - 3.0).abs() < 1e-9);
        assert!(comp.ratio(0, 5).is_none());
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(12, 8), 4);
        assert_eq!(gcd(0, 7), 7);
        assert_eq!(gcd(5, 3), 1);
    }
}
