//! # 化学式收集器
//!
//! 从命令行参数与输入文件收集待处理的化学式列表。
//!
//! ## 功能
//! - `.csv` 文件：读取 `Formula`/`formula` 列，没有时取第一列
//! - 其他文件：每行一个化学式，忽略空行与 `#` 注释
//! - 去除首尾空白并按首次出现顺序去重
//!
//! ## 依赖关系
//! - 被 `commands/fetch.rs` 调用
//! - 使用 `csv` 读取表格

use crate::error::{CrysfetchError, Result};

use std::fs;
use std::path::{Path, PathBuf};

/// 识别为化学式列的表头
const FORMULA_COLUMNS: [&str; 2] = ["Formula", "formula"];

/// 化学式收集器
#[derive(Debug, Default)]
pub struct FormulaCollector {
    /// 直接给出的化学式
    formulas: Vec<String>,
    /// 输入文件
    inputs: Vec<PathBuf>,
}

impl FormulaCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加命令行中的化学式
    pub fn with_formulas(mut self, formulas: &[String]) -> Self {
        self.formulas.extend(formulas.iter().cloned());
        self
    }

    /// 添加输入文件
    pub fn with_input(mut self, input: Option<PathBuf>) -> Self {
        self.inputs.extend(input);
        self
    }

    /// 收集并去重
    pub fn collect(&self) -> Result<Vec<String>> {
        let mut all = self.formulas.clone();
        for input in &self.inputs {
            all.extend(read_formulas(input)?);
        }

        let mut seen = std::collections::HashSet::new();
        let unique: Vec<String> = all
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .filter(|f| seen.insert(f.clone()))
            .collect();

        if unique.is_empty() {
            return Err(CrysfetchError::NoFormulas {
                source_name: self.source_name(),
            });
        }
        Ok(unique)
    }

    fn source_name(&self) -> String {
        if self.inputs.is_empty() {
            "command line".to_string()
        } else {
            self.inputs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// 按扩展名读取单个文件
fn read_formulas(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(CrysfetchError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        read_csv(path)
    } else {
        read_lines(path)
    }
}

fn read_csv(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = headers
        .iter()
        .position(|h| FORMULA_COLUMNS.contains(&h.trim()))
        .unwrap_or(0);

    let mut formulas = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(column) {
            formulas.push(value.to_string());
        }
    }

    tracing::debug!(path = %path.display(), column, rows = formulas.len(), "read formula table");
    Ok(formulas)
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| CrysfetchError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_formula_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chalcopyrites.csv");
        fs::write(
            &path,
            "id,Formula,band_gap\n1,CuInS2,1.5\n2,CuGaS2,2.4\n3, CuInS2 ,1.5\n",
        )
        .unwrap();

        let formulas = FormulaCollector::new().with_input(Some(path)).collect().unwrap();
        assert_eq!(formulas, vec!["CuInS2", "CuGaS2"]);
    }

    #[test]
    fn test_csv_without_formula_header_uses_first_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.csv");
        fs::write(&path, "compound,gap\nGaN,3.4\nAlN,6.2\n").unwrap();

        let formulas = FormulaCollector::new().with_input(Some(path)).collect().unwrap();
        assert_eq!(formulas, vec!["GaN", "AlN"]);
    }

    #[test]
    fn test_text_file_and_arguments_merge_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formulas.txt");
        fs::write(&path, "# targets\nZnO\n\nNaCl\n").unwrap();

        let formulas = FormulaCollector::new()
            .with_formulas(&["NaCl".to_string(), "Si".to_string()])
            .with_input(Some(path))
            .collect()
            .unwrap();
        assert_eq!(formulas, vec!["NaCl", "Si", "ZnO"]);
    }

    #[test]
    fn test_empty_and_missing_inputs() {
        assert!(matches!(
            FormulaCollector::new().collect(),
            Err(CrysfetchError::NoFormulas { .. })
        ));
        assert!(matches!(
            FormulaCollector::new()
                .with_input(Some(PathBuf::from("/no/such/list.txt")))
                .collect(),
            Err(CrysfetchError::FileNotFound { .. })
        ));
    }
}
