//! # 化学计量校验
//!
//! 二元组分只接受常见比例（1:1、1:2、1:3 系列），
//! 其他元素数的组分直接通过，三元及以上留给位点数匹配校验。
//!
//! 以 `false` 表示不合法而不是返回错误，调用方直接分支即可。
//!
//! ## 依赖关系
//! - 被 `acquire/prototype.rs` 和 `acquire/pipeline.rs` 使用
//! - 使用 `models/composition.rs`

use crate::models::Composition;

/// 允许的二元数量比
pub const BINARY_RATIOS: [f64; 5] = [1.0, 0.5, 2.0, 1.0 / 3.0, 3.0];

/// 比例容差
pub const RATIO_TOLERANCE: f64 = 0.01;

/// 检查组分的化学计量是否可用
pub fn validate(composition: &Composition) -> bool {
    if composition.len() != 2 {
        return true;
    }

    match composition.ratio(0, 1) {
        Some(ratio) if ratio.is_finite() => BINARY_RATIOS
            .iter()
            .any(|r| (ratio - r).abs() < RATIO_TOLERANCE),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(formula: &str) -> Composition {
        Composition::parse(formula).unwrap()
    }

    #[test]
    fn test_common_binary_ratios_accepted() {
        assert!(validate(&comp("NaCl")));
        assert!(validate(&comp("TiO2")));
        assert!(validate(&comp("O2Ti")));
        assert!(validate(&comp("AlN3")));
        assert!(validate(&comp("N3Al")));
        assert!(validate(&comp("Mg2Si4")));
    }

    #[test]
    fn test_uncommon_binary_ratio_rejected() {
        let skewed = Composition::from_entries([("Na", 1.0), ("Cl", 1.7)]);
        assert!(!validate(&skewed));
        assert!(!validate(&comp("Fe2O3")));
        assert!(!validate(&comp("CN4")));
    }

    #[test]
    fn test_non_binary_always_accepted() {
        assert!(validate(&comp("Fe")));
        assert!(validate(&comp("BeAlN2")));
        assert!(validate(&comp("Cu2ZnSnS4")));
    }

    #[test]
    fn test_zero_count_rejected() {
        let broken = Composition::from_entries([("Na", 1.0), ("Cl", 0.0)]);
        assert!(!validate(&broken));
    }
}
