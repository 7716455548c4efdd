//! # 应急结构
//!
//! 流水线的最后一级，没有失败路径：立方晶胞 (a = 4.0 Å)，原点处一个原子。
//! 生成的结构没有物理意义，以 `Provenance::Emergency` 标记供下游过滤。
//!
//! ## 依赖关系
//! - 被 `acquire/pipeline.rs` 和 `batch/runner.rs` 使用

use crate::models::{Composition, Lattice, Site, Structure};

/// 应急晶胞边长 (Å)
pub const EMERGENCY_LATTICE: f64 = 4.0;

/// 组分为空或无法解析时使用的占位元素
pub const PLACEHOLDER_ELEMENT: &str = "H";

/// 生成应急结构
///
/// 结构以组分化学式命名；无法解析时沿用原始输入，写出的文件仍能对应到输入。
pub fn generate(formula: &str, composition: Option<&Composition>) -> Structure {
    let element = composition
        .and_then(|c| c.elements().first().copied())
        .unwrap_or(PLACEHOLDER_ELEMENT)
        .to_string();
    let name = match composition {
        Some(c) if !c.formula().is_empty() => c.formula(),
        _ if !formula.trim().is_empty() => formula.trim(),
        _ => PLACEHOLDER_ELEMENT,
    }
    .to_string();

    tracing::warn!(formula = %name, element = %element, "using emergency structure");
    Structure::new(
        name,
        Lattice::cubic(EMERGENCY_LATTICE),
        vec![Site::new(element, [0.0, 0.0, 0.0])],
    )
}

/// 为任意名称生成占位结构（批处理出错时写入 `_ERROR` 文件）
pub fn placeholder(name: &str) -> Structure {
    generate(name, None)
}
