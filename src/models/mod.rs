//! # 数据模型模块
//!
//! 定义化学组分、晶体结构和元素性质数据模型。
//!
//! ## 依赖关系
//! - 被 `acquire/`、`parsers/` 和 `batch/` 使用
//! - 子模块: composition, element, structure

pub mod composition;
pub mod element;
pub mod structure;

pub use composition::Composition;
pub use structure::{Lattice, Site, Structure};
