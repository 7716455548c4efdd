//! # 批量处理模块
//!
//! 在化学式列表上驱动结构获取流水线。
//!
//! ## 功能
//! - 从命令行、CSV 或文本文件收集化学式
//! - 分批顺序处理，批次间限速
//! - 检查点与续跑
//! - 进度反馈与统计
//!
//! ## 依赖关系
//! - 被 `commands/fetch.rs` 使用
//! - 使用 `acquire/` 流水线
//! - 使用 `indicatif` 显示进度

pub mod checkpoint;
pub mod collector;
pub mod runner;

pub use checkpoint::Checkpoint;
pub use collector::FormulaCollector;
pub use runner::{BatchProcessor, BatchSummary, Outcome, ResolvedRecord};
