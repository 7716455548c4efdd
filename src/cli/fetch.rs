//! # fetch 子命令 CLI 定义
//!
//! 批量获取晶体结构并写入输出目录
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/fetch.rs`

use super::pipeline::PipelineArgs;
use crate::parsers::StructureFormat;
use clap::Args;
use std::path::PathBuf;

/// fetch 子命令参数
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Formulas to fetch (combined with --input)
    pub formulas: Vec<String>,

    /// Formula list: CSV with a `Formula` column, or one formula per line
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory for structure files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Structure file format
    #[arg(short, long, value_enum)]
    pub format: Option<StructureFormat>,

    /// Formulas per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Pause between batches (seconds)
    #[arg(short, long)]
    pub delay: Option<f64>,

    /// Checkpoint file
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Skip formulas already listed in the checkpoint
    #[arg(long, default_value_t = false)]
    pub resume: bool,

    /// Write a CSV summary report
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}
