//! # resolve 子命令 CLI 定义
//!
//! 解析化学式并以表格显示结构来源
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/resolve.rs`

use super::pipeline::PipelineArgs;
use crate::parsers::StructureFormat;
use clap::Args;
use std::path::PathBuf;

/// resolve 子命令参数
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Formulas to resolve
    #[arg(required = true)]
    pub formulas: Vec<String>,

    /// Also write each structure into this directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Structure file format (with --output)
    #[arg(short, long, value_enum, default_value_t = StructureFormat::Cif)]
    pub format: StructureFormat,

    /// Print the error log after the table
    #[arg(long, default_value_t = false)]
    pub show_errors: bool,

    /// Also print the atomic properties of every element involved
    #[arg(long, default_value_t = false)]
    pub elements: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}
