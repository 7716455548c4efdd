//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `fetch`: 批量获取化学式列表的晶体结构
//! - `resolve`: 解析少量化学式并以表格显示结果
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: fetch, pipeline, resolve

pub mod fetch;
pub mod pipeline;
pub mod resolve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// crysfetch - 晶体结构获取工具
#[derive(Parser)]
#[command(name = "crysfetch")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Obtain a crystal structure for every chemical formula", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ./crysfetch.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch structures for a list of formulas in rate-limited batches
    Fetch(fetch::FetchArgs),

    /// Resolve formulas and print where each structure came from
    Resolve(resolve::ResolveArgs),
}
