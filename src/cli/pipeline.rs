//! # 流水线公共参数
//!
//! `fetch` 与 `resolve` 共用的数据库、重试与替换参数。
//! 未指定的参数沿用配置文件中的值。
//!
//! ## 依赖关系
//! - 被 `cli/fetch.rs`、`cli/resolve.rs` 以 `#[command(flatten)]` 引用
//! - 由 `commands/mod.rs` 合并进配置

use clap::Args;
use std::path::PathBuf;

/// 流水线参数
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Materials Project API key
    #[arg(long, env = "MP_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Materials Project API endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Local structure library directory (used instead of the online database)
    #[arg(long)]
    pub library: Option<PathBuf>,

    /// Skip the database stage entirely
    #[arg(long, default_value_t = false)]
    pub offline: bool,

    /// Attempts per retried stage
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Exponential backoff base
    #[arg(long)]
    pub backoff_base: Option<f64>,

    /// Base delay between attempts (seconds)
    #[arg(long)]
    pub base_delay: Option<f64>,

    /// Minimum similarity score for substitution candidates
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Try the database and substitution even for unusual binary ratios
    #[arg(long, default_value_t = false)]
    pub lenient: bool,
}
