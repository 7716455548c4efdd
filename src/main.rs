//! # crysfetch - 晶体结构获取工具
//!
//! 为每个化学式获取一个可用于特征提取的三维晶体结构：
//! 数据库查询 → 元素替换 → 原型模板 → 应急结构，逐级回退，永不空手而归。
//!
//! ## 子命令
//! - `fetch`   - 批量获取并写出结构文件
//! - `resolve` - 解析少量化学式并显示来源
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/     (分批、检查点、化学式收集)
//!   │     ├── acquire/   (结构获取流水线)
//!   │     ├── parsers/   (结构文件读写)
//!   │     └── models/    (组分、结构、元素数据)
//!   ├── config.rs   (TOML 配置)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod acquire;
mod batch;
mod cli;
mod commands;
mod config;
mod error;
mod models;
mod parsers;
mod utils;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

/// 初始化日志：`RUST_LOG` 优先，否则 `-v` 为 debug，默认只输出警告
fn init_logging(verbose: bool) {
    let default = if verbose { "crysfetch=debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = commands::run(cli) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
