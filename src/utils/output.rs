//! # 美化输出工具
//!
//! 提供统一的终端输出样式。诊断日志走 `tracing`（stderr），
//! 这里只负责面向用户的结果与提示。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 模块和 `batch/runner.rs` 使用
//! - 使用 `colored` crate

use crate::acquire::Provenance;

use colored::Colorize;

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印跳过消息
pub fn print_skip(msg: &str) {
    println!("{} {}", "[SKIP]".dimmed(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 按结构来源着色打印
pub fn print_source(provenance: Provenance, msg: &str) {
    let tag = format!("[{}]", provenance.as_str().to_uppercase());
    let tag = match provenance {
        Provenance::Database => tag.green(),
        Provenance::Substitution => tag.cyan(),
        Provenance::Prototype => tag.yellow(),
        Provenance::Emergency => tag.red(),
    };
    println!("{} {}", tag.bold(), msg);
}
