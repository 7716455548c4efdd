//! # 统一错误处理模块
//!
//! 定义 crysfetch 工具层面的错误类型，使用 `thiserror` 派生。
//!
//! 结构获取流水线内部的失败不会以该类型抛给调用者，
//! 而是折叠为各阶段的 `Lookup::Failed`，见 `acquire/`。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// crysfetch 统一错误类型
#[derive(Error, Debug)]
pub enum CrysfetchError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Invalid formula '{formula}': {reason}")]
    InvalidFormula { formula: String, reason: String },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    // ─────────────────────────────────────────────────────────────
    // 外部数据库错误
    // ─────────────────────────────────────────────────────────────
    #[error("Database request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Database returned HTTP {status} for '{formula}'")]
    HttpStatus { status: u16, formula: String },

    // ─────────────────────────────────────────────────────────────
    // 配置与参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid configuration from {path}\nReason: {reason}")]
    ConfigError { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 序列化错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No formulas found in: {source_name}")]
    NoFormulas { source_name: String },
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, CrysfetchError>;
