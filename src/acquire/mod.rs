//! # 结构获取流水线
//!
//! 对单个化学式按固定优先级获取晶体结构：
//!
//! ```text
//! 缓存 → 数据库(重试) → 元素替换(重试) → 原型模板 → 应急结构
//! ```
//!
//! 任一阶段成功即短路；除应急阶段外的结果都要经过校验与规范化。
//! 流水线对调用者永不失败：每个非空化学式都恰好得到一个结构。
//!
//! ## 依赖关系
//! - 被 `batch/` 和 `commands/` 使用
//! - 使用 `models/`、`parsers/pymatgen.rs`
//! - 子模块: cache, database, emergency, pipeline, prototype, retry,
//!   substitution, validator

pub mod cache;
pub mod database;
pub mod emergency;
pub mod pipeline;
pub mod prototype;
pub mod retry;
pub mod substitution;
pub mod validator;

pub use cache::{CacheEntry, StructureCache};
pub use database::{LocalLibrary, MaterialsProjectClient, StructureDatabase};
pub use pipeline::{PipelineContext, PipelineOptions, Resolution, StructureAcquisitionPipeline};
pub use retry::{RetryExecutor, RetryPolicy, Sleeper, ThreadSleeper};
pub use substitution::SubstitutionPredictor;

use serde::Serialize;
use std::fmt;

/// 结构来源标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Database,
    Substitution,
    Prototype,
    Emergency,
}

impl Provenance {
    pub const ALL: [Provenance; 4] = [
        Provenance::Database,
        Provenance::Substitution,
        Provenance::Prototype,
        Provenance::Emergency,
    ];

    /// 持久化文件名后缀
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Provenance::Database => "",
            Provenance::Substitution => "_sub",
            Provenance::Prototype => "_proto",
            Provenance::Emergency => "_fallback",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Database => "database",
            Provenance::Substitution => "substitution",
            Provenance::Prototype => "prototype",
            Provenance::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次阶段调用的结果
///
/// `Empty` 表示“该阶段没有结构”，与 `Failed` 的区别在于后者携带错误信息，
/// 重试耗尽时会写入错误日志。
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    Empty,
    Failed(String),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::Empty,
        }
    }
}

/// 错误日志中的一条记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub stage: String,
    pub formula: String,
    pub message: String,
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.formula, self.message)
    }
}

/// 只追加的错误日志，供运行结束后诊断
#[derive(Debug, Default, Clone)]
pub struct ErrorLog {
    entries: Vec<ErrorEntry>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: &str, formula: &str, message: impl Into<String>) {
        self.entries.push(ErrorEntry {
            stage: stage.to_string(),
            formula: formula.to_string(),
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    /// 某个化学式的全部记录
    pub fn for_formula<'a>(&'a self, formula: &'a str) -> impl Iterator<Item = &'a ErrorEntry> {
        self.entries.iter().filter(move |e| e.formula == formula)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_suffixes() {
        assert_eq!(Provenance::Database.file_suffix(), "");
        assert_eq!(Provenance::Substitution.file_suffix(), "_sub");
        assert_eq!(Provenance::Prototype.file_suffix(), "_proto");
        assert_eq!(Provenance::Emergency.file_suffix(), "_fallback");
        assert_eq!(Provenance::Prototype.to_string(), "prototype");
    }

    #[test]
    fn test_lookup_conversions() {
        assert_eq!(Lookup::from(Some(3)), Lookup::Found(3));
        assert_eq!(Lookup::<i32>::from(None), Lookup::Empty);
        assert_eq!(Lookup::Found(2).found(), Some(2));
        assert!(Lookup::<i32>::Failed("x".into()).found().is_none());
    }

    #[test]
    fn test_error_log_filters_by_formula() {
        let mut log = ErrorLog::new();
        log.record("database", "NaCl", "timeout");
        log.record("validate", "AlN3", "empty site list");
        log.record("database", "NaCl", "HTTP 503");

        assert_eq!(log.len(), 3);
        assert_eq!(log.for_formula("NaCl").count(), 2);
        assert_eq!(
            log.entries()[1].to_string(),
            "[validate] AlN3: empty site list"
        );
    }
}
