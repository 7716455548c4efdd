//! # 检查点
//!
//! 已解析化学式的有序列表，JSON 数组格式，每批结束后整体覆盖写入。
//! 只用于进度提示与手动续跑，不保存结构本身。
//!
//! ## 依赖关系
//! - 被 `batch/runner.rs` 和 `commands/fetch.rs` 使用
//! - 使用 `serde_json`

use crate::error::{CrysfetchError, Result};

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// 检查点文件
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
    writes: usize,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writes: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 本次运行中写入的次数
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// 覆盖写入已解析的化学式（任意可序列化为字符串数组的有序集合）
    pub fn save<T: Serialize + ?Sized>(&mut self, formulas: &T) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CrysfetchError::FileWriteError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let content = serde_json::to_string_pretty(formulas)?;
        fs::write(&self.path, content).map_err(|e| CrysfetchError::FileWriteError {
            path: self.path.display().to_string(),
            source: e,
        })?;

        self.writes += 1;
        tracing::debug!(path = %self.path.display(), writes = self.writes, "checkpoint saved");
        Ok(())
    }

    /// 读取检查点；文件不存在时返回空列表
    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| CrysfetchError::FileReadError {
            path: self.path.display().to_string(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| CrysfetchError::ParseError {
            format: "checkpoint".to_string(),
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_overwrites_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut checkpoint = Checkpoint::new(dir.path().join("state/checkpoint.json"));

        assert!(checkpoint.load().unwrap().is_empty());

        checkpoint.save(&["NaCl".to_string()]).unwrap();
        checkpoint
            .save(&["NaCl".to_string(), "GaN".to_string()])
            .unwrap();

        assert_eq!(checkpoint.writes(), 2);
        assert_eq!(checkpoint.load().unwrap(), vec!["NaCl", "GaN"]);
    }

    #[test]
    fn test_corrupt_checkpoint_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        fs::write(&path, "{\"oops\": 1}").unwrap();

        let err = Checkpoint::new(&path).load().unwrap_err();
        assert!(matches!(err, CrysfetchError::ParseError { .. }));
    }
}
