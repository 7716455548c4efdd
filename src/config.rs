//! # 配置文件
//!
//! 可选的 TOML 配置文件（默认 `crysfetch.toml`），所有字段都有默认值。
//! 优先级：命令行参数 > 配置文件 > 默认值。
//!
//! ```toml
//! [database]
//! endpoint = "https://api.materialsproject.org"
//! api_key = "..."
//! timeout_secs = 30
//! library = "structures/"
//!
//! [retry]
//! max_retries = 3
//! backoff_base = 2.0
//! base_delay_secs = 2.0
//! max_delay_secs = 300.0
//!
//! [batch]
//! batch_size = 5
//! delay_secs = 10.0
//! checkpoint = "checkpoint.json"
//! structure_dir = "structures_out"
//! format = "cif"
//!
//! [substitution]
//! threshold = 0.1
//!
//! [pipeline]
//! strict_stoichiometry = true
//! min_volume = 1.0
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `serde` + `toml`

use crate::acquire::database::DEFAULT_ENDPOINT;
use crate::acquire::pipeline::DEFAULT_MIN_VOLUME;
use crate::acquire::substitution::DEFAULT_THRESHOLD;
use crate::acquire::retry::DEFAULT_MAX_DELAY;
use crate::acquire::{PipelineOptions, RetryPolicy};
use crate::error::{CrysfetchError, Result};
use crate::parsers::StructureFormat;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "crysfetch.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub batch: BatchConfig,
    pub substitution: SubstitutionConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// 本地结构库目录
    pub library: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout_secs: 30,
            library: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_base: f64,
    pub base_delay_secs: f64,
    /// 单次等待上限
    pub max_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 3,
            backoff_base: 2.0,
            base_delay_secs: 2.0,
            max_delay_secs: DEFAULT_MAX_DELAY.as_secs_f64(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_base: self.backoff_base,
            base_delay: seconds(self.base_delay_secs),
            max_delay: seconds(self.max_delay_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub delay_secs: f64,
    pub checkpoint: PathBuf,
    pub structure_dir: PathBuf,
    pub format: StructureFormat,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            batch_size: 5,
            delay_secs: 10.0,
            checkpoint: PathBuf::from("checkpoint.json"),
            structure_dir: PathBuf::from("structures_out"),
            format: StructureFormat::Cif,
        }
    }
}

impl BatchConfig {
    pub fn delay(&self) -> Duration {
        seconds(self.delay_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SubstitutionConfig {
    pub threshold: f64,
}

impl Default for SubstitutionConfig {
    fn default() -> Self {
        SubstitutionConfig {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub strict_stoichiometry: bool,
    pub min_volume: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            strict_stoichiometry: true,
            min_volume: DEFAULT_MIN_VOLUME,
        }
    }
}

impl PipelineConfig {
    pub fn options(&self) -> PipelineOptions {
        PipelineOptions {
            strict_stoichiometry: self.strict_stoichiometry,
            min_volume: self.min_volume,
        }
    }
}

impl Config {
    /// 读取配置文件
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CrysfetchError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| CrysfetchError::ConfigError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate(&path.display().to_string())?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// 显式路径必须存在；未指定时读取当前目录下的默认文件（如果有）
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// 检查取值范围；`source` 标明取值来自哪里（配置文件路径或命令行）
    pub fn validate(&self, source: &str) -> Result<()> {
        self.check().map_err(|reason| CrysfetchError::ConfigError {
            path: source.to_string(),
            reason,
        })
    }

    fn check(&self) -> std::result::Result<(), String> {
        if !(self.retry.backoff_base.is_finite() && self.retry.backoff_base >= 1.0) {
            return Err("retry.backoff_base must be >= 1".to_string());
        }
        for (name, value) in [
            ("retry.base_delay_secs", self.retry.base_delay_secs),
            ("retry.max_delay_secs", self.retry.max_delay_secs),
            ("batch.delay_secs", self.batch.delay_secs),
            ("pipeline.min_volume", self.pipeline.min_volume),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(format!("{} must be a non-negative number", name));
            }
        }
        if !(0.0..=1.0).contains(&self.substitution.threshold) {
            return Err("substitution.threshold must be within [0, 1]".to_string());
        }
        Ok(())
    }
}

/// 非负秒数 → Duration
pub fn seconds(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [retry]
            max_retries = 5

            [batch]
            format = "poscar"
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.max_retries, 5);
        assert!((config.retry.backoff_base - 2.0).abs() < 1e-12);
        assert_eq!(config.batch.batch_size, 5);
        assert_eq!(config.batch.format, StructureFormat::Poscar);
        assert_eq!(config.database.endpoint, DEFAULT_ENDPOINT);
        assert!(config.pipeline.strict_stoichiometry);
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crysfetch.toml");

        std::fs::write(&path, "[retry]\nbackoff_base = 0.5\n").unwrap();
        assert!(matches!(Config::load(&path), Err(CrysfetchError::ConfigError { .. })));

        std::fs::write(&path, "[batch]\nbatchsize = 3\n").unwrap();
        assert!(matches!(Config::load(&path), Err(CrysfetchError::ConfigError { .. })));

        std::fs::write(&path, "[substitution]\nthreshold = 0.3\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert!((config.substitution.threshold - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_conversions() {
        let retry = RetryConfig {
            max_retries: 4,
            backoff_base: 3.0,
            base_delay_secs: 0.5,
            max_delay_secs: 3.0,
        };
        let policy = retry.policy();
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(3));
        assert_eq!(seconds(-1.0), Duration::ZERO);
        assert_eq!(BatchConfig::default().delay(), Duration::from_secs(10));
    }
}
