//! # 结构缓存
//!
//! 进程内的化学式 → 结构映射。流水线最先查询、最后写入，
//! 运行期间从不失效，也不跨进程持久化。
//!
//! ## 依赖关系
//! - 被 `acquire/pipeline.rs` 使用

use super::Provenance;
use crate::models::Structure;

use std::collections::HashMap;
use std::sync::Arc;

/// 缓存条目：结构 + 来源 + 数据库附带的标量
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub structure: Arc<Structure>,
    pub provenance: Provenance,
    pub material_id: Option<String>,
    pub band_gap: Option<f64>,
}

impl CacheEntry {
    pub fn new(structure: Structure, provenance: Provenance) -> Self {
        CacheEntry {
            structure: Arc::new(structure),
            provenance,
            material_id: None,
            band_gap: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct StructureCache {
    entries: HashMap<String, CacheEntry>,
}

impl StructureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, formula: &str) -> Option<&CacheEntry> {
        self.entries.get(formula)
    }

    /// 写入条目；同一化学式只保留第一次的结果
    pub fn insert(&mut self, formula: impl Into<String>, entry: CacheEntry) -> &CacheEntry {
        self.entries.entry(formula.into()).or_insert(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 某来源的条目数
    pub fn count_by(&self, provenance: Provenance) -> usize {
        self.entries
            .values()
            .filter(|e| e.provenance == provenance)
            .count()
    }
}
