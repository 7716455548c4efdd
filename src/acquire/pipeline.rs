//! # 流水线编排
//!
//! 单个化学式的状态机，严格按顺序执行，首个成功的阶段即短路：
//!
//! | 阶段 | 重试 | 校验 | 来源 |
//! |------|------|------|------|
//! | 缓存 | - | - | 缓存条目原有来源 |
//! | 数据库 | ✓ | ✓ | `Database` |
//! | 元素替换 | ✓ | ✓ | `Substitution` |
//! | 原型模板 | - | ✓ | `Prototype` |
//! | 应急结构 | - | - | `Emergency` |
//!
//! 化学式无法解析时直接进入应急阶段；化学计量校验失败时跳过数据库与元素替换。
//!
//! ## 依赖关系
//! - 被 `batch/runner.rs` 和 `commands/` 使用
//! - 使用 `acquire/` 下的全部阶段

use super::cache::{CacheEntry, StructureCache};
use super::database::StructureDatabase;
use super::prototype::PrototypeGenerator;
use super::retry::RetryExecutor;
use super::substitution::SubstitutionPredictor;
use super::{emergency, validator, ErrorLog, Provenance};
use crate::models::{Composition, Structure};

/// 体积低于该值时放大晶胞
pub const DEFAULT_MIN_VOLUME: f64 = 1.0;

/// 流水线可调选项
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// 化学计量校验失败时跳过数据库与元素替换
    pub strict_stoichiometry: bool,
    /// 最小晶胞体积 (Å³)
    pub min_volume: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            strict_stoichiometry: true,
            min_volume: DEFAULT_MIN_VOLUME,
        }
    }
}

/// 流水线上下文：缓存、错误日志与外部数据库客户端
#[derive(Default)]
pub struct PipelineContext {
    pub cache: StructureCache,
    pub errors: ErrorLog,
    pub database: Option<Box<dyn StructureDatabase>>,
}

impl PipelineContext {
    pub fn new(database: Option<Box<dyn StructureDatabase>>) -> Self {
        PipelineContext {
            cache: StructureCache::new(),
            errors: ErrorLog::new(),
            database,
        }
    }
}

/// 一次解析的结果
#[derive(Debug, Clone)]
pub struct Resolution {
    pub formula: String,
    pub entry: CacheEntry,
    pub from_cache: bool,
}

impl Resolution {
    pub fn structure(&self) -> &Structure {
        &self.entry.structure
    }

    pub fn provenance(&self) -> Provenance {
        self.entry.provenance
    }
}

/// 结构获取流水线
pub struct StructureAcquisitionPipeline {
    context: PipelineContext,
    retry: RetryExecutor,
    substitution: SubstitutionPredictor,
    prototype: PrototypeGenerator,
    options: PipelineOptions,
}

impl StructureAcquisitionPipeline {
    pub fn new(
        context: PipelineContext,
        retry: RetryExecutor,
        substitution: SubstitutionPredictor,
    ) -> Self {
        Self {
            context,
            retry,
            substitution,
            prototype: PrototypeGenerator,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.context.errors
    }

    pub fn cache(&self) -> &StructureCache {
        &self.context.cache
    }

    pub fn has_database(&self) -> bool {
        self.context.database.is_some()
    }

    /// 解析一个化学式，总能得到恰好一个结构
    pub fn resolve(&mut self, formula: &str) -> Resolution {
        let key = formula.trim();

        if let Some(entry) = self.context.cache.get(key) {
            tracing::debug!(formula = key, source = %entry.provenance, "cache hit");
            return Resolution {
                formula: key.to_string(),
                entry: entry.clone(),
                from_cache: true,
            };
        }

        let entry = self.acquire(key);
        tracing::info!(formula = key, source = %entry.provenance, "structure resolved");
        let entry = self.context.cache.insert(key, entry).clone();

        Resolution {
            formula: key.to_string(),
            entry,
            from_cache: false,
        }
    }

    fn acquire(&mut self, formula: &str) -> CacheEntry {
        let composition = match Composition::parse(formula) {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::warn!(formula, "{}", e);
                self.context.errors.record("parse", formula, e.to_string());
                None
            }
        };

        if let Some(comp) = &composition {
            if let Some(entry) = self.run_stages(formula, comp) {
                return entry;
            }
        }

        CacheEntry::new(
            emergency::generate(formula, composition.as_ref()),
            Provenance::Emergency,
        )
    }

    /// 数据库 → 元素替换 → 原型模板
    fn run_stages(&mut self, formula: &str, comp: &Composition) -> Option<CacheEntry> {
        let plausible = !self.options.strict_stoichiometry || validator::validate(comp);

        if plausible {
            if let Some(entry) = self.database_stage(formula, comp) {
                return Some(entry);
            }
            if let Some(entry) = self.substitution_stage(formula, comp) {
                return Some(entry);
            }
        } else {
            tracing::info!(formula, "unusual stoichiometry, skipping database and substitution");
        }

        let structure = self.prototype.generate(comp)?;
        self.normalize("prototype", comp, structure)
            .map(|s| CacheEntry::new(s, Provenance::Prototype))
    }

    fn database_stage(&mut self, formula: &str, comp: &Composition) -> Option<CacheEntry> {
        let Some(database) = self.context.database.as_deref() else {
            tracing::debug!(formula, "no database configured");
            return None;
        };

        let record = self
            .retry
            .execute("database", formula, &mut self.context.errors, || {
                database.fetch(formula)
            })?;

        let structure = self.normalize("database", comp, record.structure)?;
        let mut entry = CacheEntry::new(structure, Provenance::Database);
        entry.material_id = record.material_id;
        entry.band_gap = record.band_gap;
        Some(entry)
    }

    fn substitution_stage(&mut self, formula: &str, comp: &Composition) -> Option<CacheEntry> {
        let predictor = &self.substitution;
        let structure = self
            .retry
            .execute("substitution", formula, &mut self.context.errors, || {
                predictor.predict(comp)
            })?;

        self.normalize("substitution", comp, structure)
            .map(|s| CacheEntry::new(s, Provenance::Substitution))
    }

    /// 校验并规范化；不合格时记录错误并返回 `None`
    fn normalize(
        &mut self,
        stage: &str,
        comp: &Composition,
        mut structure: Structure,
    ) -> Option<Structure> {
        if let Err(reason) = check_against(&structure, comp) {
            tracing::warn!(stage, formula = comp.formula(), "rejected: {}", reason);
            self.context
                .errors
                .record(stage, comp.formula(), format!("rejected: {}", reason));
            return None;
        }

        let volume = structure.volume();
        if volume < self.options.min_volume {
            if let Err(e) = structure.scale_to_volume(2.0 * volume) {
                self.context.errors.record(stage, comp.formula(), e.to_string());
                return None;
            }
            tracing::debug!(stage, formula = comp.formula(), from = volume, "cell volume doubled");
        }

        structure.sort_sites();
        Some(structure)
    }
}

/// 结构与组分是否相容
fn check_against(structure: &Structure, comp: &Composition) -> std::result::Result<(), String> {
    structure.check_geometry().map_err(|e| e.to_string())?;

    let mut found = structure.elements();
    let mut expected = comp.elements();
    found.sort_unstable();
    expected.sort_unstable();
    if found != expected {
        return Err(format!(
            "elements {:?} do not match composition {:?}",
            found, expected
        ));
    }

    // 非整数组分没有确定的化学式单元，不检查
    if comp.len() >= 3 && comp.reduced_counts().is_some() {
        let n = structure.num_sites();
        match comp.reduced_atom_count() {
            Some(unit) if unit > 0 && n % unit as usize == 0 => {}
            Some(unit) => {
                return Err(format!(
                    "{} sites is not a multiple of formula unit {}",
                    n, unit
                ));
            }
            None => return Err("formula unit too large".to_string()),
        }
    }

    Ok(())
}
