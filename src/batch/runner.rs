//! # 批量执行器
//!
//! 按固定大小分批驱动流水线，单线程顺序执行。
//!
//! ## 功能
//! - 每个化学式在 panic 边界内解析，意外缺陷记录为 `Outcome::Failed`
//! - 结构文件按来源加后缀写入输出目录
//! - 每批结束后覆盖写入检查点，批次之间限速等待
//! - 进度条显示与成功率统计
//!
//! ## 依赖关系
//! - 被 `commands/fetch.rs` 调用
//! - 使用 `acquire/pipeline.rs`、`batch/checkpoint.rs`、`parsers/`
//! - 使用 `indicatif` 显示进度

use super::checkpoint::Checkpoint;
use crate::acquire::{emergency, Provenance, Resolution, Sleeper, StructureAcquisitionPipeline};
use crate::error::{CrysfetchError, Result};
use crate::parsers::{self, StructureFormat};
use crate::utils::output;

use indexmap::{IndexMap, IndexSet};
use indicatif::ProgressBar;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// 成功解析的记录
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    pub provenance: Provenance,
    pub space_group: Option<String>,
    pub path: PathBuf,
    pub sites: usize,
    pub volume: f64,
    pub material_id: Option<String>,
    pub band_gap: Option<f64>,
}

/// 单个化学式的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Resolved(ResolvedRecord),
    /// 意外缺陷（panic 或写文件失败）
    Failed(String),
}

impl Outcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Outcome::Resolved(_))
    }
}

/// 批量处理结果统计
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub resolved: usize,
    pub failed: usize,
    by_provenance: HashMap<Provenance, usize>,
    /// 失败详情 (化学式, 错误信息)
    pub failures: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &IndexMap<String, Outcome>) -> Self {
        let mut summary = Self::default();
        for (formula, outcome) in outcomes {
            summary.merge(formula, outcome);
        }
        summary
    }

    /// 合并处理结果
    pub fn merge(&mut self, formula: &str, outcome: &Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Resolved(record) => {
                self.resolved += 1;
                *self.by_provenance.entry(record.provenance).or_insert(0) += 1;
            }
            Outcome::Failed(err) => {
                self.failed += 1;
                self.failures.push((formula.to_string(), err.clone()));
            }
        }
    }

    pub fn count(&self, provenance: Provenance) -> usize {
        self.by_provenance.get(&provenance).copied().unwrap_or(0)
    }

    /// resolved / total，空运行为 0
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.resolved as f64 / self.total as f64
        }
    }
}

/// 批量执行器
pub struct BatchProcessor<'a> {
    pipeline: &'a mut StructureAcquisitionPipeline,
    output_dir: PathBuf,
    format: StructureFormat,
    checkpoint: Option<Checkpoint>,
    sleeper: Arc<dyn Sleeper>,
    progress: Option<ProgressBar>,
    /// 已写入检查点的化学式（含续跑前的记录）
    resolved: IndexSet<String>,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(
        pipeline: &'a mut StructureAcquisitionPipeline,
        output_dir: impl Into<PathBuf>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            pipeline,
            output_dir: output_dir.into(),
            format: StructureFormat::default(),
            checkpoint: None,
            sleeper,
            progress: None,
            resolved: IndexSet::new(),
        }
    }

    pub fn with_format(mut self, format: StructureFormat) -> Self {
        self.format = format;
        self
    }

    /// 设置检查点及其中已有的化学式
    pub fn with_checkpoint(mut self, checkpoint: Checkpoint, previous: Vec<String>) -> Self {
        self.checkpoint = Some(checkpoint);
        self.resolved = previous.into_iter().collect();
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoint.as_ref()
    }

    /// 分批处理全部化学式，结果保持输入顺序
    pub fn process(
        &mut self,
        formulas: &[String],
        batch_size: usize,
        delay: Duration,
    ) -> IndexMap<String, Outcome> {
        let batch_size = batch_size.max(1);
        let batches: Vec<&[String]> = formulas.chunks(batch_size).collect();
        let mut outcomes = IndexMap::with_capacity(formulas.len());

        for (index, batch) in batches.iter().enumerate() {
            tracing::info!(
                batch = index + 1,
                of = batches.len(),
                size = batch.len(),
                "processing batch"
            );

            for formula in batch.iter() {
                if let Some(pb) = &self.progress {
                    pb.set_message(formula.clone());
                }

                let outcome = self.process_one(formula);
                if outcome.is_resolved() {
                    self.resolved.insert(formula.clone());
                }
                outcomes.insert(formula.clone(), outcome);

                if let Some(pb) = &self.progress {
                    pb.inc(1);
                }
            }

            self.save_checkpoint();

            if index + 1 < batches.len() && !delay.is_zero() {
                tracing::debug!("rate limit: sleeping {:?}", delay);
                self.sleeper.sleep(delay);
            }
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }

        outcomes
    }

    fn process_one(&mut self, formula: &str) -> Outcome {
        let pipeline = &mut *self.pipeline;
        let resolved = panic::catch_unwind(AssertUnwindSafe(|| pipeline.resolve(formula)));

        match resolved {
            Ok(resolution) => match self.persist(&resolution) {
                Ok(path) => {
                    let structure = resolution.structure();
                    Outcome::Resolved(ResolvedRecord {
                        provenance: resolution.provenance(),
                        space_group: structure.space_group.clone(),
                        path,
                        sites: structure.num_sites(),
                        volume: structure.volume(),
                        material_id: resolution.entry.material_id.clone(),
                        band_gap: resolution.entry.band_gap,
                    })
                }
                Err(e) => self.defect(formula, e.to_string()),
            },
            Err(payload) => self.defect(formula, panic_message(payload.as_ref())),
        }
    }

    fn persist(&self, resolution: &Resolution) -> Result<PathBuf> {
        let stem = format!(
            "{}{}",
            file_stem(&resolution.formula),
            resolution.provenance().file_suffix()
        );
        let path = self.output_dir.join(self.format.file_name(&stem));
        parsers::write_structure(&path, resolution.structure(), self.format)?;
        Ok(path)
    }

    /// 意外缺陷：记录日志，尽力写入 `_ERROR` 占位文件
    fn defect(&self, formula: &str, message: String) -> Outcome {
        tracing::error!(formula, "unexpected failure: {}", message);
        self.warn(&format!("{}: {}", formula, message));

        let path = self
            .output_dir
            .join(format!("{}_ERROR.cif", file_stem(formula)));
        let placeholder = emergency::placeholder(formula);
        if let Err(e) = parsers::write_structure(&path, &placeholder, StructureFormat::Cif) {
            tracing::warn!(path = %path.display(), "could not write error placeholder: {}", e);
        }

        Outcome::Failed(message)
    }

    fn save_checkpoint(&mut self) {
        let Some(checkpoint) = self.checkpoint.as_mut() else {
            return;
        };
        if let Err(e) = checkpoint.save(&self.resolved) {
            tracing::warn!("{}", e);
            let path = checkpoint.path().display().to_string();
            self.warn(&format!("Checkpoint not saved: {}", path));
        }
    }

    fn warn(&self, msg: &str) {
        match &self.progress {
            Some(pb) => pb.suspend(|| output::print_warning(msg)),
            None => output::print_warning(msg),
        }
    }
}

/// 化学式 → 安全的文件名主干
pub fn file_stem(formula: &str) -> String {
    let stem: String = formula
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "()._-".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic: unknown payload".to_string()
    }
}

/// 创建输出目录
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| CrysfetchError::FileWriteError {
        path: dir.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::database::DatabaseRecord;
    use crate::acquire::retry::tests::RecordingSleeper;
    use crate::acquire::{
        Lookup, PipelineContext, RetryExecutor, RetryPolicy, StructureDatabase,
        SubstitutionPredictor,
    };

    fn pipeline(database: Option<Box<dyn StructureDatabase>>) -> StructureAcquisitionPipeline {
        let retry = RetryExecutor::new(
            RetryPolicy {
                max_retries: 1,
                ..RetryPolicy::default()
            },
            Arc::new(RecordingSleeper::default()),
        );
        StructureAcquisitionPipeline::new(
            PipelineContext::new(database),
            retry,
            SubstitutionPredictor::default(),
        )
    }

    fn formulas(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_twelve_formulas_in_batches_of_five() {
        let dir = tempfile::tempdir().unwrap();
        let sleeper = Arc::new(RecordingSleeper::default());
        let mut pipeline = pipeline(None);
        let input = formulas(&[
            "NaCl", "ZnS", "GaN", "AlN3", "BeAlN2", "MgInP2", "Si", "TiO2", "CaF2", "Fe2O3",
            "Qq", "SrTiO3",
        ]);

        let mut processor = BatchProcessor::new(&mut pipeline, dir.path(), sleeper.clone())
            .with_checkpoint(Checkpoint::new(dir.path().join("checkpoint.json")), Vec::new());
        let outcomes = processor.process(&input, 5, Duration::from_secs(10));

        assert_eq!(outcomes.len(), 12);
        assert_eq!(processor.checkpoint().unwrap().writes(), 3);
        assert_eq!(
            *sleeper.waits.borrow(),
            vec![Duration::from_secs(10), Duration::from_secs(10)]
        );
        assert_eq!(outcomes.keys().cloned().collect::<Vec<_>>(), input);

        let summary = BatchSummary::from_outcomes(&outcomes);
        assert_eq!(summary.resolved, 12);
        assert!((summary.success_rate() - 1.0).abs() < 1e-12);

        let saved = Checkpoint::new(dir.path().join("checkpoint.json")).load().unwrap();
        assert_eq!(saved.len(), 12);
    }

    #[test]
    fn test_files_named_by_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(None);
        let mut processor =
            BatchProcessor::new(&mut pipeline, dir.path(), Arc::new(RecordingSleeper::default()));
        let outcomes = processor.process(&formulas(&["MgInP2", "Fe2O3"]), 0, Duration::ZERO);

        let Outcome::Resolved(record) = &outcomes["Fe2O3"] else {
            panic!("expected resolved outcome");
        };
        assert_eq!(record.provenance, Provenance::Emergency);
        assert!(dir.path().join("Fe2O3_fallback.cif").exists());
        assert!(record.path.ends_with("Fe2O3_fallback.cif"));
        assert!(outcomes["MgInP2"].is_resolved());
    }

    struct PanickingDatabase;

    impl StructureDatabase for PanickingDatabase {
        fn name(&self) -> &str {
            "panicking"
        }

        fn fetch(&self, formula: &str) -> Lookup<DatabaseRecord> {
            if formula == "KCl" {
                panic!("corrupt response for {}", formula);
            }
            Lookup::Empty
        }
    }

    #[test]
    fn test_defect_is_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(Some(Box::new(PanickingDatabase)));
        let mut processor =
            BatchProcessor::new(&mut pipeline, dir.path(), Arc::new(RecordingSleeper::default()))
                .with_format(StructureFormat::Poscar);
        let outcomes = processor.process(&formulas(&["NaCl", "KCl", "GaN"]), 2, Duration::ZERO);

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(&outcomes["KCl"], Outcome::Failed(msg) if msg.contains("corrupt response")));
        assert!(dir.path().join("KCl_ERROR.cif").exists());
        assert!(outcomes["GaN"].is_resolved());

        let summary = BatchSummary::from_outcomes(&outcomes);
        assert_eq!(summary.failed, 1);
        assert!((summary.success_rate() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unwritable_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "").unwrap();

        let mut pipeline = pipeline(None);
        let mut processor =
            BatchProcessor::new(&mut pipeline, &blocker, Arc::new(RecordingSleeper::default()));
        let outcomes = processor.process(&formulas(&["NaCl"]), 5, Duration::ZERO);

        assert!(matches!(outcomes["NaCl"], Outcome::Failed(_)));
    }

    #[test]
    fn test_resumed_checkpoint_keeps_order_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        let mut pipeline = pipeline(None);

        let previous = formulas(&["ZnS", "NaCl"]);
        let mut processor =
            BatchProcessor::new(&mut pipeline, dir.path(), Arc::new(RecordingSleeper::default()))
                .with_checkpoint(Checkpoint::new(&path), previous);
        processor.process(&formulas(&["NaCl", "GaN", "NaCl"]), 2, Duration::ZERO);

        let saved = Checkpoint::new(&path).load().unwrap();
        assert_eq!(saved, vec!["ZnS", "NaCl", "GaN"]);
    }

    #[test]
    fn test_file_stem_sanitizes() {
        assert_eq!(file_stem(" Ca(OH)2 "), "Ca(OH)2");
        assert_eq!(file_stem("a/b c"), "a_b_c");
        assert_eq!(file_stem(""), "unnamed");
    }
}
