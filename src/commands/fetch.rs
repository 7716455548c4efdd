//! # fetch 命令实现
//!
//! 批量获取晶体结构。
//!
//! ## 功能
//! - 从命令行或文件收集化学式
//! - 分批处理，批次间限速，每批写检查点
//! - `--resume` 跳过检查点中已完成的化学式
//! - 来源统计表、成功率与可选的 CSV 报告
//!
//! ## 依赖关系
//! - 使用 `cli/fetch.rs` 定义的参数
//! - 使用 `batch/`, `acquire/`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use super::{apply_overrides, build_pipeline};
use crate::acquire::{Provenance, ThreadSleeper};
use crate::batch::runner::ensure_output_dir;
use crate::batch::{BatchProcessor, BatchSummary, Checkpoint, FormulaCollector, Outcome};
use crate::cli::fetch::FetchArgs;
use crate::config::{seconds, Config};
use crate::error::{CrysfetchError, Result};
use crate::utils::{output, progress};

use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tabled::{Table, Tabled};

/// 来源统计行
#[derive(Debug, Clone, Tabled)]
struct SourceRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Suffix")]
    suffix: String,
    #[tabled(rename = "Count")]
    count: usize,
}

/// 执行 fetch 命令
pub fn execute(args: FetchArgs, mut config: Config) -> Result<()> {
    output::print_header("Fetching Crystal Structures");

    if let Some(dir) = &args.output {
        config.batch.structure_dir = dir.clone();
    }
    if let Some(format) = args.format {
        config.batch.format = format;
    }
    if let Some(size) = args.batch_size {
        config.batch.batch_size = size;
    }
    if let Some(delay) = args.delay {
        config.batch.delay_secs = delay;
    }
    if let Some(path) = &args.checkpoint {
        config.batch.checkpoint = path.clone();
    }
    apply_overrides(&mut config, &args.pipeline)?;

    let formulas = FormulaCollector::new()
        .with_formulas(&args.formulas)
        .with_input(args.input.clone())
        .collect()?;
    output::print_info(&format!("Collected {} formulas", formulas.len()));

    let checkpoint = Checkpoint::new(&config.batch.checkpoint);
    let previous = if args.resume {
        checkpoint.load()?
    } else {
        Vec::new()
    };
    let done: HashSet<&str> = previous.iter().map(String::as_str).collect();
    let pending: Vec<String> = formulas
        .into_iter()
        .filter(|f| !done.contains(f.as_str()))
        .collect();
    if args.resume && !previous.is_empty() {
        output::print_skip(&format!(
            "{} formulas already in checkpoint '{}'",
            previous.len(),
            checkpoint.path().display()
        ));
    }
    if pending.is_empty() {
        output::print_done("Nothing left to fetch");
        return Ok(());
    }

    ensure_output_dir(&config.batch.structure_dir)?;
    let mut pipeline = build_pipeline(&config, args.pipeline.offline)?;

    output::print_info(&format!(
        "Batch size {}, {:.1}s between batches, database stage {}, writing {} files to '{}'",
        config.batch.batch_size.max(1),
        config.batch.delay_secs,
        if pipeline.has_database() { "on" } else { "off" },
        config.batch.format,
        config.batch.structure_dir.display()
    ));

    let pb = progress::create_progress_bar(pending.len() as u64, "Fetching");
    let outcomes = {
        let mut processor = BatchProcessor::new(
            &mut pipeline,
            &config.batch.structure_dir,
            Arc::new(ThreadSleeper),
        )
        .with_format(config.batch.format)
        .with_checkpoint(checkpoint, previous)
        .with_progress(pb);
        processor.process(
            &pending,
            config.batch.batch_size,
            seconds(config.batch.delay_secs),
        )
    };

    let summary = BatchSummary::from_outcomes(&outcomes);
    print_summary(&summary);

    let emergency = pipeline.cache().count_by(Provenance::Emergency);
    if emergency > 0 {
        output::print_warning(&format!(
            "{} emergency structures are placeholders, not physical crystals",
            emergency
        ));
    }

    let diagnostics = pipeline.errors().len();
    if diagnostics > 0 {
        output::print_info(&format!(
            "{} stage errors recorded (run with -v for details)",
            diagnostics
        ));
    }

    if let Some(report) = &args.report {
        write_report(&outcomes, report)?;
        output::print_success(&format!("Report saved to '{}'", report.display()));
    }

    output::print_done(&format!(
        "Resolved {}/{} formulas (success rate {:.1}%)",
        summary.resolved,
        summary.total,
        summary.success_rate() * 100.0
    ));

    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    let rows: Vec<SourceRow> = Provenance::ALL
        .iter()
        .map(|p| SourceRow {
            source: p.to_string(),
            suffix: if p.file_suffix().is_empty() {
                "-".to_string()
            } else {
                p.file_suffix().to_string()
            },
            count: summary.count(*p),
        })
        .collect();

    output::print_header("Structure Sources");
    println!("{}", Table::new(&rows));

    for (formula, err) in &summary.failures {
        output::print_error(&format!("{}: {}", formula, err));
    }
}

/// 保存运行报告到 CSV
fn write_report(outcomes: &IndexMap<String, Outcome>, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "formula",
        "source",
        "space_group",
        "sites",
        "volume",
        "material_id",
        "band_gap",
        "path",
        "error",
    ])?;

    for (formula, outcome) in outcomes {
        let row = match outcome {
            Outcome::Resolved(r) => [
                formula.clone(),
                r.provenance.to_string(),
                r.space_group.clone().unwrap_or_else(|| "Unknown".to_string()),
                r.sites.to_string(),
                format!("{:.4}", r.volume),
                r.material_id.clone().unwrap_or_else(|| "Unknown".to_string()),
                r.band_gap.map(|g| format!("{:.4}", g)).unwrap_or_default(),
                r.path.display().to_string(),
                String::new(),
            ],
            Outcome::Failed(err) => [
                formula.clone(),
                "error".to_string(),
                "Unknown".to_string(),
                String::new(),
                String::new(),
                "Unknown".to_string(),
                String::new(),
                String::new(),
                err.clone(),
            ],
        };
        wtr.write_record(&row)?;
    }

    wtr.flush().map_err(|e| CrysfetchError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ResolvedRecord;
    use std::path::PathBuf;

    #[test]
    fn test_report_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let mut outcomes = IndexMap::new();
        outcomes.insert(
            "GaN".to_string(),
            Outcome::Resolved(ResolvedRecord {
                provenance: Provenance::Database,
                space_group: Some("P6_3mc".to_string()),
                path: PathBuf::from("out/GaN.cif"),
                sites: 4,
                volume: 45.7,
                material_id: Some("mp-804".to_string()),
                band_gap: Some(1.73),
            }),
        );
        outcomes.insert("KCl".to_string(), Outcome::Failed("panic: boom".to_string()));
        write_report(&outcomes, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap().len(), 9);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "database");
        assert_eq!(&rows[0][5], "mp-804");
        assert_eq!(&rows[1][1], "error");
        assert_eq!(&rows[1][5], "Unknown");
        assert_eq!(&rows[1][8], "panic: boom");
    }
}
