//! # resolve 命令实现
//!
//! 逐个解析化学式，以表格显示每个结构的来源与基本信息。
//! 重复的化学式直接命中缓存。
//!
//! ## 依赖关系
//! - 使用 `cli/resolve.rs` 定义的参数
//! - 使用 `acquire/`, `parsers/`
//! - 使用 `utils/output.rs`

use super::{apply_overrides, build_pipeline};
use crate::acquire::Resolution;
use crate::batch::runner::{ensure_output_dir, file_stem};
use crate::cli::resolve::ResolveArgs;
use crate::config::Config;
use crate::error::Result;
use crate::models::element::{self, ElementData};
use crate::models::Composition;
use crate::parsers;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 解析结果行
#[derive(Debug, Clone, Tabled)]
struct ResolveRow {
    #[tabled(rename = "Formula")]
    formula: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Space group")]
    space_group: String,
    #[tabled(rename = "Sites")]
    sites: usize,
    #[tabled(rename = "Volume (Å³)")]
    volume: String,
    #[tabled(rename = "Å³/atom")]
    volume_per_site: String,
    #[tabled(rename = "Cached")]
    cached: String,
}

impl From<&Resolution> for ResolveRow {
    fn from(r: &Resolution) -> Self {
        let structure = r.structure();
        ResolveRow {
            formula: r.formula.clone(),
            source: r.provenance().to_string(),
            space_group: structure
                .space_group
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            sites: structure.num_sites(),
            volume: format!("{:.3}", structure.volume()),
            volume_per_site: structure
                .volume_per_site()
                .map(|v| format!("{:.2}", v))
                .unwrap_or_default(),
            cached: if r.from_cache { "yes" } else { "no" }.to_string(),
        }
    }
}

/// 元素性质行
#[derive(Debug, Clone, Tabled)]
struct ElementRow {
    #[tabled(rename = "Element")]
    symbol: String,
    #[tabled(rename = "Z")]
    atomic_number: u8,
    #[tabled(rename = "χ (Pauling)")]
    electronegativity: String,
    #[tabled(rename = "r_cov (Å)")]
    covalent_radius: String,
    #[tabled(rename = "IE (eV)")]
    ionization_energy: String,
    #[tabled(rename = "Valence")]
    valence: String,
}

impl From<ElementData> for ElementRow {
    fn from(e: ElementData) -> Self {
        let fixed = |v: Option<f64>| v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "-".into());
        ElementRow {
            symbol: e.symbol.to_string(),
            atomic_number: e.atomic_number,
            electronegativity: fixed(e.electronegativity),
            covalent_radius: fixed(e.covalent_radius),
            ionization_energy: fixed(e.ionization_energy),
            valence: e
                .valence
                .map(|v| format!("{:+}", v))
                .unwrap_or_else(|| "-".into()),
        }
    }
}

/// 化学式中出现的全部元素（去重，按出现顺序）
fn element_rows(formulas: &[String]) -> Vec<ElementRow> {
    let mut symbols: Vec<String> = Vec::new();
    for comp in formulas.iter().filter_map(|f| Composition::parse(f).ok()) {
        for el in comp.elements() {
            if !symbols.iter().any(|s| s == el) {
                symbols.push(el.to_string());
            }
        }
    }
    symbols
        .iter()
        .filter_map(|s| element::lookup(s))
        .map(ElementRow::from)
        .collect()
}

/// 执行 resolve 命令
pub fn execute(args: ResolveArgs, mut config: Config) -> Result<()> {
    output::print_header("Resolving Structures");

    apply_overrides(&mut config, &args.pipeline)?;
    let mut pipeline = build_pipeline(&config, args.pipeline.offline)?;

    if let Some(dir) = &args.output {
        ensure_output_dir(dir)?;
    }

    let mut rows = Vec::with_capacity(args.formulas.len());
    for formula in &args.formulas {
        let resolution = pipeline.resolve(formula);

        if let Some(dir) = &args.output {
            let stem = format!(
                "{}{}",
                file_stem(&resolution.formula),
                resolution.provenance().file_suffix()
            );
            let path = dir.join(args.format.file_name(&stem));
            parsers::write_structure(&path, resolution.structure(), args.format)?;
            output::print_source(
                resolution.provenance(),
                &format!("{} -> {}", resolution.formula, path.display()),
            );
        }

        rows.push(ResolveRow::from(&resolution));
    }

    println!("{}", Table::new(&rows));

    if args.elements {
        output::print_header("Element Properties");
        println!("{}", Table::new(element_rows(&args.formulas)));
    }

    if args.show_errors && !pipeline.errors().is_empty() {
        output::print_header("Stage Errors");
        for row in rows.iter().filter(|r| r.cached == "no") {
            for entry in pipeline.errors().for_formula(&row.formula) {
                output::print_warning(&entry.to_string());
            }
        }
    }

    output::print_done(&format!("Resolved {} formulas", rows.len()));
    Ok(())
}
