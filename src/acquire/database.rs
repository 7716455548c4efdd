//! # 外部结构数据库
//!
//! 按化学式查询最佳匹配结构。每次 `fetch` 只发出一次请求，
//! 不在内部重试（重试由 `RetryExecutor` 统一负责）。
//! 空结果、网络错误、HTTP 错误码、格式错误的响应都折叠为
//! `Lookup::Empty` / `Lookup::Failed`，不会向外传播。
//!
//! ## 实现
//! - `MaterialsProjectClient`: Materials Project REST API（阻塞请求）
//! - `LocalLibrary`: 本地结构库目录（离线使用）
//!
//! ## 依赖关系
//! - 被 `acquire/pipeline.rs` 和 `commands/` 使用
//! - 使用 `parsers/`
//! - 使用 `reqwest` 发起 HTTP 请求，`walkdir` 扫描本地目录

use super::Lookup;
use crate::error::{CrysfetchError, Result};
use crate::models::{Composition, Structure};
use crate::parsers;
use crate::parsers::pymatgen::PymatgenStructure;

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Materials Project 默认 API 地址
pub const DEFAULT_ENDPOINT: &str = "https://api.materialsproject.org";

/// 请求的字段
const SUMMARY_FIELDS: &str = "material_id,structure,symmetry,band_gap,volume";

/// 数据库返回的一条记录
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseRecord {
    pub structure: Structure,
    pub material_id: Option<String>,
    pub band_gap: Option<f64>,
}

impl DatabaseRecord {
    pub fn new(structure: Structure) -> Self {
        DatabaseRecord {
            structure,
            material_id: None,
            band_gap: None,
        }
    }
}

/// 结构数据库
pub trait StructureDatabase {
    /// 用于日志的名称
    fn name(&self) -> &str;

    /// 单次查询
    fn fetch(&self, formula: &str) -> Lookup<DatabaseRecord>;
}

// ─────────────────────────────────────────────────────────────
// Materials Project
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    data: Vec<SummaryDoc>,
}

#[derive(Debug, Deserialize)]
struct SummaryDoc {
    material_id: Option<String>,
    structure: Option<PymatgenStructure>,
    band_gap: Option<f64>,
    symmetry: Option<SymmetryDoc>,
}

#[derive(Debug, Deserialize)]
struct SymmetryDoc {
    symbol: Option<String>,
}

/// Materials Project summary 接口客户端
pub struct MaterialsProjectClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl MaterialsProjectClient {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("crysfetch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn query(&self, formula: &str) -> Result<Option<DatabaseRecord>> {
        let url = format!("{}/materials/summary/", self.endpoint);
        let response = self
            .client
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .query(&[
                ("formula", formula),
                ("_fields", SUMMARY_FIELDS),
                ("_limit", "1"),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrysfetchError::HttpStatus {
                status: status.as_u16(),
                formula: formula.to_string(),
            });
        }

        let body: SummaryResponse = response.json()?;
        record_from_docs(body.data, formula)
    }
}

/// 取第一条带结构的文档
fn record_from_docs(docs: Vec<SummaryDoc>, formula: &str) -> Result<Option<DatabaseRecord>> {
    let Some(doc) = docs.into_iter().next() else {
        return Ok(None);
    };
    let Some(raw) = doc.structure else {
        return Ok(None);
    };

    let mut structure = raw.into_structure(formula)?;
    structure.space_group = doc.symmetry.and_then(|s| s.symbol);

    Ok(Some(DatabaseRecord {
        structure,
        material_id: doc.material_id,
        band_gap: doc.band_gap,
    }))
}

impl StructureDatabase for MaterialsProjectClient {
    fn name(&self) -> &str {
        "materials-project"
    }

    fn fetch(&self, formula: &str) -> Lookup<DatabaseRecord> {
        match self.query(formula) {
            Ok(Some(record)) => {
                tracing::info!(
                    formula,
                    material_id = record.material_id.as_deref().unwrap_or("?"),
                    "structure downloaded"
                );
                Lookup::Found(record)
            }
            Ok(None) => {
                tracing::warn!(formula, "not found in Materials Project");
                Lookup::Empty
            }
            Err(e) => Lookup::Failed(e.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 本地结构库
// ─────────────────────────────────────────────────────────────

/// 本地结构库：目录中的 `<formula>.json`、`<formula>.vasp` 或 `POSCAR_<formula>`
pub struct LocalLibrary {
    root: PathBuf,
    index: HashMap<String, PathBuf>,
}

impl LocalLibrary {
    /// 扫描目录建立索引（不递归）
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(CrysfetchError::DirectoryNotFound {
                path: root.display().to_string(),
            });
        }

        let mut index = HashMap::new();
        for entry in WalkDir::new(root)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if let Some(key) = library_key(entry.path()) {
                index.entry(key).or_insert_with(|| entry.path().to_path_buf());
            }
        }

        tracing::debug!(root = %root.display(), entries = index.len(), "indexed structure library");
        Ok(Self {
            root: root.to_path_buf(),
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 库中所有结构，按键排序（供元素替换作为参考结构）
    pub fn structures(&self) -> Vec<Structure> {
        let mut keys: Vec<&String> = self.index.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|k| {
                let path = &self.index[k];
                match parsers::parse_structure_file(path) {
                    Ok(mut s) => {
                        s.name = k.clone();
                        Some(s)
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), "skipping library entry: {}", e);
                        None
                    }
                }
            })
            .collect()
    }

    fn locate(&self, formula: &str) -> Option<&PathBuf> {
        self.index.get(formula).or_else(|| {
            let reduced = Composition::parse(formula).ok()?.reduced_formula();
            self.index.get(&reduced)
        })
    }
}

/// 文件名 → 化学式键
fn library_key(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if let Some(rest) = name.strip_prefix("POSCAR_") {
        return Some(rest.to_string());
    }
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "json" | "vasp" => Some(path.file_stem()?.to_str()?.to_string()),
        _ => None,
    }
}

impl StructureDatabase for LocalLibrary {
    fn name(&self) -> &str {
        "local-library"
    }

    fn fetch(&self, formula: &str) -> Lookup<DatabaseRecord> {
        let Some(path) = self.locate(formula) else {
            tracing::debug!(formula, root = %self.root.display(), "not in local library");
            return Lookup::Empty;
        };

        match parsers::parse_structure_file(path) {
            Ok(mut structure) => {
                structure.name = formula.to_string();
                Lookup::Found(DatabaseRecord::new(structure))
            }
            Err(e) => Lookup::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const GAN_JSON: &str = r#"{"lattice": {"matrix": [[3.19, 0, 0], [-1.595, 2.7626, 0], [0, 0, 5.19]]},
        "sites": [
            {"species": [{"element": "Ga", "occu": 1}], "abc": [0.3333, 0.6667, 0.0]},
            {"species": [{"element": "Ga", "occu": 1}], "abc": [0.6667, 0.3333, 0.5]},
            {"species": [{"element": "N", "occu": 1}], "abc": [0.3333, 0.6667, 0.377]},
            {"species": [{"element": "N", "occu": 1}], "abc": [0.6667, 0.3333, 0.877]}
        ]}"#;

    #[test]
    fn test_record_from_summary_docs() {
        let body = format!(
            r#"{{"data": [{{"material_id": "mp-804", "band_gap": 1.73,
                "symmetry": {{"symbol": "P6_3mc", "number": 186}},
                "structure": {}}}], "meta": {{"total_doc": 1}}}}"#,
            GAN_JSON
        );
        let parsed: SummaryResponse = serde_json::from_str(&body).unwrap();
        let record = record_from_docs(parsed.data, "GaN").unwrap().unwrap();

        assert_eq!(record.material_id.as_deref(), Some("mp-804"));
        assert_eq!(record.structure.space_group.as_deref(), Some("P6_3mc"));
        assert_eq!(record.structure.num_sites(), 4);
        assert!((record.band_gap.unwrap() - 1.73).abs() < 1e-9);
    }

    #[test]
    fn test_empty_or_structureless_docs_are_misses() {
        let empty: SummaryResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(record_from_docs(empty.data, "Xe").unwrap().is_none());

        let bare: SummaryResponse =
            serde_json::from_str(r#"{"data": [{"material_id": "mp-1"}]}"#).unwrap();
        assert!(record_from_docs(bare.data, "Xe").unwrap().is_none());
    }

    #[test]
    fn test_unreachable_endpoint_is_failed_lookup() {
        let client =
            MaterialsProjectClient::new("http://127.0.0.1:9", "key", Duration::from_millis(200))
                .unwrap();
        assert!(matches!(client.fetch("NaCl"), Lookup::Failed(_)));
    }

    #[test]
    fn test_local_library_lookup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("GaN.json"), GAN_JSON).unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let library = LocalLibrary::open(dir.path()).unwrap();
        assert_eq!(library.len(), 2);

        let found = library.fetch("GaN").found().unwrap();
        assert_eq!(found.structure.name, "GaN");
        assert_eq!(found.structure.num_sites(), 4);

        // 约化化学式回退
        assert!(library.fetch("Ga2N2").found().is_some());
        assert_eq!(library.fetch("AlN"), Lookup::Empty);
        assert!(matches!(library.fetch("broken"), Lookup::Failed(_)));
        assert_eq!(library.structures().len(), 1);
    }

    #[test]
    fn test_library_requires_directory() {
        assert!(LocalLibrary::open(Path::new("/definitely/not/here")).is_err());
    }
}
