//! # pymatgen 结构 JSON
//!
//! Materials Project API 和 pymatgen `Structure.as_dict()` 使用的 JSON 结构表示。
//! 只读取需要的字段：`lattice.matrix` 与 `sites[].species / abc`。
//! 部分占位的位点取占有率最高的元素。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 和 `acquire/database.rs` 使用
//! - 使用 `serde` / `serde_json`

use crate::error::{CrysfetchError, Result};
use crate::models::{Lattice, Site, Structure};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PymatgenStructure {
    pub lattice: PymatgenLattice,
    pub sites: Vec<PymatgenSite>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PymatgenLattice {
    pub matrix: [[f64; 3]; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct PymatgenSite {
    pub species: Vec<PymatgenSpecies>,
    pub abc: [f64; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct PymatgenSpecies {
    pub element: String,
    #[serde(default = "full_occupancy")]
    pub occu: f64,
}

fn full_occupancy() -> f64 {
    1.0
}

impl PymatgenStructure {
    /// 转换为内部结构表示
    pub fn into_structure(self, name: &str) -> Result<Structure> {
        let mut sites = Vec::with_capacity(self.sites.len());

        for (i, site) in self.sites.into_iter().enumerate() {
            let majority = site
                .species
                .into_iter()
                .max_by(|a, b| a.occu.total_cmp(&b.occu))
                .ok_or_else(|| CrysfetchError::ParseError {
                    format: "pymatgen-json".to_string(),
                    path: name.to_string(),
                    reason: format!("site {} has no species", i),
                })?;
            sites.push(Site::new(majority.element, site.abc));
        }

        Ok(Structure::new(
            name,
            Lattice::from_vectors(self.lattice.matrix),
            sites,
        ))
    }
}

/// 从 JSON 字符串解析结构
pub fn parse_pymatgen_json(content: &str, name: &str) -> Result<Structure> {
    let raw: PymatgenStructure = serde_json::from_str(content)?;
    raw.into_structure(name)
}
