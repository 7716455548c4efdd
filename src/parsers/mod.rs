//! # 结构文件读写模块
//!
//! 提供结构文件的读取（本地结构库）与写出（批处理持久化）。
//!
//! ## 依赖关系
//! - 被 `acquire/database.rs` 和 `batch/runner.rs` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: cif, poscar, pymatgen

pub mod cif;
pub mod poscar;
pub mod pymatgen;

use crate::error::{CrysfetchError, Result};
use crate::models::Structure;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 支持的输出格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StructureFormat {
    /// Crystallographic Information File
    #[default]
    Cif,
    /// VASP POSCAR format
    Poscar,
}

impl std::fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureFormat::Cif => write!(f, "cif"),
            StructureFormat::Poscar => write!(f, "poscar"),
        }
    }
}

impl StructureFormat {
    /// 由结构名（含来源后缀）生成文件名
    pub fn file_name(&self, stem: &str) -> String {
        match self {
            StructureFormat::Cif => format!("{}.cif", stem),
            StructureFormat::Poscar => format!("POSCAR_{}", stem),
        }
    }

    pub fn render(&self, structure: &Structure) -> String {
        match self {
            StructureFormat::Cif => cif::to_cif_string(structure),
            StructureFormat::Poscar => poscar::to_poscar_string(structure),
        }
    }
}

/// 按格式写出结构文件
pub fn write_structure(path: &Path, structure: &Structure, format: StructureFormat) -> Result<()> {
    fs::write(path, format.render(structure)).map_err(|e| CrysfetchError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 从文件路径推断格式并解析
pub fn parse_structure_file(path: &Path) -> Result<Structure> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    let content = fs::read_to_string(path).map_err(|e| CrysfetchError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "json" => pymatgen::parse_pymatgen_json(&content, &stem),
        "vasp" => poscar::parse_poscar_content(&content, &stem),
        _ => {
            // 可能是 POSCAR/CONTCAR (无扩展名)
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with("POSCAR") || name.starts_with("CONTCAR") {
                    return poscar::parse_poscar_content(&content, &stem);
                }
            }
            Err(CrysfetchError::ParseError {
                format: "unknown".to_string(),
                path: path.display().to_string(),
                reason: "Cannot determine structure format".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lattice, Site};

    #[test]
    fn test_file_names() {
        assert_eq!(StructureFormat::Cif.file_name("AlN3_proto"), "AlN3_proto.cif");
        assert_eq!(StructureFormat::Poscar.file_name("AlN3"), "POSCAR_AlN3");
    }

    #[test]
    fn test_write_then_parse_poscar_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = Structure::new(
            "GaAs",
            Lattice::cubic(5.65),
            vec![
                Site::new("Ga", [0.0, 0.0, 0.0]),
                Site::new("As", [0.25, 0.25, 0.25]),
            ],
        );
        let path = dir.path().join(StructureFormat::Poscar.file_name("GaAs"));
        write_structure(&path, &s, StructureFormat::Poscar).unwrap();

        let parsed = parse_structure_file(&path).unwrap();
        assert_eq!(parsed.num_sites(), 2);
        assert_eq!(parsed.sites[1].element, "As");
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thing.xyz");
        fs::write(&path, "1\nH\nH 0 0 0\n").unwrap();
        assert!(parse_structure_file(&path).is_err());
    }
}
