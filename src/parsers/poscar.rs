//! # VASP POSCAR 格式读写
//!
//! 本地结构库可以存放 POSCAR 文件；批处理也可以用 POSCAR 代替 CIF 输出。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//!
//! VASP 4 格式（缺少元素行）无法确定元素，解析时直接拒绝。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{CrysfetchError, Result};
use crate::models::{Lattice, Site, Structure};

use std::collections::BTreeMap;

fn parse_error(name: &str, reason: impl Into<String>) -> CrysfetchError {
    CrysfetchError::ParseError {
        format: "poscar".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(content: &str, default_name: &str) -> Result<Structure> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err(parse_error(default_name, "File too short"));
    }

    // Line 0: Comment/name
    let name = match lines[0].trim() {
        "" => default_name.to_string(),
        s => s.to_string(),
    };

    // Line 1: Scaling factor
    let scale: f64 = lines[1]
        .trim()
        .parse()
        .map_err(|_| parse_error(&name, "Invalid scaling factor"))?;

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for (i, row) in matrix.iter_mut().enumerate() {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(parse_error(
                &name,
                format!("Invalid lattice vector at line {}", 3 + i),
            ));
        }
        *row = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
    }
    let lattice = Lattice::from_vectors(matrix);

    // Line 5: Element symbols (VASP 5+)
    let elements: Vec<String> = lines[5].split_whitespace().map(str::to_string).collect();
    if elements.is_empty() || elements[0].parse::<i32>().is_ok() {
        return Err(parse_error(&name, "Missing element symbol line (VASP 4 format)"));
    }
    let counts: Vec<usize> = lines[6]
        .split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect();
    if counts.len() != elements.len() {
        return Err(parse_error(&name, "Element and count lines disagree"));
    }

    // Check for "Selective dynamics" line
    let mut coord_line = 7;
    if lines.len() > coord_line && lines[coord_line].trim().to_lowercase().starts_with('s') {
        coord_line += 1;
    }

    if lines.len() <= coord_line {
        return Err(parse_error(&name, "Missing coordinate type line"));
    }

    let coord_type = lines[coord_line].trim().to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    // Parse atom positions
    let mut sites = Vec::new();
    let mut line_idx = coord_line + 1;

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let parts: Vec<f64> = lines
                .get(line_idx)
                .map(|l| {
                    l.split_whitespace()
                        .take(3)
                        .filter_map(|s| s.parse().ok())
                        .collect()
                })
                .unwrap_or_default();

            if parts.len() < 3 {
                return Err(parse_error(
                    &name,
                    format!("Invalid position at line {}", line_idx + 1),
                ));
            }

            let position = if is_cartesian {
                cart_to_frac(
                    [parts[0] * scale, parts[1] * scale, parts[2] * scale],
                    &lattice,
                )
            } else {
                [parts[0], parts[1], parts[2]]
            };
            sites.push(Site::new(elem.clone(), position));
            line_idx += 1;
        }
    }

    Ok(Structure::new(name, lattice, sites))
}

/// 笛卡尔坐标转分数坐标
fn cart_to_frac(cart: [f64; 3], lattice: &Lattice) -> [f64; 3] {
    let m = lattice.matrix;
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);

    if det.abs() < 1e-10 {
        return cart;
    }

    let inv = [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
        ],
    ];

    // 行向量约定：cart = frac · M，故 frac = cart · M⁻¹
    [
        cart[0] * inv[0][0] + cart[1] * inv[1][0] + cart[2] * inv[2][0],
        cart[0] * inv[0][1] + cart[1] * inv[1][1] + cart[2] * inv[2][1],
        cart[0] * inv[0][2] + cart[1] * inv[1][2] + cart[2] * inv[2][2],
    ]
}

/// 将 Structure 转换为 POSCAR 格式字符串
pub fn to_poscar_string(structure: &Structure) -> String {
    // 按元素分组，保持首次出现顺序
    let mut elem_order: Vec<&str> = Vec::new();
    let mut elem_sites: BTreeMap<&str, Vec<[f64; 3]>> = BTreeMap::new();

    for site in &structure.sites {
        if !elem_order.contains(&site.element.as_str()) {
            elem_order.push(site.element.as_str());
        }
        elem_sites
            .entry(site.element.as_str())
            .or_default()
            .push(site.position);
    }

    let mut result = String::new();
    result.push_str(&format!("{}\n", structure.name));
    result.push_str("1.0\n");

    for row in &structure.lattice.matrix {
        result.push_str(&format!(
            "  {:16.10}  {:16.10}  {:16.10}\n",
            row[0], row[1], row[2]
        ));
    }

    result.push_str(&format!("   {}\n", elem_order.join("   ")));
    let counts: Vec<String> = elem_order
        .iter()
        .map(|e| elem_sites.get(e).map(|v| v.len()).unwrap_or(0).to_string())
        .collect();
    result.push_str(&format!("   {}\n", counts.join("   ")));
    result.push_str("Direct\n");

    for elem in &elem_order {
        if let Some(positions) = elem_sites.get(elem) {
            for pos in positions {
                result.push_str(&format!(
                    "  {:16.10}  {:16.10}  {:16.10}\n",
                    pos[0], pos[1], pos[2]
                ));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poscar_vasp5() {
        let content = r#"NaCl
1.0
5.64 0.0 0.0
0.0 5.64 0.0
0.0 0.0 5.64
Na Cl
4 4
Direct
0.0 0.0 0.0
0.5 0.5 0.0
0.5 0.0 0.5
0.0 0.5 0.5
0.5 0.0 0.0
0.0 0.5 0.0
0.0 0.0 0.5
0.5 0.5 0.5
"#;
        let s = parse_poscar_content(content, "NaCl").unwrap();
        assert_eq!(s.name, "NaCl");
        assert_eq!(s.num_sites(), 8);
        assert_eq!(s.sites.iter().filter(|a| a.element == "Cl").count(), 4);
    }

    #[test]
    fn test_parse_poscar_cartesian_with_scale() {
        let content = r#"Si
2.0
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0
Si
2
Cartesian
0.0 0.0 0.0
1.0 1.0 1.0
"#;
        let s = parse_poscar_content(content, "Si").unwrap();
        let (a, _, _, _, _, _) = s.lattice.parameters();
        assert!((a - 4.0).abs() < 1e-9);
        for v in s.sites[1].position {
            assert!((v - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_parse_poscar_selective_dynamics() {
        let content = r#"Fe with selective
1.0
2.87 0.0 0.0
0.0 2.87 0.0
0.0 0.0 2.87
Fe
2
Selective dynamics
Direct
0.0 0.0 0.0 T T T
0.5 0.5 0.5 F F F
"#;
        let s = parse_poscar_content(content, "Fe").unwrap();
        assert_eq!(s.num_sites(), 2);
    }

    #[test]
    fn test_parse_poscar_rejects_vasp4_and_truncation() {
        let vasp4 = "X\n1.0\n1 0 0\n0 1 0\n0 0 1\n2\nDirect\n0 0 0\n0.5 0.5 0.5\n";
        assert!(parse_poscar_content(vasp4, "X").is_err());

        let truncated = "X\n1.0\n1 0 0\n0 1 0\n0 0 1\nH\n3\nDirect\n0 0 0\n";
        assert!(parse_poscar_content(truncated, "X").is_err());
    }

    #[test]
    fn test_poscar_writer_groups_elements() {
        let lattice = Lattice::cubic(4.0);
        let sites = vec![
            Site::new("Ti", [0.0, 0.0, 0.0]),
            Site::new("O", [0.5, 0.5, 0.0]),
            Site::new("O", [0.5, 0.0, 0.5]),
        ];
        let s = Structure::new("TiO2", lattice, sites);

        let text = to_poscar_string(&s);
        let parsed = parse_poscar_content(&text, "round_trip").unwrap();
        assert_eq!(parsed.name, "TiO2");
        assert_eq!(parsed.sites.iter().filter(|a| a.element == "O").count(), 2);
        assert!((parsed.volume() - 64.0).abs() < 1e-6);
    }
}
