//! # CIF 格式写出
//!
//! 以 P1 对称性写出晶体结构，所有位点显式列出。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`

use crate::models::Structure;

/// 将 Structure 转换为 CIF 格式字符串
pub fn to_cif_string(structure: &Structure) -> String {
    let (a, b, c, alpha, beta, gamma) = structure.lattice.parameters();

    let mut result = String::new();
    result.push_str(&format!("data_{}\n", sanitize_block_name(&structure.name)));
    if let Some(sg) = &structure.space_group {
        // 位点仍以 P1 列出，原始空间群仅作记录
        result.push_str(&format!("_crysfetch_source_space_group '{}'\n", sg));
    }
    result.push_str("_symmetry_space_group_name_H-M    'P 1'\n");
    result.push_str("_symmetry_Int_Tables_number       1\n");
    result.push_str(&format!(
        "_chemical_formula_sum             '{}'\n\n",
        structure.formula()
    ));

    result.push_str(&format!("_cell_length_a    {:.6}\n", a));
    result.push_str(&format!("_cell_length_b    {:.6}\n", b));
    result.push_str(&format!("_cell_length_c    {:.6}\n", c));
    result.push_str(&format!("_cell_angle_alpha {:.4}\n", alpha));
    result.push_str(&format!("_cell_angle_beta  {:.4}\n", beta));
    result.push_str(&format!("_cell_angle_gamma {:.4}\n", gamma));
    result.push_str(&format!("_cell_volume      {:.6}\n\n", structure.volume()));

    result.push_str("loop_\n");
    result.push_str(" _symmetry_equiv_pos_as_xyz\n");
    result.push_str("  'x, y, z'\n\n");

    result.push_str("loop_\n");
    result.push_str("_atom_site_label\n");
    result.push_str("_atom_site_type_symbol\n");
    result.push_str("_atom_site_fract_x\n");
    result.push_str("_atom_site_fract_y\n");
    result.push_str("_atom_site_fract_z\n");
    result.push_str("_atom_site_occupancy\n");

    for (i, site) in structure.sites.iter().enumerate() {
        result.push_str(&format!(
            "{}{} {} {:.10} {:.10} {:.10} 1.0\n",
            site.element,
            i + 1,
            site.element,
            site.position[0],
            site.position[1],
            site.position[2]
        ));
    }

    result
}

/// CIF 数据块名不能包含空白
fn sanitize_block_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "structure".to_string()
    } else {
        cleaned
    }
}
