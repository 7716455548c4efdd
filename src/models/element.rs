//! # 元素性质表
//!
//! 按元素符号查询原子性质：原子序数、Pauling 电负性、共价半径 (Å)、
//! 第一电离能 (eV)、常见价态。
//!
//! 表中没有的性质以 `None` 表示，不会用 0 代替。
//! 全部 118 个元素符号都能被识别（用于化学式解析），
//! 但只有常见元素带有数值性质。
//!
//! ## 依赖关系
//! - 被 `models/composition.rs` 用于符号校验
//! - 被 `acquire/substitution.rs` 和 `acquire/pipeline.rs` 使用
//! - 无外部模块依赖

/// 周期表元素符号，按原子序数排列
const SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// 单个元素的原子性质
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub symbol: &'static str,
    pub atomic_number: u8,
    /// Pauling 电负性
    pub electronegativity: Option<f64>,
    /// 共价半径 (Å)
    pub covalent_radius: Option<f64>,
    /// 第一电离能 (eV)
    pub ionization_energy: Option<f64>,
    /// 最常见价态
    pub valence: Option<i32>,
}

/// 检查元素符号是否有效（区分大小写）
pub fn is_known(symbol: &str) -> bool {
    SYMBOLS.contains(&symbol)
}

/// 查询元素性质，未知符号返回 `None`
pub fn lookup(symbol: &str) -> Option<ElementData> {
    let index = SYMBOLS.iter().position(|&s| s == symbol)?;
    let symbol = SYMBOLS[index];

    let (electronegativity, covalent_radius, ionization_energy, valence) =
        match measured_properties(symbol) {
            Some((chi, r, ie, v)) => (chi, Some(r), Some(ie), Some(v)),
            None => (None, None, None, None),
        };

    Some(ElementData {
        symbol,
        atomic_number: (index + 1) as u8,
        electronegativity,
        covalent_radius,
        ionization_energy,
        valence,
    })
}

/// 电负性快捷查询
pub fn electronegativity(symbol: &str) -> Option<f64> {
    lookup(symbol).and_then(|e| e.electronegativity)
}

/// 共价半径快捷查询
pub fn covalent_radius(symbol: &str) -> Option<f64> {
    lookup(symbol).and_then(|e| e.covalent_radius)
}

/// (电负性, 共价半径, 电离能, 价态)
fn measured_properties(symbol: &str) -> Option<(Option<f64>, f64, f64, i32)> {
    let props = match symbol {
        // --- Period 1 ---
        "H" => (Some(2.20), 0.31, 13.598, 1),
        "He" => (None, 0.28, 24.587, 0),
        // --- Period 2 ---
        "Li" => (Some(0.98), 1.28, 5.392, 1),
        "Be" => (Some(1.57), 0.96, 9.323, 2),
        "B" => (Some(2.04), 0.84, 8.298, 3),
        "C" => (Some(2.55), 0.76, 11.260, 4),
        "N" => (Some(3.04), 0.71, 14.534, 3),
        "O" => (Some(3.44), 0.66, 13.618, 2),
        "F" => (Some(3.98), 0.57, 17.423, 1),
        "Ne" => (None, 0.58, 21.565, 0),
        // --- Period 3 ---
        "Na" => (Some(0.93), 1.66, 5.139, 1),
        "Mg" => (Some(1.31), 1.41, 7.646, 2),
        "Al" => (Some(1.61), 1.21, 5.986, 3),
        "Si" => (Some(1.90), 1.11, 8.152, 4),
        "P" => (Some(2.19), 1.07, 10.487, 3),
        "S" => (Some(2.58), 1.05, 10.360, 2),
        "Cl" => (Some(3.16), 1.02, 12.968, 1),
        "Ar" => (None, 1.06, 15.760, 0),
        // --- Period 4 ---
        "K" => (Some(0.82), 2.03, 4.341, 1),
        "Ca" => (Some(1.00), 1.76, 6.113, 2),
        "Sc" => (Some(1.36), 1.70, 6.561, 3),
        "Ti" => (Some(1.54), 1.60, 6.828, 4),
        "V" => (Some(1.63), 1.53, 6.746, 5),
        "Cr" => (Some(1.66), 1.39, 6.767, 3),
        "Mn" => (Some(1.55), 1.39, 7.434, 2),
        "Fe" => (Some(1.83), 1.32, 7.902, 3),
        "Co" => (Some(1.88), 1.26, 7.881, 2),
        "Ni" => (Some(1.91), 1.24, 7.640, 2),
        "Cu" => (Some(1.90), 1.32, 7.726, 1),
        "Zn" => (Some(1.65), 1.22, 9.394, 2),
        "Ga" => (Some(1.81), 1.22, 5.999, 3),
        "Ge" => (Some(2.01), 1.20, 7.899, 4),
        "As" => (Some(2.18), 1.19, 9.789, 3),
        "Se" => (Some(2.55), 1.20, 9.752, 2),
        "Br" => (Some(2.96), 1.20, 11.814, 1),
        "Kr" => (Some(3.00), 1.16, 14.000, 0),
        // --- Period 5 ---
        "Rb" => (Some(0.82), 2.20, 4.177, 1),
        "Sr" => (Some(0.95), 1.95, 5.695, 2),
        "Y" => (Some(1.22), 1.90, 6.217, 3),
        "Zr" => (Some(1.33), 1.75, 6.634, 4),
        "Nb" => (Some(1.60), 1.64, 6.759, 5),
        "Mo" => (Some(2.16), 1.54, 7.092, 6),
        "Tc" => (Some(1.90), 1.47, 7.280, 7),
        "Ru" => (Some(2.20), 1.46, 7.361, 3),
        "Rh" => (Some(2.28), 1.42, 7.459, 3),
        "Pd" => (Some(2.20), 1.39, 8.337, 2),
        "Ag" => (Some(1.93), 1.45, 7.576, 1),
        "Cd" => (Some(1.69), 1.44, 8.994, 2),
        "In" => (Some(1.78), 1.42, 5.786, 3),
        "Sn" => (Some(1.96), 1.39, 7.344, 4),
        "Sb" => (Some(2.05), 1.39, 8.608, 3),
        "Te" => (Some(2.10), 1.38, 9.010, 2),
        "I" => (Some(2.66), 1.39, 10.451, 1),
        "Xe" => (Some(2.60), 1.40, 12.130, 0),
        // --- Period 6 (selected) ---
        "Cs" => (Some(0.79), 2.44, 3.894, 1),
        "Ba" => (Some(0.89), 2.15, 5.212, 2),
        "La" => (Some(1.10), 2.07, 5.577, 3),
        "Ce" => (Some(1.12), 2.04, 5.539, 3),
        "Hf" => (Some(1.30), 1.75, 6.825, 4),
        "Ta" => (Some(1.50), 1.70, 7.550, 5),
        "W" => (Some(2.36), 1.62, 7.864, 6),
        "Re" => (Some(1.90), 1.51, 7.834, 7),
        "Os" => (Some(2.20), 1.44, 8.438, 4),
        "Ir" => (Some(2.20), 1.41, 8.967, 4),
        "Pt" => (Some(2.28), 1.36, 8.959, 2),
        "Au" => (Some(2.54), 1.36, 9.226, 1),
        "Hg" => (Some(2.00), 1.32, 10.438, 2),
        "Tl" => (Some(1.62), 1.45, 6.108, 1),
        "Pb" => (Some(2.33), 1.46, 7.417, 2),
        "Bi" => (Some(2.02), 1.48, 7.286, 3),
        _ => return None,
    };
    Some(props)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_element() {
        let n = lookup("N").unwrap();
        assert_eq!(n.atomic_number, 7);
        assert!((n.electronegativity.unwrap() - 3.04).abs() < 1e-6);
        assert_eq!(n.valence, Some(3));
    }

    #[test]
    fn test_heavy_element_without_properties() {
        let og = lookup("Og").unwrap();
        assert_eq!(og.atomic_number, 118);
        assert!(og.electronegativity.is_none());
        assert!(og.covalent_radius.is_none());
    }

    #[test]
    fn test_noble_gas_missing_electronegativity() {
        let he = lookup("He").unwrap();
        assert!(he.electronegativity.is_none());
        assert!(he.covalent_radius.is_some());
    }

    #[test]
    fn test_symbol_validation_is_case_sensitive() {
        assert!(is_known("Cl"));
        assert!(!is_known("CL"));
        assert!(!is_known("Xx"));
        assert!(lookup("Xx").is_none());
    }
}
