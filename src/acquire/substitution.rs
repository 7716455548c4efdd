//! # 元素替换预测
//!
//! 在参考结构库中寻找与目标组分化学计量相同的结构，
//! 将参考元素替换为化学性质相近的目标元素。
//!
//! ## 算法
//! 1. 前置条件：至少两种元素、数量均为整数、约化比例最大值 ≤ 4
//! 2. 参考结构与目标元素数相同，且约化比例（排序后）相同
//! 3. 枚举数量相容的元素对应关系，得分为各对元素相似度之积：
//!    `exp(-|Δχ| / 0.5) · exp(-|Δr| / 0.3)`，性质缺失时该因子取 0.5
//! 4. 得分不低于阈值的候选按得分降序排列（并列时保持库顺序），取第一个
//! 5. 按共价半径比的平均值各向同性缩放晶格
//!
//! 任何内部失败都退化为 `Lookup::Empty`。
//!
//! ## 依赖关系
//! - 被 `acquire/pipeline.rs` 使用
//! - 使用 `models/element.rs` 查询电负性与共价半径

use super::Lookup;
use crate::models::composition::gcd;
use crate::models::{element, Composition, Lattice, Site, Structure};

use std::collections::HashMap;

/// 约化比例上限，超过则认为比例不现实
pub const MAX_REDUCED_RATIO: u32 = 4;

/// 默认相似度阈值
pub const DEFAULT_THRESHOLD: f64 = 0.1;

const ELECTRONEGATIVITY_SCALE: f64 = 0.5;
const RADIUS_SCALE: f64 = 0.3;
const MISSING_PROPERTY_FACTOR: f64 = 0.5;

/// 元素替换预测器
#[derive(Debug, Clone)]
pub struct SubstitutionPredictor {
    references: Vec<Structure>,
    threshold: f64,
}

/// 一个候选替换
#[derive(Debug, Clone)]
struct Candidate {
    reference: usize,
    score: f64,
    /// 参考元素 → 目标元素
    mapping: Vec<(String, String)>,
}

impl Default for SubstitutionPredictor {
    fn default() -> Self {
        Self::new(builtin_references(), DEFAULT_THRESHOLD)
    }
}

impl SubstitutionPredictor {
    pub fn new(references: Vec<Structure>, threshold: f64) -> Self {
        Self {
            references,
            threshold,
        }
    }

    /// 追加参考结构（例如本地结构库中的结构）
    pub fn with_references(mut self, extra: Vec<Structure>) -> Self {
        self.references.extend(extra);
        self
    }

    /// 预测结构
    pub fn predict(&self, composition: &Composition) -> Lookup<Structure> {
        let formula = composition.formula();

        if composition.len() < 2 {
            tracing::debug!(formula, "substitution needs at least two elements");
            return Lookup::Empty;
        }
        let Some(reduced) = composition.reduced_counts() else {
            tracing::debug!(formula, "substitution needs integral counts");
            return Lookup::Empty;
        };
        if reduced.iter().copied().max().unwrap_or(0) > MAX_REDUCED_RATIO {
            tracing::debug!(formula, "skipping substitution: ratio too high");
            return Lookup::Empty;
        }

        let targets: Vec<(&str, u32)> = composition.elements().into_iter().zip(reduced).collect();

        let mut candidates: Vec<Candidate> = self
            .references
            .iter()
            .enumerate()
            .flat_map(|(i, reference)| score_reference(i, reference, &targets))
            .filter(|c| c.score >= self.threshold)
            .collect();

        // sort_by 为稳定排序，得分相同时保持参考库顺序
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let Some(best) = candidates.into_iter().next() else {
            tracing::debug!(formula, "no substitution candidate above threshold");
            return Lookup::Empty;
        };

        let reference = &self.references[best.reference];
        tracing::info!(
            formula,
            reference = %reference.name,
            score = best.score,
            "substitution candidate selected"
        );
        Lookup::Found(apply_substitution(reference, &best.mapping, formula))
    }
}

/// 参考结构的 (元素, 约化数量)，按出现顺序
fn reference_stoichiometry(reference: &Structure) -> Option<Vec<(String, u32)>> {
    let mut counts: Vec<(String, u32)> = Vec::new();
    for site in &reference.sites {
        match counts.iter_mut().find(|(el, _)| *el == site.element) {
            Some((_, n)) => *n += 1,
            None => counts.push((site.element.clone(), 1)),
        }
    }
    let divisor = counts.iter().map(|(_, n)| *n).fold(0, gcd);
    if divisor == 0 {
        return None;
    }
    Some(counts.into_iter().map(|(el, n)| (el, n / divisor)).collect())
}

fn score_reference(index: usize, reference: &Structure, targets: &[(&str, u32)]) -> Vec<Candidate> {
    let Some(ref_counts) = reference_stoichiometry(reference) else {
        return Vec::new();
    };
    if ref_counts.len() != targets.len() {
        return Vec::new();
    }

    let mut sorted_ref: Vec<u32> = ref_counts.iter().map(|(_, n)| *n).collect();
    let mut sorted_target: Vec<u32> = targets.iter().map(|(_, n)| *n).collect();
    sorted_ref.sort_unstable();
    sorted_target.sort_unstable();
    if sorted_ref != sorted_target {
        return Vec::new();
    }

    permutations(targets.len())
        .into_iter()
        .filter(|perm| {
            perm.iter()
                .enumerate()
                .all(|(ri, &ti)| ref_counts[ri].1 == targets[ti].1)
        })
        .map(|perm| {
            let mapping: Vec<(String, String)> = perm
                .iter()
                .enumerate()
                .map(|(ri, &ti)| (ref_counts[ri].0.clone(), targets[ti].0.to_string()))
                .collect();
            let score: f64 = mapping
                .iter()
                .map(|(from, to)| similarity(from, to))
                .product();
            Candidate {
                reference: index,
                score,
                mapping,
            }
        })
        .collect()
}

/// 两个元素的化学相似度，范围 (0, 1]
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let chi = match (element::electronegativity(a), element::electronegativity(b)) {
        (Some(x), Some(y)) => (-(x - y).abs() / ELECTRONEGATIVITY_SCALE).exp(),
        _ => MISSING_PROPERTY_FACTOR,
    };
    let radius = match (element::covalent_radius(a), element::covalent_radius(b)) {
        (Some(x), Some(y)) => (-(x - y).abs() / RADIUS_SCALE).exp(),
        _ => MISSING_PROPERTY_FACTOR,
    };
    chi * radius
}

/// 替换元素并按半径比缩放晶格
fn apply_substitution(reference: &Structure, mapping: &[(String, String)], name: &str) -> Structure {
    let lookup: HashMap<&str, &str> = mapping
        .iter()
        .map(|(from, to)| (from.as_str(), to.as_str()))
        .collect();

    let sites: Vec<Site> = reference
        .sites
        .iter()
        .map(|s| {
            let element = lookup
                .get(s.element.as_str())
                .copied()
                .unwrap_or(s.element.as_str());
            Site::new(element, s.position)
        })
        .collect();

    let ratios: Vec<f64> = mapping
        .iter()
        .filter_map(|(from, to)| {
            Some(element::covalent_radius(to)? / element::covalent_radius(from)?)
        })
        .filter(|r| r.is_finite() && *r > 0.0)
        .collect();
    let factor = if ratios.is_empty() {
        1.0
    } else {
        ratios.iter().sum::<f64>() / ratios.len() as f64
    };

    let mut structure = Structure::new(name, reference.lattice.scaled(factor), sites);
    structure.space_group = reference.space_group.clone();
    structure
}

/// 0..n 的全排列（n 很小）
fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn extend(current: &mut Vec<usize>, used: &mut Vec<bool>, out: &mut Vec<Vec<usize>>) {
        if current.len() == used.len() {
            out.push(current.clone());
            return;
        }
        for i in 0..used.len() {
            if !used[i] {
                used[i] = true;
                current.push(i);
                extend(current, used, out);
                current.pop();
                used[i] = false;
            }
        }
    }

    let mut out = Vec::new();
    extend(&mut Vec::with_capacity(n), &mut vec![false; n], &mut out);
    out
}

/// 面心立方平移
const FCC: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.5, 0.5],
    [0.5, 0.0, 0.5],
    [0.5, 0.5, 0.0],
];

fn shifted(base: [f64; 3], shift: [f64; 3]) -> [f64; 3] {
    [
        (base[0] + shift[0]).rem_euclid(1.0),
        (base[1] + shift[1]).rem_euclid(1.0),
        (base[2] + shift[2]).rem_euclid(1.0),
    ]
}

fn fcc_sites(element: &str, offset: [f64; 3]) -> Vec<Site> {
    FCC.iter()
        .map(|t| Site::new(element, shifted(*t, offset)))
        .collect()
}

/// 内置参考结构库（常见二元、三元原型）
pub fn builtin_references() -> Vec<Structure> {
    let mut refs = Vec::new();

    // 岩盐 NaCl
    let mut sites = fcc_sites("Na", [0.0; 3]);
    sites.extend(fcc_sites("Cl", [0.5, 0.0, 0.0]));
    refs.push(Structure::new("NaCl", Lattice::cubic(5.64), sites).with_space_group("Fm-3m"));

    // 闪锌矿 ZnS
    let mut sites = fcc_sites("Zn", [0.0; 3]);
    sites.extend(fcc_sites("S", [0.25, 0.25, 0.25]));
    refs.push(Structure::new("ZnS", Lattice::cubic(5.41), sites).with_space_group("F-43m"));

    // 纤锌矿 ZnO
    let (u, third) = (0.382, 1.0 / 3.0);
    let sites = vec![
        Site::new("Zn", [third, 2.0 * third, 0.0]),
        Site::new("Zn", [2.0 * third, third, 0.5]),
        Site::new("O", [third, 2.0 * third, u]),
        Site::new("O", [2.0 * third, third, 0.5 + u]),
    ];
    refs.push(
        Structure::new("ZnO", Lattice::hexagonal(3.25, 5.21), sites).with_space_group("P6_3mc"),
    );

    // 萤石 CaF2
    let mut sites = fcc_sites("Ca", [0.0; 3]);
    for x in [0.25, 0.75] {
        for y in [0.25, 0.75] {
            for z in [0.25, 0.75] {
                sites.push(Site::new("F", [x, y, z]));
            }
        }
    }
    refs.push(Structure::new("CaF2", Lattice::cubic(5.46), sites).with_space_group("Fm-3m"));

    // 金红石 TiO2
    let u = 0.305;
    let sites = vec![
        Site::new("Ti", [0.0, 0.0, 0.0]),
        Site::new("Ti", [0.5, 0.5, 0.5]),
        Site::new("O", [u, u, 0.0]),
        Site::new("O", [1.0 - u, 1.0 - u, 0.0]),
        Site::new("O", [0.5 + u, 0.5 - u, 0.5]),
        Site::new("O", [0.5 - u, 0.5 + u, 0.5]),
    ];
    refs.push(
        Structure::new(
            "TiO2",
            Lattice::from_parameters(4.594, 4.594, 2.959, 90.0, 90.0, 90.0),
            sites,
        )
        .with_space_group("P4_2/mnm"),
    );

    // L1_2 Cu3Au
    let sites = vec![
        Site::new("Au", [0.0, 0.0, 0.0]),
        Site::new("Cu", [0.5, 0.5, 0.0]),
        Site::new("Cu", [0.5, 0.0, 0.5]),
        Site::new("Cu", [0.0, 0.5, 0.5]),
    ];
    refs.push(Structure::new("AuCu3", Lattice::cubic(3.75), sites).with_space_group("Pm-3m"));

    // 钙钛矿 SrTiO3
    let sites = vec![
        Site::new("Sr", [0.0, 0.0, 0.0]),
        Site::new("Ti", [0.5, 0.5, 0.5]),
        Site::new("O", [0.5, 0.5, 0.0]),
        Site::new("O", [0.5, 0.0, 0.5]),
        Site::new("O", [0.0, 0.5, 0.5]),
    ];
    refs.push(Structure::new("SrTiO3", Lattice::cubic(3.905), sites).with_space_group("Pm-3m"));

    // 黄铜矿 CuFeS2（体心四方，两组平移）
    let x = 0.2574;
    let mut sites = Vec::new();
    for t in [[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]] {
        for p in [[0.0, 0.0, 0.0], [0.0, 0.5, 0.25]] {
            sites.push(Site::new("Cu", shifted(p, t)));
        }
        for p in [[0.0, 0.0, 0.5], [0.0, 0.5, 0.75]] {
            sites.push(Site::new("Fe", shifted(p, t)));
        }
        for p in [
            [x, 0.25, 0.125],
            [1.0 - x, 0.75, 0.125],
            [0.75, x, 0.875],
            [0.25, 1.0 - x, 0.875],
        ] {
            sites.push(Site::new("S", shifted(p, t)));
        }
    }
    refs.push(
        Structure::new(
            "CuFeS2",
            Lattice::from_parameters(5.29, 5.29, 10.42, 90.0, 90.0, 90.0),
            sites,
        )
        .with_space_group("I-42d"),
    );

    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(formula: &str) -> Composition {
        Composition::parse(formula).unwrap()
    }

    #[test]
    fn test_builtin_references_are_well_formed() {
        let refs = builtin_references();
        assert_eq!(refs.len(), 8);
        for r in &refs {
            assert!(r.check_geometry().is_ok(), "{} is malformed", r.name);
            assert!(r.space_group.is_some());
        }
        let chalcopyrite = refs.iter().find(|r| r.name == "CuFeS2").unwrap();
        assert_eq!(chalcopyrite.num_sites(), 16);
    }

    #[test]
    fn test_similarity_properties() {
        assert!((similarity("Zn", "Zn") - 1.0).abs() < 1e-12);
        assert!(similarity("S", "Se") > similarity("S", "O"));
        assert!(similarity("Na", "K") > similarity("Na", "F"));
        // Og 没有性质数据
        assert!((similarity("Og", "Rn") - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_predicts_zincblende_for_znse() {
        let predictor = SubstitutionPredictor::default();
        let s = predictor.predict(&comp("ZnSe")).found().unwrap();

        assert_eq!(s.name, "ZnSe");
        assert_eq!(s.space_group.as_deref(), Some("F-43m"));
        assert_eq!(s.num_sites(), 8);
        assert_eq!(s.sites.iter().filter(|x| x.element == "Se").count(), 4);
        // Se 比 S 大，晶格应被放大
        assert!(s.volume() > 5.41f64.powi(3));
    }

    #[test]
    fn test_identity_substitution_for_reference_formula() {
        let predictor = SubstitutionPredictor::default();
        let s = predictor.predict(&comp("SrTiO3")).found().unwrap();
        assert_eq!(s.space_group.as_deref(), Some("Pm-3m"));
        assert!((s.volume() - 3.905f64.powi(3)).abs() < 1e-6);
    }

    #[test]
    fn test_preconditions_reject() {
        let predictor = SubstitutionPredictor::default();
        assert_eq!(predictor.predict(&comp("Fe")), Lookup::Empty);
        assert_eq!(predictor.predict(&comp("CN5")), Lookup::Empty);
        assert_eq!(predictor.predict(&comp("Fe0.5Ni0.5")), Lookup::Empty);
    }

    #[test]
    fn test_reduced_ratios_are_used() {
        // Zn2Se2 约化为 ZnSe
        let predictor = SubstitutionPredictor::default();
        assert!(predictor.predict(&comp("Zn2Se2")).found().is_some());
    }

    #[test]
    fn test_threshold_and_empty_corpus() {
        let strict = SubstitutionPredictor::new(builtin_references(), 1.1);
        assert_eq!(strict.predict(&comp("NaCl")), Lookup::Empty);

        let empty = SubstitutionPredictor::new(Vec::new(), DEFAULT_THRESHOLD);
        assert_eq!(empty.predict(&comp("NaCl")), Lookup::Empty);
    }

    #[test]
    fn test_no_matching_stoichiometry() {
        // 1:1:1 三元在内置库中没有对应参考
        let predictor = SubstitutionPredictor::default();
        assert_eq!(predictor.predict(&comp("LiMgN")), Lookup::Empty);
    }

    #[test]
    fn test_permutations() {
        assert_eq!(permutations(1), vec![vec![0]]);
        assert_eq!(permutations(3).len(), 6);
    }
}
