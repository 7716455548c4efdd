//! # 晶体结构数据模型
//!
//! 定义统一的晶体结构表示：晶格 + 有序的 (元素, 分数坐标) 位点列表。
//! 结构是值对象，生成后唯一允许的原地修改是校验阶段的
//! 体积缩放与位点规范化排序。
//!
//! ## 依赖关系
//! - 被 `acquire/` 和 `parsers/` 使用
//! - 使用 `models/element.rs` 查询电负性（排序用）

use crate::error::{CrysfetchError, Result};
use crate::models::element;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// 体积低于该值的晶胞视为退化
pub const DEGENERATE_VOLUME: f64 = 1e-8;

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).max(0.0).sqrt();

        Lattice {
            matrix: [a_vec, b_vec, [c1, c2, c3]],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 立方晶格
    pub fn cubic(a: f64) -> Self {
        Self::from_parameters(a, a, a, 90.0, 90.0, 90.0)
    }

    /// 六方晶格 (gamma = 120°)
    pub fn hexagonal(a: f64, c: f64) -> Self {
        Self::from_parameters(a, a, c, 90.0, 90.0, 120.0)
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a_vec, b_vec, c_vec] = self.matrix;

        let a = norm(a_vec);
        let b = norm(b_vec);
        let c = norm(c_vec);

        let alpha = (dot(b_vec, c_vec) / (b * c)).acos().to_degrees();
        let beta = (dot(a_vec, c_vec) / (a * c)).acos().to_degrees();
        let gamma = (dot(a_vec, b_vec) / (a * b)).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶格体积（取绝对值）
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;

        // 行列式计算
        (a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0]))
            .abs()
    }

    /// 体积为零、非有限或向量线性相关
    pub fn is_degenerate(&self) -> bool {
        let vol = self.volume();
        !vol.is_finite() || vol < DEGENERATE_VOLUME
    }

    /// 各向同性缩放到目标体积，分数坐标保持不变
    pub fn scaled_to_volume(&self, target: f64) -> Result<Lattice> {
        let current = self.volume();
        if self.is_degenerate() || !target.is_finite() || target <= 0.0 {
            return Err(CrysfetchError::InvalidStructure(format!(
                "cannot scale lattice of volume {} to {}",
                current, target
            )));
        }
        let factor = (target / current).cbrt();
        Ok(self.scaled(factor))
    }

    /// 按线性因子缩放
    pub fn scaled(&self, factor: f64) -> Lattice {
        let mut matrix = self.matrix;
        for row in matrix.iter_mut() {
            for v in row.iter_mut() {
                *v *= factor;
            }
        }
        Lattice { matrix }
    }
}

fn dot(u: [f64; 3], v: [f64; 3]) -> f64 {
    u.iter().zip(v.iter()).map(|(x, y)| x * y).sum()
}

fn norm(u: [f64; 3]) -> f64 {
    dot(u, u).sqrt()
}

/// 晶体中的一个位点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// 元素符号
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],
}

impl Site {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Site {
            element: element.into(),
            position,
        }
    }
}

/// 晶体结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// 结构名称（通常为化学式）
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 位点列表
    pub sites: Vec<Site>,

    /// 空间群符号
    pub space_group: Option<String>,
}

impl Structure {
    pub fn new(name: impl Into<String>, lattice: Lattice, sites: Vec<Site>) -> Self {
        Structure {
            name: name.into(),
            lattice,
            sites,
            space_group: None,
        }
    }

    pub fn with_space_group(mut self, symbol: impl Into<String>) -> Self {
        self.space_group = Some(symbol.into());
        self
    }

    /// 晶胞体积 (Å³)
    pub fn volume(&self) -> f64 {
        self.lattice.volume()
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    /// 结构中出现的元素（去重，按出现顺序）
    pub fn elements(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for site in &self.sites {
            if !seen.contains(&site.element.as_str()) {
                seen.push(site.element.as_str());
            }
        }
        seen
    }

    /// 基本几何合法性：有位点、体积非退化、坐标有限
    pub fn check_geometry(&self) -> Result<()> {
        if self.sites.is_empty() {
            return Err(CrysfetchError::InvalidStructure(format!(
                "{}: empty site list",
                self.name
            )));
        }
        if self.lattice.is_degenerate() {
            return Err(CrysfetchError::InvalidStructure(format!(
                "{}: degenerate cell (volume {})",
                self.name,
                self.volume()
            )));
        }
        if self
            .sites
            .iter()
            .any(|s| s.position.iter().any(|v| !v.is_finite()))
        {
            return Err(CrysfetchError::InvalidStructure(format!(
                "{}: non-finite fractional coordinate",
                self.name
            )));
        }
        Ok(())
    }

    /// 缩放晶格使体积为目标值，分数坐标不变
    pub fn scale_to_volume(&mut self, target: f64) -> Result<()> {
        self.lattice = self.lattice.scaled_to_volume(target)?;
        Ok(())
    }

    /// 规范化位点顺序：电负性升序，其次元素符号，最后分数坐标
    ///
    /// 未知电负性的元素排在最后。
    pub fn sort_sites(&mut self) {
        self.sites.sort_by(|a, b| {
            let chi_a = element::electronegativity(&a.element).unwrap_or(f64::INFINITY);
            let chi_b = element::electronegativity(&b.element).unwrap_or(f64::INFINITY);
            chi_a
                .total_cmp(&chi_b)
                .then_with(|| a.element.cmp(&b.element))
                .then_with(|| {
                    a.position
                        .iter()
                        .zip(b.position.iter())
                        .map(|(x, y)| x.total_cmp(y))
                        .find(|o| *o != Ordering::Equal)
                        .unwrap_or(Ordering::Equal)
                })
        });
    }

    /// 计算化学式（元素按字母序）
    pub fn formula(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for site in &self.sites {
            *counts.entry(site.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// 每原子体积
    pub fn volume_per_site(&self) -> Option<f64> {
        if self.sites.is_empty() {
            None
        } else {
            Some(self.volume() / self.sites.len() as f64)
        }
    }
}
