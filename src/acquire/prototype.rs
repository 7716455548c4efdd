//! # 原型模板生成
//!
//! 用一张声明式表把 (元素数, 化学计量类别) 映射到原型模板，
//! 纯几何构造，不依赖任何外部服务。
//!
//! | 元素数 | 类别 | 模板 | 空间群 | 位点 |
//! |---|---|---|---|---|
//! | 2 | 常见二元比例 | AB₃ 立方 | Pm-3m | 1 A + 4 B |
//! | 3 | 任意 | ABX₂ 六方层状 | P-3m1 | 1 A + 1 B + 2 X |
//!
//! 坐标是占位值，不代表经过验证的晶体学数据。
//!
//! ## 依赖关系
//! - 被 `acquire/pipeline.rs` 使用
//! - 使用 `acquire/validator.rs`

use super::validator;
use crate::models::{Composition, Lattice, Site, Structure};

/// 化学计量类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoichiometryClass {
    /// 1:1、1:2、1:3 系列二元
    CommonBinary,
    /// 任意三元
    Ternary,
}

/// 模板中的位点角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    A,
    B,
    X,
}

/// 模板晶胞形状
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellShape {
    Cubic { a: f64 },
    Hexagonal { a: f64, c: f64 },
}

impl CellShape {
    fn lattice(&self) -> Lattice {
        match *self {
            CellShape::Cubic { a } => Lattice::cubic(a),
            CellShape::Hexagonal { a, c } => Lattice::hexagonal(a, c),
        }
    }
}

/// 原型模板
#[derive(Debug, PartialEq)]
pub struct PrototypeTemplate {
    pub name: &'static str,
    pub space_group: &'static str,
    pub cell: CellShape,
    pub sites: &'static [(Role, [f64; 3])],
}

impl PrototypeTemplate {
    /// 模板中出现的角色（按首次出现顺序）
    pub fn roles(&self) -> Vec<Role> {
        let mut roles = Vec::new();
        for (role, _) in self.sites {
            if !roles.contains(role) {
                roles.push(*role);
            }
        }
        roles
    }

    /// 被复制最多的角色，由数量最多的元素占据
    fn replicated_role(&self) -> Role {
        let roles = self.roles();
        roles
            .iter()
            .copied()
            .max_by_key(|r| self.sites.iter().filter(|(x, _)| x == r).count())
            .unwrap_or(Role::A)
    }
}

const THIRD: f64 = 1.0 / 3.0;

pub const AB3_CUBIC: PrototypeTemplate = PrototypeTemplate {
    name: "AB3",
    space_group: "Pm-3m",
    cell: CellShape::Cubic { a: 6.0 },
    sites: &[
        (Role::A, [0.0, 0.0, 0.0]),
        (Role::B, [0.5, 0.5, 0.5]),
        (Role::B, [0.5, 0.0, 0.0]),
        (Role::B, [0.0, 0.5, 0.0]),
        (Role::B, [0.0, 0.0, 0.5]),
    ],
};

pub const ABX2_HEXAGONAL: PrototypeTemplate = PrototypeTemplate {
    name: "ABX2",
    space_group: "P-3m1",
    cell: CellShape::Hexagonal { a: 3.0, c: 5.0 },
    sites: &[
        (Role::A, [0.0, 0.0, 0.0]),
        (Role::B, [THIRD, 2.0 * THIRD, 0.5]),
        (Role::X, [THIRD, 2.0 * THIRD, 0.25]),
        (Role::X, [2.0 * THIRD, THIRD, 0.75]),
    ],
};

/// (元素数, 类别) → 模板
pub struct PrototypeRule {
    pub element_count: usize,
    pub class: StoichiometryClass,
    pub template: &'static PrototypeTemplate,
}

pub const PROTOTYPE_TABLE: &[PrototypeRule] = &[
    PrototypeRule {
        element_count: 2,
        class: StoichiometryClass::CommonBinary,
        template: &AB3_CUBIC,
    },
    PrototypeRule {
        element_count: 3,
        class: StoichiometryClass::Ternary,
        template: &ABX2_HEXAGONAL,
    },
];

/// 组分的化学计量类别：先看元素数，再看比例是否合法
pub fn classify(composition: &Composition) -> Option<StoichiometryClass> {
    match composition.len() {
        2 if validator::validate(composition) => Some(StoichiometryClass::CommonBinary),
        3 if validator::validate(composition) => Some(StoichiometryClass::Ternary),
        _ => None,
    }
}

/// 为组分选择模板
pub fn select_template(composition: &Composition) -> Option<&'static PrototypeTemplate> {
    let class = classify(composition)?;
    PROTOTYPE_TABLE
        .iter()
        .find(|rule| rule.element_count == composition.len() && rule.class == class)
        .map(|rule| rule.template)
}

/// 原型结构生成器
#[derive(Debug, Default, Clone, Copy)]
pub struct PrototypeGenerator;

impl PrototypeGenerator {
    pub fn generate(&self, composition: &Composition) -> Option<Structure> {
        let template = select_template(composition)?;
        let assignment = assign_roles(template, composition)?;

        let sites: Vec<Site> = template
            .sites
            .iter()
            .map(|(role, pos)| {
                let element = assignment
                    .iter()
                    .find(|(r, _)| r == role)
                    .map(|(_, el)| *el)
                    .unwrap_or("X");
                Site::new(element, *pos)
            })
            .collect();

        let structure = Structure::new(composition.formula(), template.cell.lattice(), sites)
            .with_space_group(template.space_group);

        match structure.check_geometry() {
            Ok(()) => {
                tracing::info!(
                    formula = composition.formula(),
                    prototype = template.name,
                    "prototype structure generated"
                );
                Some(structure)
            }
            Err(e) => {
                tracing::warn!(formula = composition.formula(), "prototype construction failed: {}", e);
                None
            }
        }
    }
}

/// 数量最多的元素占复制角色，其余按组分顺序依次占据剩余角色
fn assign_roles<'a>(
    template: &PrototypeTemplate,
    composition: &'a Composition,
) -> Option<Vec<(Role, &'a str)>> {
    let roles = template.roles();
    if roles.len() != composition.len() {
        return None;
    }

    let replicated = template.replicated_role();
    // max_by 在并列时返回最后一个
    let (major, _) = composition
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    let mut others = composition.iter().map(|(el, _)| el).filter(|el| *el != major);
    let assignment = roles
        .into_iter()
        .map(|role| {
            if role == replicated {
                Some((role, major))
            } else {
                others.next().map(|el| (role, el))
            }
        })
        .collect::<Option<Vec<_>>>()?;

    Some(assignment)
}
