//! 比对两种传输对同一目录的读取结果。

use crate::inverter::RegisterGroup;
use domain::{DecodedRegister, RegisterSet};

/// 单个寄存器的比对结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 左侧本轮未尝试读取
    Skipped,
    /// 原始字节一致
    Match,
    /// 原始字节不同
    Mismatch,
}

#[derive(Debug, Clone, Copy)]
pub struct RegisterComparison<'a> {
    pub group: RegisterGroup,
    pub left: &'a DecodedRegister,
    pub right: &'a DecodedRegister,
    pub outcome: Outcome,
}

/// 按目录顺序并排比对两组结果。
///
/// 两组应来自同一目录；长度不同时只比对共同前缀。
pub fn compare<'a>(left: &'a RegisterSet, right: &'a RegisterSet) -> Vec<RegisterComparison<'a>> {
    let input = left
        .input
        .iter()
        .zip(&right.input)
        .map(|pair| (RegisterGroup::Input, pair));
    let holding = left
        .holding
        .iter()
        .zip(&right.holding)
        .map(|pair| (RegisterGroup::Holding, pair));

    input
        .chain(holding)
        .map(|(group, (left, right))| {
            let outcome = if !left.supported {
                Outcome::Skipped
            } else if left.raw == right.raw {
                Outcome::Match
            } else {
                Outcome::Mismatch
            };
            RegisterComparison {
                group,
                left,
                right,
                outcome,
            }
        })
        .collect()
}
