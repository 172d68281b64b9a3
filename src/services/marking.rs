//! 分值解析
//!
//! 题目级覆盖优先，否则取分区评分方案中对应题型的规则。
//! 两者都没有时返回 `None`，由完整性检查负责报告，读路径不会因此失败。

use crate::models::{MarksOverride, QuestionReference, ResolvedMarks, Section};

/// 解析单个引用的实际分值
///
/// `marks` 与 `negative_marks` 分别解析：各自优先取覆盖值，缺失时回落到评分方案。
/// 加分题允许为 0 分。
pub fn resolve(reference: &QuestionReference, section: &Section) -> Option<ResolvedMarks> {
    let rule = section.marking_scheme.get(&reference.question_type);
    let marks = reference.marks.or(rule.map(|r| r.marks))?;
    let negative_marks = reference.negative_marks.or(rule.map(|r| r.negative_marks))?;
    Some(ResolvedMarks {
        marks,
        negative_marks,
        from_override: reference.marks.is_some() || reference.negative_marks.is_some(),
    })
}

/// 引用能否解析出分值
pub fn is_resolvable(reference: &QuestionReference, section: &Section) -> bool {
    resolve(reference, section).is_some()
}

/// 只修改覆盖中给出的字段
pub fn apply_override(reference: &mut QuestionReference, patch: &MarksOverride) {
    if let Some(marks) = patch.marks {
        reference.marks = Some(marks);
    }
    if let Some(negative_marks) = patch.negative_marks {
        reference.negative_marks = Some(negative_marks);
    }
    if let Some(is_bonus) = patch.is_bonus {
        reference.is_bonus = is_bonus;
    }
    if let Some(is_optional) = patch.is_optional {
        reference.is_optional = is_optional;
    }
}
