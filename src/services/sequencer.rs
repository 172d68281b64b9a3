//! 序号维护 - 能力层
//!
//! 保证每个分区的 `seq` 始终是从 1 开始的连续整数。所有函数都直接修改传入的分区，
//! 失败时分区保持原样；成功后 `questions` 按 `seq` 升序存放，`total_questions` 同步更新。

use std::collections::{BTreeSet, HashMap};

use crate::error::{CatalogResult, ValidationError};
use crate::models::{QuestionReference, ReorderEntry, Section};

/// 分区的 seq 是否恰好为 1..=N
pub fn is_contiguous(section: &Section) -> bool {
    let seqs: BTreeSet<u32> = section.questions.iter().map(|q| q.seq).collect();
    seqs.len() == section.questions.len() && seqs.iter().copied().eq(1..=section.questions.len() as u32)
}

/// 排序后的 seq 列表（用于报告）
pub fn seq_values(section: &Section) -> Vec<u32> {
    let mut seqs: Vec<u32> = section.questions.iter().map(|q| q.seq).collect();
    seqs.sort_unstable();
    seqs
}

/// 按 seq 重新排列并同步计数
fn settle(section: &mut Section) {
    section.questions.sort_by_key(|q| q.seq);
    section.refresh_count();
}

/// 追加到末尾：按给定顺序依次取 `max + 1`
pub fn append(section: &mut Section, refs: Vec<QuestionReference>) -> Vec<QuestionReference> {
    let mut next = section.max_seq();
    let added: Vec<QuestionReference> = refs
        .into_iter()
        .map(|mut r| {
            next += 1;
            r.seq = next;
            r
        })
        .collect();
    section.questions.extend(added.iter().cloned());
    settle(section);
    added
}

/// 从 `at` 位置插入，原有 `seq >= at` 的引用整体后移
///
/// # 参数
/// - `at`: 插入位置，合法范围 1..=N+1
pub fn insert_at(
    section: &mut Section,
    at: u32,
    refs: Vec<QuestionReference>,
) -> CatalogResult<Vec<QuestionReference>> {
    let max = section.questions.len() as u32 + 1;
    if at < 1 || at > max {
        return Err(ValidationError::SeqOutOfRange {
            section_id: section.section_id.clone(),
            seq: at,
            max,
        }
        .into());
    }

    let shift = refs.len() as u32;
    for q in section.questions.iter_mut().filter(|q| q.seq >= at) {
        q.seq += shift;
    }
    let added: Vec<QuestionReference> = refs
        .into_iter()
        .zip(at..)
        .map(|(mut r, seq)| {
            r.seq = seq;
            r
        })
        .collect();
    section.questions.extend(added.iter().cloned());
    settle(section);
    Ok(added)
}

/// 删除并压缩：之后的引用 seq 各减 1
pub fn remove(section: &mut Section, question_id: &str) -> Option<QuestionReference> {
    let idx = section.position_of(question_id)?;
    let removed = section.questions.remove(idx);
    for q in section.questions.iter_mut().filter(|q| q.seq > removed.seq) {
        q.seq -= 1;
    }
    settle(section);
    Some(removed)
}

/// 整体重排
///
/// `entries` 必须恰好覆盖分区内每一道题，且目标 seq 构成 1..=N 的排列；
/// 否则整体拒绝，不做任何修改。
pub fn reorder(section: &mut Section, entries: &[ReorderEntry]) -> CatalogResult<()> {
    let invalid = |reason: String| ValidationError::InvalidPermutation {
        section_id: section.section_id.clone(),
        reason,
    };
    let n = section.questions.len();

    if entries.len() != n {
        return Err(invalid(format!("需要 {} 项，实际 {} 项", n, entries.len())).into());
    }

    let mut targets: HashMap<&str, u32> = HashMap::with_capacity(n);
    let mut seen_seq: BTreeSet<u32> = BTreeSet::new();
    for entry in entries {
        if section.position_of(&entry.question_id).is_none() {
            return Err(invalid(format!("题目 {} 不在该分区", entry.question_id)).into());
        }
        if targets.insert(entry.question_id.as_str(), entry.seq).is_some() {
            return Err(invalid(format!("题目 {} 出现多次", entry.question_id)).into());
        }
        if entry.seq < 1 || entry.seq as usize > n {
            return Err(invalid(format!("序号 {} 超出 1..={}", entry.seq, n)).into());
        }
        if !seen_seq.insert(entry.seq) {
            return Err(invalid(format!("序号 {} 重复", entry.seq)).into());
        }
    }

    for q in section.questions.iter_mut() {
        if let Some(seq) = targets.get(q.question_id.as_str()) {
            q.seq = *seq;
        }
    }
    settle(section);
    Ok(())
}

/// 用 `new_ref` 替换 `old_id`
///
/// `keep_seq` 时原位替换；否则移动到 `target_seq`（缺省为末尾），其余引用随之平移，
/// 结果仍是 1..=N 的排列。
pub fn replace(
    section: &mut Section,
    old_id: &str,
    mut new_ref: QuestionReference,
    keep_seq: bool,
    target_seq: Option<u32>,
) -> CatalogResult<QuestionReference> {
    let n = section.questions.len() as u32;
    let idx = section
        .position_of(old_id)
        .ok_or_else(|| ValidationError::InvalidPermutation {
            section_id: section.section_id.clone(),
            reason: format!("题目 {} 不在该分区", old_id),
        })?;

    if keep_seq {
        new_ref.seq = section.questions[idx].seq;
        section.questions[idx] = new_ref.clone();
        settle(section);
        return Ok(new_ref);
    }

    let target = target_seq.unwrap_or(n);
    if target < 1 || target > n {
        return Err(ValidationError::SeqOutOfRange {
            section_id: section.section_id.clone(),
            seq: target,
            max: n,
        }
        .into());
    }

    remove(section, old_id);
    let mut added = insert_at(section, target, vec![new_ref])?;
    Ok(added.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::models::{MarkingScheme, QuestionType};

    fn reference(id: &str) -> QuestionReference {
        QuestionReference {
            seq: 0,
            question_id: id.to_string(),
            question_type: QuestionType::Mcq,
            subject_id: "phy".to_string(),
            topic_ids: Vec::new(),
            difficulty: 1,
            marks: None,
            negative_marks: None,
            is_bonus: false,
            is_optional: false,
        }
    }

    fn section_with(ids: &[&str]) -> Section {
        let mut section = Section {
            section_id: "s1".to_string(),
            section_code: "A".to_string(),
            name: "Physics".to_string(),
            display_order: 1,
            subject_id: "phy".to_string(),
            total_questions: 0,
            marking_scheme: MarkingScheme::new(),
            duration_minutes: None,
            is_optional: false,
            questions: Vec::new(),
        };
        append(&mut section, ids.iter().map(|id| reference(id)).collect());
        section
    }

    fn order(section: &Section) -> Vec<(u32, &str)> {
        section
            .questions
            .iter()
            .map(|q| (q.seq, q.question_id.as_str()))
            .collect()
    }

    #[test]
    fn test_append_assigns_next_seq() {
        let mut section = section_with(&["q1", "q2"]);
        let added = append(&mut section, vec![reference("q3")]);
        assert_eq!(added[0].seq, 3);
        assert_eq!(section.total_questions, 3);
        assert!(is_contiguous(&section));
    }

    #[test]
    fn test_remove_compacts() {
        let mut section = section_with(&["q1", "q2", "q3"]);
        let removed = remove(&mut section, "q1").unwrap();
        assert_eq!(removed.seq, 1);
        assert_eq!(order(&section), vec![(1, "q2"), (2, "q3")]);
        assert_eq!(section.total_questions, 2);
        assert!(remove(&mut section, "nope").is_none());
    }

    #[test]
    fn test_insert_at_shifts_tail() {
        let mut section = section_with(&["q1", "q2"]);
        insert_at(&mut section, 2, vec![reference("n1"), reference("n2")]).unwrap();
        assert_eq!(
            order(&section),
            vec![(1, "q1"), (2, "n1"), (3, "n2"), (4, "q2")]
        );

        let err = insert_at(&mut section, 6, vec![reference("x")]).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::SeqOutOfRange { max: 5, .. })
        ));
        assert_eq!(section.total_questions, 4);
    }

    #[test]
    fn test_reorder_applies_permutation() {
        let mut section = section_with(&["q1", "q2", "q3"]);
        let entries = vec![
            ReorderEntry { question_id: "q1".into(), seq: 3 },
            ReorderEntry { question_id: "q2".into(), seq: 1 },
            ReorderEntry { question_id: "q3".into(), seq: 2 },
        ];
        reorder(&mut section, &entries).unwrap();
        assert_eq!(order(&section), vec![(1, "q2"), (2, "q3"), (3, "q1")]);
    }

    #[test]
    fn test_reorder_rejects_partial_and_duplicate_seq() {
        let mut section = section_with(&["q1", "q2", "q3"]);
        let before = section.clone();

        let partial = vec![
            ReorderEntry { question_id: "q1".into(), seq: 2 },
            ReorderEntry { question_id: "q2".into(), seq: 1 },
        ];
        assert!(reorder(&mut section, &partial).is_err());

        let duplicate = vec![
            ReorderEntry { question_id: "q1".into(), seq: 1 },
            ReorderEntry { question_id: "q2".into(), seq: 1 },
            ReorderEntry { question_id: "q3".into(), seq: 2 },
        ];
        assert!(reorder(&mut section, &duplicate).is_err());

        let repeated_id = vec![
            ReorderEntry { question_id: "q1".into(), seq: 1 },
            ReorderEntry { question_id: "q1".into(), seq: 2 },
            ReorderEntry { question_id: "q3".into(), seq: 3 },
        ];
        assert!(reorder(&mut section, &repeated_id).is_err());

        assert_eq!(section, before);
    }

    #[test]
    fn test_replace_keeps_seq_by_default() {
        let mut section = section_with(&["q1", "q2", "q3"]);
        let new_ref = replace(&mut section, "q2", reference("n2"), true, None).unwrap();
        assert_eq!(new_ref.seq, 2);
        assert_eq!(order(&section), vec![(1, "q1"), (2, "n2"), (3, "q3")]);
    }

    #[test]
    fn test_replace_moves_to_target() {
        let mut section = section_with(&["q1", "q2", "q3"]);
        replace(&mut section, "q3", reference("n3"), false, Some(1)).unwrap();
        assert_eq!(order(&section), vec![(1, "n3"), (2, "q1"), (3, "q2")]);

        replace(&mut section, "n3", reference("m3"), false, None).unwrap();
        assert_eq!(order(&section), vec![(1, "q1"), (2, "q2"), (3, "m3")]);

        let before = section.clone();
        assert!(replace(&mut section, "q1", reference("x"), false, Some(4)).is_err());
        assert_eq!(section, before);
    }
}
