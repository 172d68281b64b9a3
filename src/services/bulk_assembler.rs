//! 批量组卷 - 能力层
//!
//! 负责：
//! - 校验批量请求并构造对题库的查询（排除整张试卷已有的题目）
//! - 按策略从题库取候选
//! - 把题目摘要转换成带快照字段的引用
//!
//! 不读写试卷存储，写入由流程层统一完成。

use std::collections::BTreeSet;
use tracing::debug;

use crate::clients::QuestionStore;
use crate::error::{CatalogResult, ValidationError};
use crate::models::{
    BulkAddRequest, DiscoveryOrder, QuestionQuery, QuestionReference, QuestionSummary, Section,
    SelectionStrategy, Test,
};
use crate::services::marking;

/// 引用上的题目级设置
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReferenceFlags {
    pub marks: Option<f64>,
    pub negative_marks: Option<f64>,
    pub is_bonus: bool,
    pub is_optional: bool,
}

impl From<&QuestionReference> for ReferenceFlags {
    fn from(r: &QuestionReference) -> Self {
        Self {
            marks: r.marks,
            negative_marks: r.negative_marks,
            is_bonus: r.is_bonus,
            is_optional: r.is_optional,
        }
    }
}

/// 用题目当前的分类字段生成引用快照
///
/// 题目学科必须与分区一致，且分值必须可解析（有覆盖或评分方案中有该题型）。
/// 返回的引用 `seq` 为 0，由序号维护负责分配。
pub fn snapshot(
    section: &Section,
    question: &QuestionSummary,
    flags: ReferenceFlags,
) -> CatalogResult<QuestionReference> {
    if question.subject_id != section.subject_id {
        return Err(ValidationError::SubjectMismatch {
            question_id: question.question_id.clone(),
            expected: section.subject_id.clone(),
            actual: question.subject_id.clone(),
        }
        .into());
    }

    let reference = QuestionReference {
        seq: 0,
        question_id: question.question_id.clone(),
        question_type: question.question_type,
        subject_id: question.subject_id.clone(),
        topic_ids: question.topic_ids.clone(),
        difficulty: question.difficulty,
        marks: flags.marks,
        negative_marks: flags.negative_marks,
        is_bonus: flags.is_bonus,
        is_optional: flags.is_optional,
    };
    if !marking::is_resolvable(&reference, section) {
        return Err(ValidationError::MissingMarkingScheme {
            section_id: section.section_id.clone(),
            question_id: question.question_id.clone(),
            question_type: question.question_type,
        }
        .into());
    }
    Ok(reference)
}

/// 校验批量请求并生成查询
///
/// 学科固定为分区学科；排除整张试卷中已有的题目，保证跨分区不重复。
pub fn build_query(
    test: &Test,
    section: &Section,
    request: &BulkAddRequest,
    max_count: usize,
) -> CatalogResult<QuestionQuery> {
    if request.count == 0 || request.count > max_count {
        return Err(ValidationError::InvalidCount {
            count: request.count,
            max: max_count,
        }
        .into());
    }

    let mut criteria = request.criteria.clone();
    if let Some(range) = criteria.difficulty {
        if range.min > range.max {
            return Err(ValidationError::InvalidDifficultyRange {
                min: range.min,
                max: range.max,
            }
            .into());
        }
    }
    match &criteria.subject_id {
        Some(subject_id) if subject_id != &section.subject_id => {
            return Err(ValidationError::CriteriaSubjectMismatch {
                section_id: section.section_id.clone(),
                expected: section.subject_id.clone(),
                actual: subject_id.clone(),
            }
            .into());
        }
        Some(_) => {}
        None => criteria.subject_id = Some(section.subject_id.clone()),
    }

    Ok(QuestionQuery::new(criteria, test.question_ids()))
}

/// 按策略选取最多 `count` 道候选题
///
/// 返回结果已在本地按查询条件复核并去重，可能少于 `count`。
pub async fn select(
    store: &dyn QuestionStore,
    query: &QuestionQuery,
    strategy: SelectionStrategy,
    count: usize,
    seed: Option<u64>,
) -> CatalogResult<Vec<QuestionSummary>> {
    let candidates = match strategy {
        SelectionStrategy::Random => {
            let sampled = store.sample(query, count, seed).await?;
            accept(query, sampled, count)
        }
        SelectionStrategy::DifficultySorted => {
            let mut found = discover_up_to(store, query, DiscoveryOrder::DifficultyAsc, count).await?;
            found.sort_by(|a, b| {
                a.difficulty
                    .cmp(&b.difficulty)
                    .then_with(|| a.question_id.cmp(&b.question_id))
            });
            found
        }
        SelectionStrategy::Sequential => {
            discover_up_to(store, query, DiscoveryOrder::CreationOrder, count).await?
        }
    };
    debug!(
        "策略 {} 选出 {}/{} 道候选题",
        strategy.as_str(),
        candidates.len(),
        count
    );
    Ok(candidates)
}

/// 分页发现，直到凑满 `count` 或候选耗尽
async fn discover_up_to(
    store: &dyn QuestionStore,
    query: &QuestionQuery,
    order: DiscoveryOrder,
    count: usize,
) -> CatalogResult<Vec<QuestionSummary>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let mut accepted: Vec<QuestionSummary> = Vec::with_capacity(count);
    let mut offset = 0;

    loop {
        let page = store.discover(query, order, count, offset).await?;
        let exhausted = page.len() < count;
        offset += page.len();

        let mut merged = std::mem::take(&mut accepted);
        merged.extend(page);
        accepted = accept(query, merged, count);

        if exhausted || accepted.len() >= count {
            return Ok(accepted);
        }
    }
}

/// 本地复核：去掉不满足条件或重复的题目，保留原顺序并截断
fn accept(query: &QuestionQuery, candidates: Vec<QuestionSummary>, count: usize) -> Vec<QuestionSummary> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    candidates
        .into_iter()
        .filter(|q| query.matches(q) && seen.insert(q.question_id.clone()))
        .take(count)
        .collect()
}
