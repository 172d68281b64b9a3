//! 读视图构建 - 能力层
//!
//! 预览、含解析、答案表需要从题库批量取内容后与本地引用合并；
//! 统计只使用本地快照字段，题库不可用时仍可计算。
//! 所有视图的顺序都是分区按 `display_order`、分区内按 `seq`。

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::clients::QuestionStore;
use crate::error::{CatalogError, CatalogResult, NotFoundError};
use crate::models::{
    AnswerKeyEntry, AnswerKeyView, MergedQuestion, QuestionContent, SectionStats, SectionView,
    Test, TestStats, TestView,
};
use crate::services::marking;

/// 合并时保留哪些题库字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// 去掉答案与解析
    Preview,
    /// 保留题库返回的全部内容
    WithSolutions,
}

/// 按展示顺序批量读取试卷引用的题目内容
///
/// 题库中缺失的题目以 `NotFound` 列出。
pub async fn fetch_contents(
    test: &Test,
    store: &dyn QuestionStore,
) -> CatalogResult<HashMap<String, QuestionContent>> {
    let ids: Vec<String> = test
        .flatten()
        .into_iter()
        .map(|(_, r)| r.question_id.clone())
        .collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let fetched = store.fetch(&ids).await?;
    if fetched.len() != ids.len() {
        return Err(CatalogError::malformed(
            "fetch",
            format!("请求 {} 道题，返回 {} 项", ids.len(), fetched.len()),
        ));
    }

    let mut contents = HashMap::with_capacity(ids.len());
    let mut missing = Vec::new();
    for (id, item) in ids.into_iter().zip(fetched) {
        match item {
            Some(content) => {
                contents.insert(id, content);
            }
            None => missing.push(id),
        }
    }
    if !missing.is_empty() {
        return Err(NotFoundError::Questions {
            question_ids: missing,
        }
        .into());
    }
    debug!("试卷 {} 取回 {} 道题目内容", test.test_id, contents.len());
    Ok(contents)
}

/// 合并引用与内容
pub fn merge(
    test: &Test,
    mut contents: HashMap<String, QuestionContent>,
    mode: ContentMode,
) -> CatalogResult<TestView> {
    let mut view = TestView::header(test);
    for section in test.sections_in_order() {
        let mut section_view = SectionView::header(section);
        for reference in section.references_in_order() {
            let content = contents
                .remove(&reference.question_id)
                .ok_or_else(|| NotFoundError::Questions {
                    question_ids: vec![reference.question_id.clone()],
                })?;
            let content = match mode {
                ContentMode::Preview => content.without_answers(),
                ContentMode::WithSolutions => content,
            };
            section_view.questions.push(MergedQuestion {
                reference: reference.clone(),
                resolved_marks: marking::resolve(reference, section),
                content: content.into(),
            });
        }
        view.sections.push(section_view);
    }
    Ok(view)
}

/// 答案表：只保留标准答案
pub fn answer_key(test: &Test, contents: &HashMap<String, QuestionContent>) -> AnswerKeyView {
    let entries = test
        .flatten()
        .into_iter()
        .map(|(section, reference)| AnswerKeyEntry {
            question_id: reference.question_id.clone(),
            section_id: section.section_id.clone(),
            seq: reference.seq,
            answer: contents
                .get(&reference.question_id)
                .and_then(|c| c.answer_key.clone()),
        })
        .collect();
    AnswerKeyView {
        test_id: test.test_id.clone(),
        version: test.version,
        entries,
    }
}

/// 统计（只读本地快照）
pub fn stats(test: &Test) -> TestStats {
    let mut result = TestStats {
        test_id: test.test_id.clone(),
        version: test.version,
        total_questions: 0,
        total_marks: 0.0,
        unresolved_marks: 0,
        difficulty_distribution: BTreeMap::new(),
        type_distribution: BTreeMap::new(),
        topic_coverage: BTreeMap::new(),
        section_stats: Vec::with_capacity(test.sections.len()),
    };

    for section in test.sections_in_order() {
        let mut section_stats = SectionStats {
            section_id: section.section_id.clone(),
            display_order: section.display_order,
            count: section.questions.len(),
            by_type: BTreeMap::new(),
            total_marks: 0.0,
        };

        for reference in &section.questions {
            *result
                .difficulty_distribution
                .entry(reference.difficulty)
                .or_default() += 1;
            *result
                .type_distribution
                .entry(reference.question_type)
                .or_default() += 1;
            *section_stats.by_type.entry(reference.question_type).or_default() += 1;
            for topic in &reference.topic_ids {
                *result.topic_coverage.entry(topic.clone()).or_default() += 1;
            }

            match marking::resolve(reference, section) {
                Some(marks) if !reference.is_bonus => section_stats.total_marks += marks.marks,
                Some(_) => {}
                None => result.unresolved_marks += 1,
            }
        }

        result.total_questions += section_stats.count;
        result.total_marks += section_stats.total_marks;
        result.section_stats.push(section_stats);
    }
    result
}
