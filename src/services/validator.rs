//! 完整性检查 - 能力层
//!
//! 所有检查都会执行，违规项全部收集后一次性返回，不会遇到第一项就停止。
//!
//! 检查分三组：
//! 1. 本地结构（分区唯一性、显示顺序、计数、序号、重复题目、分值可解析）
//! 2. 题库（题目是否存在；严格模式下比对学科 / 知识点快照）
//! 3. 发布前额外要求（至少一个分区，每个分区至少一道题）

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::clients::QuestionStore;
use crate::error::CatalogResult;
use crate::models::{Test, ValidationReport, Violation};
use crate::services::{marking, sequencer};

/// 检查选项
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// 比对快照与题库当前分类
    pub strict_taxonomy: bool,
    /// 附加发布前检查
    pub for_publish: bool,
}

/// 执行全部检查
pub async fn validate(
    test: &Test,
    store: &dyn QuestionStore,
    options: CheckOptions,
) -> CatalogResult<ValidationReport> {
    let mut report = ValidationReport::new(&test.test_id, test.version);
    check_local(test, &mut report);
    check_external(test, store, options.strict_taxonomy, &mut report).await?;
    if options.for_publish {
        check_publish(test, &mut report);
    }
    debug!(
        "试卷 {} (版本 {}) 检查完成: {} 项违规",
        test.test_id,
        test.version,
        report.violations.len()
    );
    Ok(report)
}

/// 只依赖本地结构的检查
pub fn check_local(test: &Test, report: &mut ValidationReport) {
    let mut section_ids = BTreeSet::new();
    let mut section_codes = BTreeSet::new();
    for section in &test.sections {
        if !section_ids.insert(section.section_id.as_str()) {
            report.push(Violation::DuplicateSectionId {
                section_id: section.section_id.clone(),
            });
        }
        if !section_codes.insert(section.section_code.as_str()) {
            report.push(Violation::DuplicateSectionCode {
                section_code: section.section_code.clone(),
            });
        }
    }

    let mut orders: Vec<u32> = test.sections.iter().map(|s| s.display_order).collect();
    orders.sort_unstable();
    if !orders.iter().copied().eq(1..=orders.len() as u32) {
        report.push(Violation::DisplayOrderNotContiguous { found: orders });
    }

    // question_id -> 出现的分区
    let mut occurrences: BTreeMap<&str, Vec<String>> = BTreeMap::new();

    for section in test.sections_in_order() {
        if section.total_questions != section.questions.len() {
            report.push(Violation::TotalQuestionsMismatch {
                section_id: section.section_id.clone(),
                recorded: section.total_questions,
                actual: section.questions.len(),
            });
        }
        if !sequencer::is_contiguous(section) {
            report.push(Violation::SeqNotContiguous {
                section_id: section.section_id.clone(),
                found: sequencer::seq_values(section),
            });
        }
        for reference in section.references_in_order() {
            occurrences
                .entry(reference.question_id.as_str())
                .or_default()
                .push(section.section_id.clone());

            if !marking::is_resolvable(reference, section) {
                report.push(Violation::UnresolvedMarks {
                    section_id: section.section_id.clone(),
                    question_id: reference.question_id.clone(),
                    question_type: reference.question_type,
                });
            }
        }
    }

    for (question_id, section_ids) in occurrences {
        if section_ids.len() > 1 {
            report.push(Violation::DuplicateQuestionId {
                question_id: question_id.to_string(),
                section_ids,
            });
        }
    }
}

/// 题库相关检查；题库不可用时返回依赖错误
pub async fn check_external(
    test: &Test,
    store: &dyn QuestionStore,
    strict_taxonomy: bool,
    report: &mut ValidationReport,
) -> CatalogResult<()> {
    let ids = test.question_ids();
    if ids.is_empty() {
        return Ok(());
    }

    let existing = store.exists(&ids).await?;
    for (section, reference) in test.flatten() {
        if !existing.contains(&reference.question_id) {
            report.push(Violation::MissingQuestion {
                section_id: section.section_id.clone(),
                question_id: reference.question_id.clone(),
            });
        }
    }

    if !strict_taxonomy || existing.is_empty() {
        return Ok(());
    }

    let to_fetch: Vec<String> = existing.into_iter().collect();
    let fetched = store.fetch(&to_fetch).await?;
    let current: HashMap<&str, _> = fetched
        .iter()
        .flatten()
        .map(|q| (q.question_id.as_str(), q))
        .collect();

    for (section, reference) in test.flatten() {
        let Some(question) = current.get(reference.question_id.as_str()) else {
            continue;
        };
        if question.subject_id != reference.subject_id {
            report.push(Violation::SubjectMismatch {
                section_id: section.section_id.clone(),
                question_id: reference.question_id.clone(),
                recorded: reference.subject_id.clone(),
                current: question.subject_id.clone(),
            });
        }
        let recorded: BTreeSet<&String> = reference.topic_ids.iter().collect();
        let now: BTreeSet<&String> = question.topic_ids.iter().collect();
        if recorded != now {
            report.push(Violation::TopicMismatch {
                section_id: section.section_id.clone(),
                question_id: reference.question_id.clone(),
                recorded: reference.topic_ids.clone(),
                current: question.topic_ids.clone(),
            });
        }
    }
    Ok(())
}

/// 发布前额外检查
pub fn check_publish(test: &Test, report: &mut ValidationReport) {
    if test.sections.is_empty() {
        report.push(Violation::NoSections);
        return;
    }
    for section in test.sections_in_order() {
        if section.questions.is_empty() {
            report.push(Violation::EmptySection {
                section_id: section.section_id.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::InMemoryQuestionStore;
    use crate::error::CatalogError;
    use crate::models::{
        MarkingRule, MarkingScheme, QuestionContent, QuestionReference, QuestionType, Section,
        SolutionsConfig, TestSettings, TestStatus,
    };
    use chrono::Utc;

    fn reference(id: &str, seq: u32) -> QuestionReference {
        QuestionReference {
            seq,
            question_id: id.to_string(),
            question_type: QuestionType::Mcq,
            subject_id: "phy".to_string(),
            topic_ids: vec!["optics".to_string()],
            difficulty: 2,
            marks: None,
            negative_marks: None,
            is_bonus: false,
            is_optional: false,
        }
    }

    fn section(id: &str, order: u32, ids: &[&str]) -> Section {
        let mut scheme = MarkingScheme::new();
        scheme.insert(QuestionType::Mcq, MarkingRule::new(4.0, -1.0));
        let questions: Vec<QuestionReference> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| reference(id, i as u32 + 1))
            .collect();
        Section {
            section_id: id.to_string(),
            section_code: id.to_uppercase(),
            name: id.to_string(),
            display_order: order,
            subject_id: "phy".to_string(),
            total_questions: questions.len(),
            marking_scheme: scheme,
            duration_minutes: None,
            is_optional: false,
            questions,
        }
    }

    fn test_with(sections: Vec<Section>) -> Test {
        Test {
            test_id: "t1".to_string(),
            code: "T1".to_string(),
            slug: "t1".to_string(),
            series_id: "series".to_string(),
            test_number: 1,
            name: "Test".to_string(),
            description: None,
            sections,
            settings: TestSettings::default(),
            solutions: SolutionsConfig::default(),
            status: TestStatus::Draft,
            is_active: true,
            tags: Vec::new(),
            version: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn content(id: &str, subject: &str, topic: &str) -> QuestionContent {
        QuestionContent {
            question_id: id.to_string(),
            question_type: QuestionType::Mcq,
            subject_id: subject.to_string(),
            topic_ids: vec![topic.to_string()],
            difficulty: 2,
            text: String::new(),
            options: Vec::new(),
            answer_key: None,
            solution: None,
            tags: Vec::new(),
            language: None,
            created_at: None,
            is_active: true,
        }
    }

    async fn store_with(ids: &[&str]) -> InMemoryQuestionStore {
        let store = InMemoryQuestionStore::new();
        store
            .insert_all(ids.iter().map(|id| content(id, "phy", "optics")))
            .await;
        store
    }

    #[tokio::test]
    async fn test_stale_total_questions_is_single_violation() {
        let mut s = section("s1", 1, &["q1", "q2"]);
        s.total_questions = 3;
        let test = test_with(vec![s]);
        let store = store_with(&["q1", "q2"]).await;

        let report = validate(&test, &store, CheckOptions::default()).await.unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].section_id(), Some("s1"));
        assert!(matches!(
            report.violations[0],
            Violation::TotalQuestionsMismatch {
                recorded: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_collects_every_violation() {
        let mut s1 = section("s1", 1, &["q1", "q2"]);
        s1.questions[1].seq = 5;
        s1.questions[0].question_type = QuestionType::Nat;
        let s2 = section("s2", 3, &["q2"]);
        let test = test_with(vec![s1, s2]);
        let store = store_with(&["q1"]).await;

        let report = validate(&test, &store, CheckOptions::default()).await.unwrap();
        let kinds: Vec<&Violation> = report.violations.iter().collect();
        assert!(kinds.iter().any(|v| matches!(v, Violation::DisplayOrderNotContiguous { .. })));
        assert!(kinds.iter().any(|v| matches!(v, Violation::SeqNotContiguous { .. })));
        assert!(kinds.iter().any(|v| matches!(v, Violation::UnresolvedMarks { question_id, .. } if question_id == "q1")));
        assert!(kinds.iter().any(|v| matches!(v, Violation::DuplicateQuestionId { question_id, .. } if question_id == "q2")));
        // q2 在两个分区各报一次缺失
        let missing = kinds
            .iter()
            .filter(|v| matches!(v, Violation::MissingQuestion { .. }))
            .count();
        assert_eq!(missing, 2);
    }

    #[tokio::test]
    async fn test_strict_taxonomy_reports_drift() {
        let test = test_with(vec![section("s1", 1, &["q1", "q2"])]);
        let store = InMemoryQuestionStore::new();
        store.insert(content("q1", "phy", "optics")).await;
        store.insert(content("q2", "chem", "waves")).await;

        let lenient = validate(&test, &store, CheckOptions::default()).await.unwrap();
        assert!(lenient.is_valid());

        let strict = validate(
            &test,
            &store,
            CheckOptions {
                strict_taxonomy: true,
                for_publish: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(strict.violations.len(), 2);
    }

    #[tokio::test]
    async fn test_publish_requires_non_empty_sections() {
        let store = store_with(&[]).await;
        let options = CheckOptions {
            strict_taxonomy: false,
            for_publish: true,
        };

        let empty = test_with(Vec::new());
        let report = validate(&empty, &store, options).await.unwrap();
        assert_eq!(report.violations, vec![Violation::NoSections]);

        let hollow = test_with(vec![section("s1", 1, &[])]);
        let report = validate(&hollow, &store, options).await.unwrap();
        assert!(matches!(report.violations[0], Violation::EmptySection { .. }));

        let draft_check = validate(&hollow, &store, CheckOptions::default()).await.unwrap();
        assert!(draft_check.is_valid());
    }

    #[tokio::test]
    async fn test_store_outage_is_dependency_error() {
        let test = test_with(vec![section("s1", 1, &["q1"])]);
        let store = store_with(&["q1"]).await;
        store.set_available(false);
        let err = validate(&test, &store, CheckOptions::default()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Dependency(_)));
    }
}
