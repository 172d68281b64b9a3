//! 请求载荷
//!
//! 对外操作的入参，以及向题库发起筛选时使用的查询条件。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::question::{QuestionSummary, QuestionType};
use crate::models::test::{MarkingScheme, QuestionReference, SolutionsConfig, TestSettings, TestStatus};

/// 新建分区
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSection {
    pub section_id: String,
    pub section_code: String,
    pub name: String,
    pub subject_id: String,
    #[serde(default)]
    pub marking_scheme: MarkingScheme,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub is_optional: bool,
    /// 初始题目引用，需满足 seq 连续且全卷不重复
    #[serde(default)]
    pub questions: Vec<QuestionReference>,
}

/// 新建试卷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTest {
    pub code: String,
    pub slug: String,
    /// 为空时生成独立系列 `standalone_<uuid>`
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub test_number: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sections: Vec<NewSection>,
    #[serde(default)]
    pub settings: TestSettings,
    #[serde(default)]
    pub solutions: SolutionsConfig,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// 分区元数据修改
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionPatch {
    pub section_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub marking_scheme: Option<MarkingScheme>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub is_optional: Option<bool>,
}

/// 试卷元数据修改（不涉及题目结构与标识字段）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestMetadataUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: Option<TestSettings>,
    #[serde(default)]
    pub solutions: Option<SolutionsConfig>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub sections: Vec<SectionPatch>,
    /// 新的分区顺序，必须覆盖全部分区
    #[serde(default)]
    pub section_order: Option<Vec<String>>,
}

/// 按 ID 加题
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddQuestionsRequest {
    pub section_id: String,
    pub question_ids: Vec<String>,
    /// 插入位置（1..=N+1），为空时追加到末尾
    #[serde(default)]
    pub starting_seq: Option<u32>,
    #[serde(default)]
    pub marks: Option<f64>,
    #[serde(default)]
    pub negative_marks: Option<f64>,
    #[serde(default)]
    pub is_bonus: bool,
    #[serde(default)]
    pub is_optional: bool,
}

/// 难度区间（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyRange {
    pub min: u8,
    pub max: u8,
}

impl DifficultyRange {
    pub fn contains(&self, difficulty: u8) -> bool {
        self.min <= difficulty && difficulty <= self.max
    }
}

/// 组卷筛选条件，各字段均可选
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkCriteria {
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub topic_ids: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<DifficultyRange>,
    #[serde(default)]
    pub question_types: Vec<QuestionType>,
}

/// 选题策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// 委托题库均匀抽样
    #[default]
    Random,
    /// 难度升序，同难度按 question_id
    DifficultySorted,
    /// 题库创建顺序，相同时按 question_id
    Sequential,
}

impl SelectionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionStrategy::Random => "random",
            SelectionStrategy::DifficultySorted => "difficulty_sorted",
            SelectionStrategy::Sequential => "sequential",
        }
    }
}

/// 按条件批量加题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkAddRequest {
    pub section_id: String,
    #[serde(default)]
    pub criteria: BulkCriteria,
    #[serde(default)]
    pub strategy: SelectionStrategy,
    pub count: usize,
    /// 随机策略的种子，相同种子与候选集得到相同结果
    #[serde(default)]
    pub seed: Option<u64>,
}

/// 调整顺序的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderEntry {
    pub question_id: String,
    pub seq: u32,
}

/// 替换题目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceRequest {
    pub new_question_id: String,
    #[serde(default = "default_keep_seq")]
    pub keep_seq: bool,
    /// `keep_seq = false` 时的目标位置，为空则移到分区末尾
    #[serde(default)]
    pub target_seq: Option<u32>,
}

fn default_keep_seq() -> bool {
    true
}

/// 单题分值覆盖，只修改指定字段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarksOverride {
    #[serde(default)]
    pub marks: Option<f64>,
    #[serde(default)]
    pub negative_marks: Option<f64>,
    #[serde(default)]
    pub is_bonus: Option<bool>,
    #[serde(default)]
    pub is_optional: Option<bool>,
}

/// 列表排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    TestNumber,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// 试卷列表筛选
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestFilter {
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub status: Option<TestStatus>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Default for TestFilter {
    fn default() -> Self {
        Self {
            series_id: None,
            status: None,
            is_active: None,
            skip: 0,
            limit: default_limit(),
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

fn default_limit() -> usize {
    50
}

/// 向题库发起的筛选：条件 + 需要排除的题目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionQuery {
    #[serde(flatten)]
    pub criteria: BulkCriteria,
    #[serde(default)]
    pub exclude_ids: BTreeSet<String>,
}

impl QuestionQuery {
    pub fn new(criteria: BulkCriteria, exclude_ids: BTreeSet<String>) -> Self {
        Self {
            criteria,
            exclude_ids,
        }
    }

    /// 本地判断摘要是否满足条件
    pub fn matches(&self, question: &QuestionSummary) -> bool {
        if !question.is_active || self.exclude_ids.contains(&question.question_id) {
            return false;
        }
        let c = &self.criteria;
        if let Some(subject_id) = &c.subject_id {
            if &question.subject_id != subject_id {
                return false;
            }
        }
        if !c.topic_ids.is_empty() && !question.topic_ids.iter().any(|t| c.topic_ids.contains(t)) {
            return false;
        }
        if let Some(range) = &c.difficulty {
            if !range.contains(question.difficulty) {
                return false;
            }
        }
        if !c.question_types.is_empty() && !c.question_types.contains(&question.question_type) {
            return false;
        }
        true
    }
}

/// 题库发现接口的排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryOrder {
    /// 难度升序，question_id 兜底
    DifficultyAsc,
    /// 创建顺序，question_id 兜底
    CreationOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, subject: &str, topics: &[&str], difficulty: u8, qt: QuestionType) -> QuestionSummary {
        QuestionSummary {
            question_id: id.to_string(),
            question_type: qt,
            subject_id: subject.to_string(),
            topic_ids: topics.iter().map(|t| t.to_string()).collect(),
            difficulty,
            created_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_query_matches_all_criteria() {
        let query = QuestionQuery::new(
            BulkCriteria {
                subject_id: Some("phy".to_string()),
                topic_ids: vec!["optics".to_string()],
                difficulty: Some(DifficultyRange { min: 2, max: 3 }),
                question_types: vec![QuestionType::Mcq],
            },
            BTreeSet::from(["q9".to_string()]),
        );

        assert!(query.matches(&summary("q1", "phy", &["optics"], 2, QuestionType::Mcq)));
        assert!(!query.matches(&summary("q9", "phy", &["optics"], 2, QuestionType::Mcq)));
        assert!(!query.matches(&summary("q2", "chem", &["optics"], 2, QuestionType::Mcq)));
        assert!(!query.matches(&summary("q3", "phy", &["waves"], 2, QuestionType::Mcq)));
        assert!(!query.matches(&summary("q4", "phy", &["optics"], 5, QuestionType::Mcq)));
        assert!(!query.matches(&summary("q5", "phy", &["optics"], 3, QuestionType::Nat)));
    }

    #[test]
    fn test_inactive_question_never_matches() {
        let mut inactive = summary("q1", "phy", &["optics"], 2, QuestionType::Mcq);
        inactive.is_active = false;
        assert!(!QuestionQuery::default().matches(&inactive));
    }

    #[test]
    fn test_empty_criteria_matches_everything_not_excluded() {
        let query = QuestionQuery::default();
        assert!(query.matches(&summary("q1", "any", &[], 1, QuestionType::Subjective)));
    }
}
