//! 对外返回的结果视图

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::question::{AnswerKey, OptionDoc, QuestionContent, QuestionType, SolutionDoc};
use crate::models::request::SelectionStrategy;
use crate::models::test::{QuestionReference, Section, Test, TestSettings, TestStatus};

/// 解析后的实际分值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMarks {
    pub marks: f64,
    pub negative_marks: f64,
    /// 至少有一项来自题目级覆盖
    pub from_override: bool,
}

/// 已提交的写操作结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Committed<T> {
    /// 提交后的试卷版本
    pub version: u64,
    pub value: T,
}

/// 单项完整性违规
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    DuplicateSectionId { section_id: String },
    DuplicateSectionCode { section_code: String },
    DisplayOrderNotContiguous { found: Vec<u32> },
    TotalQuestionsMismatch {
        section_id: String,
        recorded: usize,
        actual: usize,
    },
    SeqNotContiguous { section_id: String, found: Vec<u32> },
    DuplicateQuestionId {
        question_id: String,
        section_ids: Vec<String>,
    },
    UnresolvedMarks {
        section_id: String,
        question_id: String,
        question_type: QuestionType,
    },
    MissingQuestion { section_id: String, question_id: String },
    SubjectMismatch {
        section_id: String,
        question_id: String,
        recorded: String,
        current: String,
    },
    TopicMismatch {
        section_id: String,
        question_id: String,
        recorded: Vec<String>,
        current: Vec<String>,
    },
    NoSections,
    EmptySection { section_id: String },
}

impl Violation {
    /// 违规所属分区（试卷级违规返回 None）
    pub fn section_id(&self) -> Option<&str> {
        match self {
            Violation::TotalQuestionsMismatch { section_id, .. }
            | Violation::SeqNotContiguous { section_id, .. }
            | Violation::UnresolvedMarks { section_id, .. }
            | Violation::MissingQuestion { section_id, .. }
            | Violation::SubjectMismatch { section_id, .. }
            | Violation::TopicMismatch { section_id, .. }
            | Violation::EmptySection { section_id }
            | Violation::DuplicateSectionId { section_id } => Some(section_id),
            _ => None,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateSectionId { section_id } => write!(f, "分区 ID 重复: {}", section_id),
            Violation::DuplicateSectionCode { section_code } => {
                write!(f, "分区编码重复: {}", section_code)
            }
            Violation::DisplayOrderNotContiguous { found } => {
                write!(f, "分区显示顺序不连续: {:?}", found)
            }
            Violation::TotalQuestionsMismatch {
                section_id,
                recorded,
                actual,
            } => write!(
                f,
                "分区 {} 题目数不一致: 记录 {}, 实际 {}",
                section_id, recorded, actual
            ),
            Violation::SeqNotContiguous { section_id, found } => {
                write!(f, "分区 {} 序号不连续: {:?}", section_id, found)
            }
            Violation::DuplicateQuestionId {
                question_id,
                section_ids,
            } => write!(f, "题目 {} 重复出现于 {:?}", question_id, section_ids),
            Violation::UnresolvedMarks {
                section_id,
                question_id,
                question_type,
            } => write!(
                f,
                "分区 {} 的题目 {} ({}) 无法确定分值",
                section_id, question_id, question_type
            ),
            Violation::MissingQuestion {
                section_id,
                question_id,
            } => write!(f, "分区 {} 的题目 {} 在题库中不存在", section_id, question_id),
            Violation::SubjectMismatch {
                question_id,
                recorded,
                current,
                ..
            } => write!(
                f,
                "题目 {} 学科不一致: 快照 {}, 题库 {}",
                question_id, recorded, current
            ),
            Violation::TopicMismatch {
                question_id,
                recorded,
                current,
                ..
            } => write!(
                f,
                "题目 {} 知识点不一致: 快照 {:?}, 题库 {:?}",
                question_id, recorded, current
            ),
            Violation::NoSections => write!(f, "试卷没有任何分区"),
            Violation::EmptySection { section_id } => write!(f, "分区 {} 没有题目", section_id),
        }
    }
}

/// 完整性检查报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub test_id: String,
    pub version: u64,
    pub checked_at: DateTime<Utc>,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new(test_id: impl Into<String>, version: u64) -> Self {
        Self {
            test_id: test_id.into(),
            version,
            checked_at: Utc::now(),
            violations: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }
}

/// 批量加题结果；实际数量不足时仍视为成功
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkAddOutcome {
    pub version: u64,
    pub section_id: String,
    pub strategy: SelectionStrategy,
    pub requested: usize,
    pub fulfilled: usize,
    pub shortfall: usize,
    pub added: Vec<QuestionReference>,
}

impl BulkAddOutcome {
    pub fn is_partial(&self) -> bool {
        self.shortfall > 0
    }
}

/// 合并后的题目内容（题库字段）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBody {
    pub text: String,
    #[serde(default)]
    pub options: Vec<OptionDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_key: Option<AnswerKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<SolutionDoc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<QuestionContent> for QuestionBody {
    fn from(content: QuestionContent) -> Self {
        Self {
            text: content.text,
            options: content.options,
            answer_key: content.answer_key,
            solution: content.solution,
            tags: content.tags,
        }
    }
}

/// 引用 + 实际分值 + 题目内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedQuestion {
    pub reference: QuestionReference,
    pub resolved_marks: Option<ResolvedMarks>,
    pub content: QuestionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionView {
    pub section_id: String,
    pub section_code: String,
    pub name: String,
    pub display_order: u32,
    pub subject_id: String,
    pub total_questions: usize,
    pub questions: Vec<MergedQuestion>,
}

impl SectionView {
    pub fn header(section: &Section) -> Self {
        Self {
            section_id: section.section_id.clone(),
            section_code: section.section_code.clone(),
            name: section.name.clone(),
            display_order: section.display_order,
            subject_id: section.subject_id.clone(),
            total_questions: section.total_questions,
            questions: Vec::with_capacity(section.questions.len()),
        }
    }
}

/// 预览 / 含解析视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestView {
    pub test_id: String,
    pub code: String,
    pub slug: String,
    pub name: String,
    pub status: TestStatus,
    pub version: u64,
    pub settings: TestSettings,
    pub sections: Vec<SectionView>,
}

impl TestView {
    pub fn header(test: &Test) -> Self {
        Self {
            test_id: test.test_id.clone(),
            code: test.code.clone(),
            slug: test.slug.clone(),
            name: test.name.clone(),
            status: test.status,
            version: test.version,
            settings: test.settings.clone(),
            sections: Vec::with_capacity(test.sections.len()),
        }
    }

    /// 按展示顺序列出题目 ID
    pub fn question_ids(&self) -> Vec<&str> {
        self.sections
            .iter()
            .flat_map(|s| s.questions.iter().map(|q| q.reference.question_id.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    pub question_id: String,
    pub section_id: String,
    pub seq: u32,
    /// 主观题等没有标准答案时为空
    pub answer: Option<AnswerKey>,
}

/// 答案表，顺序与试卷展示顺序一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerKeyView {
    pub test_id: String,
    pub version: u64,
    pub entries: Vec<AnswerKeyEntry>,
}

impl AnswerKeyView {
    pub fn get(&self, question_id: &str) -> Option<&AnswerKeyEntry> {
        self.entries.iter().find(|e| e.question_id == question_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionStats {
    pub section_id: String,
    pub display_order: u32,
    pub count: usize,
    pub by_type: BTreeMap<QuestionType, usize>,
    pub total_marks: f64,
}

/// 试卷统计，只依赖本地快照字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStats {
    pub test_id: String,
    pub version: u64,
    pub total_questions: usize,
    /// 非加分题的实际分值之和
    pub total_marks: f64,
    pub unresolved_marks: usize,
    pub difficulty_distribution: BTreeMap<u8, usize>,
    pub type_distribution: BTreeMap<QuestionType, usize>,
    pub topic_coverage: BTreeMap<String, usize>,
    pub section_stats: Vec<SectionStats>,
}

/// 分页结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPage {
    pub items: Vec<Test>,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
}

/// 快照重新同步结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResyncOutcome {
    pub version: u64,
    /// 快照发生变化的题目
    pub changed: Vec<String>,
    /// 题库中已不存在的题目（保留原快照）
    pub missing: Vec<String>,
}
