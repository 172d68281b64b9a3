//! 外部题库的数据形态
//!
//! 本服务不拥有题目内容，这里只描述从题库读回来的两种视图：
//! 用于组卷筛选的摘要（`QuestionSummary`）与用于展示的完整内容（`QuestionContent`）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionType {
    /// 单选
    Mcq,
    /// 多选
    Msq,
    /// 数值 / 填空
    Nat,
    /// 主观题
    Subjective,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::Msq => "MSQ",
            QuestionType::Nat => "NAT",
            QuestionType::Subjective => "SUBJECTIVE",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 组卷用的题目摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub question_id: String,
    pub question_type: QuestionType,
    pub subject_id: String,
    #[serde(default)]
    pub topic_ids: Vec<String>,
    pub difficulty: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// 停用的题目不参与组卷
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// 选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDoc {
    pub id: String,
    pub text: String,
}

/// 标准答案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerKey {
    Single { option_id: String },
    Multi { option_ids: Vec<String> },
    Value { value: String },
}

/// 解析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SolutionDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

/// 题目完整内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionContent {
    pub question_id: String,
    pub question_type: QuestionType,
    pub subject_id: String,
    #[serde(default)]
    pub topic_ids: Vec<String>,
    pub difficulty: u8,
    pub text: String,
    #[serde(default)]
    pub options: Vec<OptionDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_key: Option<AnswerKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<SolutionDoc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl QuestionContent {
    pub fn summary(&self) -> QuestionSummary {
        QuestionSummary {
            question_id: self.question_id.clone(),
            question_type: self.question_type,
            subject_id: self.subject_id.clone(),
            topic_ids: self.topic_ids.clone(),
            difficulty: self.difficulty,
            created_at: self.created_at,
            is_active: self.is_active,
        }
    }

    /// 去掉答案与解析
    pub fn without_answers(mut self) -> Self {
        self.answer_key = None;
        self.solution = None;
        self
    }
}
