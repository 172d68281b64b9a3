//! 组卷蓝图
//!
//! 从 TOML 文件描述一张试卷：分区、评分方案、固定题目与按条件补题规则。

use serde::{Deserialize, Serialize};

use crate::models::request::{BulkAddRequest, BulkCriteria, NewSection, NewTest, SelectionStrategy};
use crate::models::test::{MarkingScheme, SolutionsConfig, TestSettings};

/// 按条件补题规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillRule {
    #[serde(default)]
    pub strategy: SelectionStrategy,
    pub count: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub criteria: BulkCriteria,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionBlueprint {
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
    /// 固定加入的题目
    #[serde(default)]
    pub question_ids: Vec<String>,
    #[serde(default)]
    pub fill: Vec<FillRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestBlueprint {
    pub code: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub test_number: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// 组卷并校验通过后是否直接发布
    #[serde(default)]
    pub publish: bool,
    #[serde(default)]
    pub settings: TestSettings,
    #[serde(default)]
    pub solutions: SolutionsConfig,
    #[serde(default)]
    pub sections: Vec<SectionBlueprint>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

impl TestBlueprint {
    pub fn with_file_path(mut self, file_path: String) -> Self {
        self.file_path = Some(file_path);
        self
    }

    /// 转换为建卷请求（分区为空壳，题目稍后加入）
    pub fn to_new_test(&self) -> NewTest {
        NewTest {
            code: self.code.clone(),
            slug: self.slug.clone(),
            series_id: self.series_id.clone(),
            test_number: self.test_number,
            name: self.name.clone(),
            description: self.description.clone(),
            sections: self
                .sections
                .iter()
                .map(|s| NewSection {
                    section_id: s.section_id.clone(),
                    section_code: s.section_code.clone(),
                    name: s.name.clone(),
                    subject_id: s.subject_id.clone(),
                    marking_scheme: s.marking_scheme.clone(),
                    duration_minutes: s.duration_minutes,
                    is_optional: s.is_optional,
                    questions: Vec::new(),
                })
                .collect(),
            settings: self.settings.clone(),
            solutions: self.solutions.clone(),
            tags: self.tags.clone(),
        }
    }

    /// 全部补题请求，按分区顺序
    pub fn fill_requests(&self) -> Vec<BulkAddRequest> {
        self.sections
            .iter()
            .flat_map(|s| {
                s.fill.iter().map(move |rule| BulkAddRequest {
                    section_id: s.section_id.clone(),
                    criteria: rule.criteria.clone(),
                    strategy: rule.strategy,
                    count: rule.count,
                    seed: rule.seed,
                })
            })
            .collect()
    }
}
