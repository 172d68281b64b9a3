use thiserror::Error;

use crate::models::{QuestionType, TestStatus, ValidationReport};

/// 目录服务错误类型
///
/// 调用方据此区分"请求有误"（Validation / NotFound）、"需要重新加载后重试"（Conflict）
/// 与"外部协作方降级"（Dependency）。
#[derive(Debug, Error)]
pub enum CatalogError {
    /// 调用方可修正的请求错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),

    /// 版本号不匹配（乐观并发冲突），调用方需重新加载后重试
    #[error("版本冲突 (试卷: {test_id}): 期望版本 {expected}, 当前版本 {actual}")]
    Conflict {
        test_id: String,
        expected: u64,
        actual: u64,
    },

    /// 试卷、分区或题目引用不存在
    #[error("资源不存在: {0}")]
    NotFound(#[from] NotFoundError),

    /// 外部题库 / 分类服务不可用或返回了异常数据
    #[error("依赖服务错误: {0}")]
    Dependency(#[from] DependencyError),

    /// 发布前完整性检查未通过，试卷保持草稿状态
    #[error("完整性检查未通过: {} 项违规", .0.violations.len())]
    Integrity(ValidationReport),

    /// 解析（答案）尚未开放
    #[error("解析未开放: {reason}")]
    SolutionsLocked { reason: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 校验错误（调用方可修正）
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("question_ids 不能为空")]
    EmptyQuestionIds,

    #[error("请求中存在重复题目: {question_ids:?}")]
    DuplicateInRequest { question_ids: Vec<String> },

    #[error("题目已存在于试卷中: {question_ids:?}")]
    AlreadyInTest { question_ids: Vec<String> },

    #[error("分区 {section_id} 缺少题型 {question_type} 的评分规则，且题目 {question_id} 未指定分值")]
    MissingMarkingScheme {
        section_id: String,
        question_id: String,
        question_type: QuestionType,
    },

    #[error("题目 {question_id} 的学科 {actual} 与分区学科 {expected} 不一致")]
    SubjectMismatch {
        question_id: String,
        expected: String,
        actual: String,
    },

    #[error("分区 {section_id} 的排序不是合法排列: {reason}")]
    InvalidPermutation { section_id: String, reason: String },

    #[error("分区 {section_id} 的序号 {seq} 超出范围 [1, {max}]")]
    SeqOutOfRange {
        section_id: String,
        seq: u32,
        max: u32,
    },

    #[error("数量 {count} 非法，应在 [1, {max}] 之间")]
    InvalidCount { count: usize, max: usize },

    #[error("分区 {section_id} 没有符合条件的候选题目")]
    NoCandidates { section_id: String },

    #[error("筛选学科 {actual} 与分区 {section_id} 的学科 {expected} 不一致")]
    CriteriaSubjectMismatch {
        section_id: String,
        expected: String,
        actual: String,
    },

    #[error("难度区间非法: [{min}, {max}]")]
    InvalidDifficultyRange { min: u8, max: u8 },

    #[error("不允许的状态变更: {from} -> {to}")]
    InvalidTransition { from: TestStatus, to: TestStatus },

    #[error("试卷 {test_id} 仍被引用，无法删除: {dependents:?}")]
    TestInUse {
        test_id: String,
        dependents: Vec<String>,
    },

    #[error("试卷编码已存在: {code}")]
    DuplicateCode { code: String },

    #[error("试卷 slug 已存在: {slug}")]
    DuplicateSlug { slug: String },

    #[error("系列 {series_id} 中已存在第 {test_number} 套试卷")]
    DuplicateTestNumber { series_id: String, test_number: u32 },

    #[error("slug 格式非法: {slug}")]
    InvalidSlug { slug: String },

    #[error("分区 ID 重复: {section_id}")]
    DuplicateSectionId { section_id: String },

    #[error("分区编码重复: {section_code}")]
    DuplicateSectionCode { section_code: String },

    #[error("学科不存在: {subject_id}")]
    UnknownSubject { subject_id: String },

    #[error("学科 {subject_id} 下不存在知识点 {topic_id}")]
    UnknownTopic { topic_id: String, subject_id: String },

    #[error("试卷结构非法: {reason}")]
    MalformedStructure { reason: String },
}

/// 资源不存在
#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("试卷不存在: {test_id}")]
    Test { test_id: String },

    #[error("试卷 {test_id} 中不存在分区 {section_id}")]
    Section { test_id: String, section_id: String },

    #[error("试卷 {test_id} 中不存在题目 {question_id}")]
    QuestionReference { test_id: String, question_id: String },

    #[error("题库中不存在题目: {question_ids:?}")]
    Questions { question_ids: Vec<String> },
}

/// 外部依赖错误
#[derive(Debug, Error)]
pub enum DependencyError {
    /// 网络请求失败
    #[error("请求 {endpoint} 失败: {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 服务返回错误响应
    #[error("{endpoint} 返回错误响应: status={status:?}, message={message:?}")]
    BadResponse {
        endpoint: String,
        status: Option<u16>,
        message: Option<String>,
    },

    /// 重试后仍被限流
    #[error("{endpoint} 请求频率限制，已重试 {attempts} 次")]
    RateLimited { endpoint: String, attempts: usize },

    /// 返回数据无法解析或不符合约定
    #[error("{endpoint} 返回数据异常: {reason}")]
    Malformed { endpoint: String, reason: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("解析配置文件失败 ({path}): {source}")]
    FileParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        CatalogError::Dependency(DependencyError::RequestFailed {
            endpoint,
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Dependency(DependencyError::Malformed {
            endpoint: String::new(),
            reason: err.to_string(),
        })
    }
}

// ========== 便捷构造函数 ==========

impl CatalogError {
    /// 试卷不存在
    pub fn test_not_found(test_id: impl Into<String>) -> Self {
        NotFoundError::Test {
            test_id: test_id.into(),
        }
        .into()
    }

    /// 分区不存在
    pub fn section_not_found(test_id: impl Into<String>, section_id: impl Into<String>) -> Self {
        NotFoundError::Section {
            test_id: test_id.into(),
            section_id: section_id.into(),
        }
        .into()
    }

    /// 试卷中不存在该题目引用
    pub fn reference_not_found(test_id: impl Into<String>, question_id: impl Into<String>) -> Self {
        NotFoundError::QuestionReference {
            test_id: test_id.into(),
            question_id: question_id.into(),
        }
        .into()
    }

    /// 外部请求失败
    pub fn request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DependencyError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
        .into()
    }

    /// 外部返回数据异常
    pub fn malformed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        DependencyError::Malformed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
        .into()
    }

    /// 重新加载后重试可能成功
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::Conflict { .. } | CatalogError::Dependency(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CatalogError::Conflict { .. })
    }
}

// ========== Result 类型别名 ==========

/// 目录服务结果类型
pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retryable() {
        let err = CatalogError::Conflict {
            test_id: "t1".to_string(),
            expected: 1,
            actual: 2,
        };
        assert!(err.is_retryable());
        assert!(err.is_conflict());
        assert!(err.to_string().contains("t1"));
    }

    #[test]
    fn test_validation_is_not_retryable() {
        let err: CatalogError = ValidationError::EmptyQuestionIds.into();
        assert!(!err.is_retryable());
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::EmptyQuestionIds)
        ));
    }

    #[test]
    fn test_not_found_constructors() {
        let err = CatalogError::section_not_found("t1", "s9");
        assert!(matches!(
            err,
            CatalogError::NotFound(NotFoundError::Section { .. })
        ));
        assert!(err.to_string().contains("s9"));
    }
}
