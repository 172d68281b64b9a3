//! 外部协作方接口
//!
//! 题库内容、分类主数据、依赖方登记都不归本服务所有，只通过这里的 trait 访问。
//! 这些调用对本服务状态没有副作用，可以独立重试。

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::CatalogResult;
use crate::models::{DiscoveryOrder, QuestionContent, QuestionQuery, QuestionSummary};

/// 题库能力
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// 返回 `ids` 中存在的子集
    async fn exists(&self, ids: &BTreeSet<String>) -> CatalogResult<BTreeSet<String>>;

    /// 批量读取完整内容，结果与 `ids` 一一对应，不存在的位置为 `None`
    async fn fetch(&self, ids: &[String]) -> CatalogResult<Vec<Option<QuestionContent>>>;

    /// 按条件筛选并排序
    async fn discover(
        &self,
        query: &QuestionQuery,
        order: DiscoveryOrder,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<QuestionSummary>>;

    /// 在筛选结果中均匀抽样；给定种子时结果可复现
    async fn sample(
        &self,
        query: &QuestionQuery,
        count: usize,
        seed: Option<u64>,
    ) -> CatalogResult<Vec<QuestionSummary>>;
}

/// 分类主数据能力（只做存在性检查）
#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    async fn subject_exists(&self, subject_id: &str) -> CatalogResult<bool>;

    async fn topic_exists(&self, topic_id: &str, subject_id: &str) -> CatalogResult<bool>;
}

/// 依赖方登记（作答记录、系列引用等）
#[async_trait]
pub trait DependentRegistry: Send + Sync {
    /// 仍在引用该试卷的依赖方描述，为空表示可以删除
    async fn dependents(&self, test_id: &str) -> CatalogResult<Vec<String>>;
}

/// 没有任何依赖方
pub struct NoDependents;

#[async_trait]
impl DependentRegistry for NoDependents {
    async fn dependents(&self, _test_id: &str) -> CatalogResult<Vec<String>> {
        Ok(Vec::new())
    }
}
