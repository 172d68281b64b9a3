//! 试卷结构存储 - 基础设施层
//!
//! 唯一的共享可变资源。整张试卷作为一个文档读写，写入一律走
//! compare-and-swap：调用方带上读取时的版本号，不匹配则返回 `Conflict`，
//! 是否重试由调用方决定。

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CatalogError, CatalogResult, ValidationError};
use crate::models::{SortField, SortOrder, Test, TestFilter, TestPage};

/// 试卷文档存储能力
#[async_trait]
pub trait StructureStore: Send + Sync {
    /// 插入新试卷，版本号置为 1
    ///
    /// 需保证 `code`、`slug`、`(series_id, test_number)` 全局唯一。
    async fn insert(&self, test: Test) -> CatalogResult<u64>;

    /// 读取当前已提交的试卷（含版本号）
    async fn load(&self, test_id: &str) -> CatalogResult<Test>;

    /// 版本号匹配时整体替换并返回新版本号，否则返回 `Conflict`
    async fn compare_and_swap(
        &self,
        test_id: &str,
        expected_version: u64,
        new_test: Test,
    ) -> CatalogResult<u64>;

    /// 版本号匹配时删除
    async fn delete(&self, test_id: &str, expected_version: u64) -> CatalogResult<()>;

    /// 按条件分页列出
    async fn list(&self, filter: &TestFilter) -> CatalogResult<TestPage>;
}

/// 内存实现
///
/// 锁只在单次调用内部持有，不会跨越任何外部调用。
#[derive(Default)]
pub struct InMemoryStructureStore {
    tests: RwLock<HashMap<String, Test>>,
}

impl InMemoryStructureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tests.read().await.is_empty()
    }
}

/// 唯一性检查，`test` 自身（同 test_id）不参与比较
fn ensure_unique(tests: &HashMap<String, Test>, test: &Test) -> CatalogResult<()> {
    for other in tests.values().filter(|t| t.test_id != test.test_id) {
        if other.code == test.code {
            return Err(ValidationError::DuplicateCode {
                code: test.code.clone(),
            }
            .into());
        }
        if other.slug == test.slug {
            return Err(ValidationError::DuplicateSlug {
                slug: test.slug.clone(),
            }
            .into());
        }
        if other.series_id == test.series_id && other.test_number == test.test_number {
            return Err(ValidationError::DuplicateTestNumber {
                series_id: test.series_id.clone(),
                test_number: test.test_number,
            }
            .into());
        }
    }
    Ok(())
}

#[async_trait]
impl StructureStore for InMemoryStructureStore {
    async fn insert(&self, mut test: Test) -> CatalogResult<u64> {
        let mut tests = self.tests.write().await;
        if tests.contains_key(&test.test_id) {
            return Err(ValidationError::MalformedStructure {
                reason: format!("试卷 ID 已存在: {}", test.test_id),
            }
            .into());
        }
        ensure_unique(&tests, &test)?;

        test.version = 1;
        debug!("插入试卷 {} (版本 1)", test.test_id);
        tests.insert(test.test_id.clone(), test);
        Ok(1)
    }

    async fn load(&self, test_id: &str) -> CatalogResult<Test> {
        self.tests
            .read()
            .await
            .get(test_id)
            .cloned()
            .ok_or_else(|| CatalogError::test_not_found(test_id))
    }

    async fn compare_and_swap(
        &self,
        test_id: &str,
        expected_version: u64,
        mut new_test: Test,
    ) -> CatalogResult<u64> {
        let mut tests = self.tests.write().await;
        let actual = tests
            .get(test_id)
            .map(|t| t.version)
            .ok_or_else(|| CatalogError::test_not_found(test_id))?;

        if actual != expected_version {
            return Err(CatalogError::Conflict {
                test_id: test_id.to_string(),
                expected: expected_version,
                actual,
            });
        }
        if new_test.test_id != test_id {
            return Err(ValidationError::MalformedStructure {
                reason: format!("不能把试卷 {} 写入 {}", new_test.test_id, test_id),
            }
            .into());
        }
        ensure_unique(&tests, &new_test)?;

        let new_version = expected_version + 1;
        new_test.version = new_version;
        tests.insert(test_id.to_string(), new_test);
        debug!("试卷 {} 写入成功: 版本 {} -> {}", test_id, expected_version, new_version);
        Ok(new_version)
    }

    async fn delete(&self, test_id: &str, expected_version: u64) -> CatalogResult<()> {
        let mut tests = self.tests.write().await;
        let actual = tests
            .get(test_id)
            .map(|t| t.version)
            .ok_or_else(|| CatalogError::test_not_found(test_id))?;
        if actual != expected_version {
            return Err(CatalogError::Conflict {
                test_id: test_id.to_string(),
                expected: expected_version,
                actual,
            });
        }
        tests.remove(test_id);
        Ok(())
    }

    async fn list(&self, filter: &TestFilter) -> CatalogResult<TestPage> {
        let tests = self.tests.read().await;
        let mut items: Vec<Test> = tests
            .values()
            .filter(|t| filter.series_id.as_ref().map_or(true, |s| &t.series_id == s))
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.is_active.map_or(true, |a| t.is_active == a))
            .cloned()
            .collect();

        items.sort_by(|a, b| {
            let ord = match filter.sort_by {
                SortField::TestNumber => a
                    .series_id
                    .cmp(&b.series_id)
                    .then(a.test_number.cmp(&b.test_number)),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            }
            .then_with(|| a.test_id.cmp(&b.test_id));
            match filter.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = items.len();
        let items = items.into_iter().skip(filter.skip).take(filter.limit).collect();
        Ok(TestPage {
            items,
            total,
            skip: filter.skip,
            limit: filter.limit,
        })
    }
}
