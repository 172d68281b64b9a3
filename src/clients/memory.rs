//! 内存版协作方，用于测试与本地运行

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::clients::question_store::{DependentRegistry, QuestionStore, TaxonomyStore};
use crate::error::{CatalogError, CatalogResult, DependencyError};
use crate::models::{DiscoveryOrder, QuestionContent, QuestionQuery, QuestionSummary};

/// 内存题库
///
/// 创建顺序即插入顺序。`set_available(false)` 模拟题库不可用。
#[derive(Default)]
pub struct InMemoryQuestionStore {
    questions: RwLock<BTreeMap<String, (u64, QuestionContent)>>,
    next_ordinal: RwLock<u64>,
    unavailable: AtomicBool,
}

impl InMemoryQuestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆盖题目；覆盖时保留原创建顺序
    pub async fn insert(&self, question: QuestionContent) {
        let mut questions = self.questions.write().await;
        let ordinal = match questions.get(&question.question_id) {
            Some((ordinal, _)) => *ordinal,
            None => {
                let mut next = self.next_ordinal.write().await;
                *next += 1;
                *next
            }
        };
        questions.insert(question.question_id.clone(), (ordinal, question));
    }

    pub async fn insert_all(&self, questions: impl IntoIterator<Item = QuestionContent>) {
        for q in questions {
            self.insert(q).await;
        }
    }

    pub async fn remove(&self, question_id: &str) {
        self.questions.write().await.remove(question_id);
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn ensure_available(&self, endpoint: &str) -> CatalogResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DependencyError::BadResponse {
                endpoint: endpoint.to_string(),
                status: Some(503),
                message: Some("question store unavailable".to_string()),
            }
            .into());
        }
        Ok(())
    }

    /// 满足条件的候选，按 question_id 排序
    async fn candidates(&self, query: &QuestionQuery) -> Vec<(u64, QuestionSummary)> {
        self.questions
            .read()
            .await
            .values()
            .map(|(ordinal, q)| (*ordinal, q.summary()))
            .filter(|(_, s)| query.matches(s))
            .collect()
    }
}

#[async_trait]
impl QuestionStore for InMemoryQuestionStore {
    async fn exists(&self, ids: &BTreeSet<String>) -> CatalogResult<BTreeSet<String>> {
        self.ensure_available("exists")?;
        let questions = self.questions.read().await;
        Ok(ids
            .iter()
            .filter(|id| questions.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn fetch(&self, ids: &[String]) -> CatalogResult<Vec<Option<QuestionContent>>> {
        self.ensure_available("fetch")?;
        let questions = self.questions.read().await;
        Ok(ids
            .iter()
            .map(|id| questions.get(id).map(|(_, q)| q.clone()))
            .collect())
    }

    async fn discover(
        &self,
        query: &QuestionQuery,
        order: DiscoveryOrder,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<QuestionSummary>> {
        self.ensure_available("discover")?;
        let mut candidates = self.candidates(query).await;
        match order {
            DiscoveryOrder::DifficultyAsc => candidates.sort_by(|(_, a), (_, b)| {
                a.difficulty
                    .cmp(&b.difficulty)
                    .then_with(|| a.question_id.cmp(&b.question_id))
            }),
            DiscoveryOrder::CreationOrder => candidates.sort_by(|(oa, a), (ob, b)| {
                oa.cmp(ob).then_with(|| a.question_id.cmp(&b.question_id))
            }),
        }
        Ok(candidates
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, s)| s)
            .collect())
    }

    async fn sample(
        &self,
        query: &QuestionQuery,
        count: usize,
        seed: Option<u64>,
    ) -> CatalogResult<Vec<QuestionSummary>> {
        self.ensure_available("sample")?;
        let mut candidates: Vec<QuestionSummary> =
            self.candidates(query).await.into_iter().map(|(_, s)| s).collect();
        candidates.sort_by(|a, b| a.question_id.cmp(&b.question_id));

        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        candidates.shuffle(&mut rng);
        candidates.truncate(count);
        Ok(candidates)
    }
}

/// 内存分类主数据
#[derive(Default)]
pub struct InMemoryTaxonomy {
    subjects: BTreeSet<String>,
    /// topic_id → subject_id
    topics: BTreeMap<String, String>,
}

impl InMemoryTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subjects.insert(subject_id.into());
        self
    }

    pub fn with_topic(mut self, topic_id: impl Into<String>, subject_id: impl Into<String>) -> Self {
        let subject_id = subject_id.into();
        self.subjects.insert(subject_id.clone());
        self.topics.insert(topic_id.into(), subject_id);
        self
    }
}

#[async_trait]
impl TaxonomyStore for InMemoryTaxonomy {
    async fn subject_exists(&self, subject_id: &str) -> CatalogResult<bool> {
        Ok(self.subjects.contains(subject_id))
    }

    async fn topic_exists(&self, topic_id: &str, subject_id: &str) -> CatalogResult<bool> {
        Ok(self.topics.get(topic_id).map(String::as_str) == Some(subject_id))
    }
}

/// 内存依赖方登记
#[derive(Default)]
pub struct InMemoryDependents {
    dependents: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryDependents {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach(&self, test_id: impl Into<String>, dependent: impl Into<String>) {
        self.dependents
            .write()
            .await
            .entry(test_id.into())
            .or_default()
            .push(dependent.into());
    }

    pub async fn detach_all(&self, test_id: &str) {
        self.dependents.write().await.remove(test_id);
    }
}

#[async_trait]
impl DependentRegistry for InMemoryDependents {
    async fn dependents(&self, test_id: &str) -> CatalogResult<Vec<String>> {
        Ok(self
            .dependents
            .read()
            .await
            .get(test_id)
            .cloned()
            .unwrap_or_default())
    }
}
