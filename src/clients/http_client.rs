/// 题库 / 分类服务 HTTP 客户端
///
/// 所有接口统一返回 `{ code, message, data }` 信封，`code == 0` 表示成功。
/// 被限流（HTTP 429 或 code 600）时等待后重试，超过次数返回 `RateLimited`。
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::clients::question_store::{QuestionStore, TaxonomyStore};
use crate::config::Config;
use crate::error::{CatalogError, CatalogResult, DependencyError};
use crate::models::{DiscoveryOrder, QuestionContent, QuestionQuery, QuestionSummary};
use crate::utils::logging::truncate_text;

/// 业务层的限流错误码
const RATE_LIMIT_CODE: i64 = 600;
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl ApiEnvelope {
    fn is_rate_limited(&self) -> bool {
        self.code == RATE_LIMIT_CODE
    }
}

#[derive(Debug, Deserialize)]
struct ItemsPayload<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ExistingPayload {
    existing: Vec<String>,
}

/// 共享的 HTTP 调用核心
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    max_retries: usize,
}

impl HttpClient {
    pub fn new(config: &Config) -> CatalogResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.question_store_base_url.trim_end_matches('/').to_string(),
            token: config.question_store_token.clone(),
            max_retries: config.max_retries.max(1),
        })
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> CatalogResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let data = self
            .call(endpoint, |client, url| client.post(url).json(body))
            .await?
            .ok_or_else(|| DependencyError::BadResponse {
                endpoint: endpoint.to_string(),
                status: Some(StatusCode::NOT_FOUND.as_u16()),
                message: None,
            })?;
        decode(endpoint, data)
    }

    /// GET 请求，404 返回 `None`
    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> CatalogResult<Option<T>> {
        match self.call(endpoint, |client, url| client.get(url)).await? {
            Some(data) => decode(endpoint, data).map(Some),
            None => Ok(None),
        }
    }

    /// 发送请求并解开信封
    ///
    /// # 返回
    /// 404 时返回 `None`，否则返回 `data` 字段（缺失时为 `null`）
    async fn call<F>(&self, endpoint: &str, build: F) -> CatalogResult<Option<Value>>
    where
        F: Fn(&reqwest::Client, String) -> RequestBuilder,
    {
        let url = format!("{}/{}", self.base_url, endpoint);

        for attempt in 1..=self.max_retries {
            let response = build(&self.client, url.clone())
                .header("Accept", "application/json")
                .header("token", &self.token)
                .send()
                .await
                .map_err(|e| CatalogError::request_failed(endpoint, e))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!(
                    "{} 请求频繁限制 (尝试 {}/{}), 等待 2 秒后重试...",
                    endpoint, attempt, self.max_retries
                );
                sleep(RATE_LIMIT_BACKOFF).await;
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(|e| CatalogError::request_failed(endpoint, e))?;
            debug!("{} 响应: {}", endpoint, truncate_text(&text, 200));

            if !status.is_success() {
                return Err(DependencyError::BadResponse {
                    endpoint: endpoint.to_string(),
                    status: Some(status.as_u16()),
                    message: Some(truncate_text(&text, 200)),
                }
                .into());
            }

            let envelope = parse_envelope(endpoint, &text)?;
            if envelope.is_rate_limited() {
                warn!(
                    "{} 业务限流 (尝试 {}/{}), 等待 2 秒后重试...",
                    endpoint, attempt, self.max_retries
                );
                sleep(RATE_LIMIT_BACKOFF).await;
                continue;
            }
            if envelope.code != 0 {
                return Err(DependencyError::BadResponse {
                    endpoint: endpoint.to_string(),
                    status: Some(status.as_u16()),
                    message: envelope.message,
                }
                .into());
            }
            return Ok(Some(envelope.data.unwrap_or(Value::Null)));
        }

        warn!("{} 请求失败，已重试 {} 次", endpoint, self.max_retries);
        Err(DependencyError::RateLimited {
            endpoint: endpoint.to_string(),
            attempts: self.max_retries,
        }
        .into())
    }
}

fn parse_envelope(endpoint: &str, text: &str) -> CatalogResult<ApiEnvelope> {
    serde_json::from_str(text).map_err(|e| CatalogError::malformed(endpoint, e.to_string()))
}

fn decode<T: DeserializeOwned>(endpoint: &str, data: Value) -> CatalogResult<T> {
    serde_json::from_value(data).map_err(|e| CatalogError::malformed(endpoint, e.to_string()))
}

/// 批量读取结果必须与请求一一对应
fn check_batch(
    endpoint: &str,
    ids: &[String],
    items: &[Option<QuestionContent>],
) -> CatalogResult<()> {
    if items.len() != ids.len() {
        return Err(CatalogError::malformed(
            endpoint,
            format!("请求 {} 道题，返回 {} 项", ids.len(), items.len()),
        ));
    }
    for (id, item) in ids.iter().zip(items) {
        if let Some(q) = item {
            if &q.question_id != id {
                return Err(CatalogError::malformed(
                    endpoint,
                    format!("位置错乱: 期望 {}，实际 {}", id, q.question_id),
                ));
            }
        }
    }
    Ok(())
}

/// 远程题库
pub struct HttpQuestionStore {
    http: HttpClient,
}

impl HttpQuestionStore {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl QuestionStore for HttpQuestionStore {
    async fn exists(&self, ids: &BTreeSet<String>) -> CatalogResult<BTreeSet<String>> {
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let payload: ExistingPayload = self
            .http
            .post("questions/exists", &json!({ "question_ids": ids }))
            .await?;
        // 只接受请求过的 ID
        Ok(payload
            .existing
            .into_iter()
            .filter(|id| ids.contains(id))
            .collect())
    }

    async fn fetch(&self, ids: &[String]) -> CatalogResult<Vec<Option<QuestionContent>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let endpoint = "questions/batch";
        let payload: ItemsPayload<Option<QuestionContent>> = self
            .http
            .post(endpoint, &json!({ "question_ids": ids }))
            .await?;
        check_batch(endpoint, ids, &payload.items)?;
        Ok(payload.items)
    }

    async fn discover(
        &self,
        query: &QuestionQuery,
        order: DiscoveryOrder,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<QuestionSummary>> {
        let payload: ItemsPayload<QuestionSummary> = self
            .http
            .post(
                "questions/discover",
                &json!({ "query": query, "order": order, "limit": limit, "offset": offset }),
            )
            .await?;
        Ok(payload.items)
    }

    async fn sample(
        &self,
        query: &QuestionQuery,
        count: usize,
        seed: Option<u64>,
    ) -> CatalogResult<Vec<QuestionSummary>> {
        let payload: ItemsPayload<QuestionSummary> = self
            .http
            .post(
                "questions/sample",
                &json!({ "query": query, "count": count, "seed": seed }),
            )
            .await?;
        Ok(payload.items)
    }
}

/// 远程分类主数据
pub struct HttpTaxonomyStore {
    http: HttpClient,
}

impl HttpTaxonomyStore {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TaxonomyStore for HttpTaxonomyStore {
    async fn subject_exists(&self, subject_id: &str) -> CatalogResult<bool> {
        let found: Option<Value> = self.http.get(&format!("subjects/{}", subject_id)).await?;
        Ok(found.is_some())
    }

    async fn topic_exists(&self, topic_id: &str, subject_id: &str) -> CatalogResult<bool> {
        let found: Option<Value> = self
            .http
            .get(&format!("subjects/{}/topics/{}", subject_id, topic_id))
            .await?;
        Ok(found.is_some())
    }
}
