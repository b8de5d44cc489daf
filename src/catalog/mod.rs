use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config;
use crate::model::{BatchKind, BatchSummary};

pub mod model;

use model::{BatchContent, BatchContentResponse, BatchListResponse};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to reach catalog: {0}")]
    Network(#[from] reqwest::Error),
    #[error("no JSON found in catalog response")]
    Decode,
    #[error("unexpected catalog payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Catalog operations the menu flow depends on.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_batches(&self, kind: BatchKind) -> Result<Vec<BatchSummary>, FetchError>;

    async fn batch_content(&self, batch_id: &str) -> Result<BatchContent, FetchError>;
}

#[derive(Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: String,
    course_id: u64,
    service_user_id: String,
}

impl fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url)
            .field("course_id", &self.course_id)
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    pub fn from_config(cfg: &config::Catalog) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent("extractor-bot/0.1")
            .danger_accept_invalid_certs(cfg.accept_invalid_certs)
            .no_proxy()
            .pool_max_idle_per_host(0);
        if let Some(secs) = cfg.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("failed to build catalog HTTP client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            course_id: cfg.course_id,
            service_user_id: cfg.service_user_id.clone(),
        })
    }

    pub fn batches_url(&self, kind: BatchKind) -> String {
        format!(
            "{}/course/{}/{}/{}",
            self.base_url,
            self.course_id,
            kind.api_flag(),
            self.service_user_id
        )
    }

    pub fn content_url(&self, batch_id: &str) -> String {
        format!(
            "{}/getCourseDataByTopic-v2/{}/{}",
            self.base_url, batch_id, self.service_user_id
        )
    }

    /// Single GET with lenient JSON coercion of the body.
    pub async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        Ok(self.fetch_located(url).await?.0)
    }

    async fn fetch_located(&self, url: &str) -> Result<(Value, Origin), FetchError> {
        debug!(%url, "fetching catalog");
        let res = self.http.get(url).send().await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            warn!(%url, %status, "catalog returned non-success status");
        }
        locate_json(&body).map_err(|err| {
            warn!(%url, %status, body_len = body.len(), "catalog body held no JSON");
            err
        })
    }

    /// An object cut out of surrounding text only counts as a response when it
    /// carries the `data` envelope.
    async fn fetch_as<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let (value, origin) = self.fetch_located(url).await?;
        if origin == Origin::Embedded && value.get("data").is_none() {
            warn!(%url, "recovered JSON has no data envelope");
            return Err(FetchError::Decode);
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl CatalogService for CatalogClient {
    async fn list_batches(&self, kind: BatchKind) -> Result<Vec<BatchSummary>, FetchError> {
        let resp: BatchListResponse = self.fetch_as(&self.batches_url(kind)).await?;
        Ok(resp.data.unwrap_or_default())
    }

    async fn batch_content(&self, batch_id: &str) -> Result<BatchContent, FetchError> {
        let resp: BatchContentResponse = self.fetch_as(&self.content_url(batch_id)).await?;
        Ok(resp.data.unwrap_or_default())
    }
}

static GREEDY_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    WholeBody,
    Embedded,
}

/// Parse `body` as JSON, falling back to a JSON object embedded in other text.
///
/// Order of attempts: the whole body, the widest `{...}` span, then the first
/// complete value starting at the first `{`. Nested objects are never tried on
/// their own, so a truncated response fails instead of yielding a fragment.
pub fn parse_lenient(body: &str) -> Result<Value, FetchError> {
    locate_json(body).map(|(value, _)| value)
}

fn locate_json(body: &str) -> Result<(Value, Origin), FetchError> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Ok((value, Origin::WholeBody));
    }

    if let Some(m) = GREEDY_OBJECT.find(body) {
        if let Ok(value) = serde_json::from_str::<Value>(m.as_str()) {
            return Ok((value, Origin::Embedded));
        }
        let mut values =
            serde_json::Deserializer::from_str(&body[m.start()..]).into_iter::<Value>();
        if let Some(Ok(value)) = values.next() {
            return Ok((value, Origin::Embedded));
        }
    }

    Err(FetchError::Decode)
}
