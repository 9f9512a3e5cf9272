use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::PostStore;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::{
    BulkPublishRequest, BulkScheduleRequest, NewPost, PageQuery, Post, PostPage, PostingResult,
    PublishRequest, ScheduleRequest,
};

/// REST binding of the Post Store.
#[derive(Clone)]
pub struct HttpPostStore {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for HttpPostStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPostStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpPostStore {
    pub fn new(base_url: &str, token: String, timeout: Duration) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized).context("invalid post store base URL")?;
        let http = Client::builder()
            .user_agent(concat!("social-scheduler/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            &cfg.api.base_url,
            cfg.api.token.clone(),
            Duration::from_secs(cfg.api.timeout_secs),
        )
    }

    /// Resolve `segments` under the base URL. Each segment is percent-encoded,
    /// so an id can never change which endpoint is hit. An empty final
    /// segment produces a trailing slash.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "." | "..")) {
            bail!("invalid post store path segment: {:?}", bad);
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("post store base URL cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn build_request(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Request> {
        let endpoint = self.endpoint(segments)?;
        let mut builder = self
            .http
            .request(method, endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json");
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.build().context("failed to build post store request")
    }

    async fn send(&self, request: reqwest::Request) -> Result<Response> {
        debug!(method=%request.method(), url=%request.url(), "sending post store request");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach post store")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, body=%body, "post store error");
            return Err(ApiError {
                status: status.as_u16(),
                message: error_message(&body),
            }
            .into());
        }
        Ok(res)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T> {
        let request = self.build_request(method, segments, query, body.as_ref())?;
        let res = self.send(request).await?;
        res.json::<T>()
            .await
            .context("invalid post store response")
    }

    async fn call_empty(&self, method: Method, segments: &[&str]) -> Result<()> {
        let request = self.build_request(method, segments, &[], None)?;
        self.send(request).await?;
        Ok(())
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("failed to encode request body")
}

/// Extract a message from a backend error body: `detail` (string) or
/// `message`. Anything else yields `None` so callers fall back to a generic
/// message.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["detail", "message"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl PostStore for HttpPostStore {
    #[instrument(skip_all)]
    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        self.call(Method::POST, &["posts", ""], &[], Some(to_body(post)?))
            .await
            .context("failed to create post")
    }

    #[instrument(skip_all, fields(skip = query.skip, limit = query.limit))]
    async fn get_posts(&self, query: &PageQuery) -> Result<PostPage> {
        let mut pairs = vec![
            ("skip", query.skip.to_string()),
            ("limit", query.limit.to_string()),
        ];
        pairs.extend(query.filters.query_pairs());
        self.call(Method::GET, &["posts", ""], &pairs, None)
            .await
            .context("failed to load posts")
    }

    #[instrument(skip_all, fields(post_id = %req.post_id))]
    async fn publish_post(&self, req: &PublishRequest) -> Result<PostingResult> {
        self.call(Method::POST, &["posts", "publish"], &[], Some(to_body(req)?))
            .await
            .context("failed to publish post")
    }

    #[instrument(skip_all, fields(post_id = %req.post_id))]
    async fn schedule_post(&self, req: &ScheduleRequest) -> Result<PostingResult> {
        self.call(Method::POST, &["posts", "schedule"], &[], Some(to_body(req)?))
            .await
            .context("failed to schedule post")
    }

    #[instrument(skip_all, fields(post_id = %post_id))]
    async fn cancel_scheduled_post(&self, post_id: &str) -> Result<()> {
        self.call_empty(Method::DELETE, &["posts", post_id, "schedule"])
            .await
            .context("failed to cancel scheduled post")
    }

    #[instrument(skip_all, fields(post_id = %post_id))]
    async fn retry_post(&self, post_id: &str) -> Result<PostingResult> {
        self.call(Method::POST, &["posts", post_id, "retry"], &[], None)
            .await
            .context("failed to retry post")
    }

    #[instrument(skip_all, fields(count = req.post_ids.len()))]
    async fn bulk_publish(&self, req: &BulkPublishRequest) -> Result<Vec<PostingResult>> {
        self.call(Method::POST, &["posts", "bulk", "publish"], &[], Some(to_body(req)?))
            .await
            .context("failed to publish posts")
    }

    #[instrument(skip_all, fields(count = req.post_ids.len()))]
    async fn bulk_schedule(&self, req: &BulkScheduleRequest) -> Result<Vec<PostingResult>> {
        self.call(Method::POST, &["posts", "bulk", "schedule"], &[], Some(to_body(req)?))
            .await
            .context("failed to schedule posts")
    }

    #[instrument(skip_all, fields(post_id = %post_id))]
    async fn delete_post(&self, post_id: &str) -> Result<()> {
        self.call_empty(Method::DELETE, &["posts", post_id])
            .await
            .context("failed to delete post")
    }
}
