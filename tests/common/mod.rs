#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use social_scheduler::events::ViewEvents;
use social_scheduler::model::{
    BulkPublishRequest, BulkScheduleRequest, NewPost, PageQuery, Post, PostPage, PostStatus,
    PostingResult, PublishRequest, ResultStatus, ScheduleRequest,
};
use social_scheduler::store::PostStore;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(NewPost),
    GetPosts(PageQuery),
    Publish(PublishRequest),
    Schedule(ScheduleRequest),
    Cancel(String),
    Retry(String),
    BulkPublish(BulkPublishRequest),
    BulkSchedule(BulkScheduleRequest),
    Delete(String),
}

/// Scriptable store that records every call in order and tracks how many
/// calls were in flight at once.
#[derive(Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<Call>>,
    page: Mutex<PostPage>,
    scripted_pages: Mutex<VecDeque<Result<PostPage>>>,
    failing_ids: Mutex<HashSet<String>>,
    rejected_ids: Mutex<HashSet<String>>,
    bulk_publish_error: Mutex<Option<String>>,
    created: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingStore {
    pub fn with_posts(posts: Vec<Post>) -> Arc<Self> {
        let store = Self::default();
        let total = posts.len() as u64;
        store.page.try_lock().unwrap().posts = posts;
        store.page.try_lock().unwrap().total = total;
        Arc::new(store)
    }

    pub async fn set_total(&self, total: u64) {
        self.page.lock().await.total = total;
    }

    pub async fn set_posts(&self, posts: Vec<Post>) {
        self.page.lock().await.posts = posts;
    }

    /// Next `get_posts` returns this instead of the standing page.
    pub async fn script_page(&self, result: Result<PostPage>) {
        self.scripted_pages.lock().await.push_back(result);
    }

    /// Any per-post call for `id` errors.
    pub async fn fail_on(&self, id: &str) {
        self.failing_ids.lock().await.insert(id.to_string());
    }

    /// `schedule_post` for `id` returns a `failed` PostingResult.
    pub async fn reject_schedule(&self, id: &str) {
        self.rejected_ids.lock().await.insert(id.to_string());
    }

    pub async fn fail_bulk_publish(&self, message: &str) {
        *self.bulk_publish_error.lock().await = Some(message.to_string());
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn get_posts_calls(&self) -> Vec<PageQuery> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                Call::GetPosts(q) => Some(q.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn mutating_calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| !matches!(c, Call::GetPosts(_)))
            .cloned()
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().await.push(call);
        tokio::task::yield_now().await;
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    async fn check(&self, id: &str) -> Result<()> {
        if self.failing_ids.lock().await.contains(id) {
            return Err(anyhow!("backend rejected {}", id));
        }
        Ok(())
    }

    async fn per_post<T>(&self, call: Call, id: &str, ok: T) -> Result<T> {
        self.enter(call).await;
        let res = self.check(id).await.map(|_| ok);
        self.exit();
        res
    }
}

pub fn posting(platform: &str, status: ResultStatus) -> PostingResult {
    PostingResult {
        platform: platform.to_string(),
        status,
        post_id: None,
        url: None,
        error_message: None,
        retry_count: 0,
    }
}

#[async_trait]
impl PostStore for RecordingStore {
    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        self.enter(Call::Create(post.clone())).await;
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        self.exit();
        let mut created = sample_post(&format!("created-{}", n), post.status);
        created.title = post.title.clone();
        created.description = post.description.clone();
        created.hashtags = post.hashtags.clone();
        created.images = post.images.clone();
        created.target_platforms = post.target_platforms.clone();
        Ok(created)
    }

    async fn get_posts(&self, query: &PageQuery) -> Result<PostPage> {
        self.enter(Call::GetPosts(query.clone())).await;
        let scripted = self.scripted_pages.lock().await.pop_front();
        let res = match scripted {
            Some(result) => result,
            None => Ok(self.page.lock().await.clone()),
        };
        self.exit();
        res
    }

    async fn publish_post(&self, req: &PublishRequest) -> Result<PostingResult> {
        self.per_post(
            Call::Publish(req.clone()),
            &req.post_id,
            posting("instagram", ResultStatus::Pending),
        )
        .await
    }

    async fn schedule_post(&self, req: &ScheduleRequest) -> Result<PostingResult> {
        let mut result = posting("instagram", ResultStatus::Pending);
        if self.rejected_ids.lock().await.contains(&req.post_id) {
            result.status = ResultStatus::Failed;
            result.error_message = Some("platform not connected".into());
        }
        self.per_post(Call::Schedule(req.clone()), &req.post_id, result)
            .await
    }

    async fn cancel_scheduled_post(&self, post_id: &str) -> Result<()> {
        self.per_post(Call::Cancel(post_id.to_string()), post_id, ())
            .await
    }

    async fn retry_post(&self, post_id: &str) -> Result<PostingResult> {
        self.per_post(
            Call::Retry(post_id.to_string()),
            post_id,
            posting("instagram", ResultStatus::Pending),
        )
        .await
    }

    async fn bulk_publish(&self, req: &BulkPublishRequest) -> Result<Vec<PostingResult>> {
        self.enter(Call::BulkPublish(req.clone())).await;
        let err = self.bulk_publish_error.lock().await.clone();
        self.exit();
        match err {
            Some(msg) => Err(anyhow!(msg)),
            None => Ok(req
                .post_ids
                .iter()
                .map(|_| posting("instagram", ResultStatus::Pending))
                .collect()),
        }
    }

    async fn bulk_schedule(&self, req: &BulkScheduleRequest) -> Result<Vec<PostingResult>> {
        self.enter(Call::BulkSchedule(req.clone())).await;
        self.exit();
        Ok(req
            .post_ids
            .iter()
            .map(|_| posting("instagram", ResultStatus::Pending))
            .collect())
    }

    async fn delete_post(&self, post_id: &str) -> Result<()> {
        self.per_post(Call::Delete(post_id.to_string()), post_id, ())
            .await
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    scheduled: std::sync::Mutex<Vec<String>>,
    refreshes: AtomicUsize,
}

impl RecordingEvents {
    pub fn scheduled(&self) -> Vec<String> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl ViewEvents for RecordingEvents {
    fn on_post_scheduled(&self, post: &Post) {
        self.scheduled.lock().unwrap().push(post.id.clone());
    }

    fn on_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

pub fn sample_post(id: &str, status: PostStatus) -> Post {
    Post {
        id: id.to_string(),
        title: format!("Post {}", id),
        description: "desc".into(),
        hashtags: vec!["#shop".into()],
        images: vec![format!("uploads/{}.jpg", id)],
        target_platforms: vec!["instagram".into()],
        product_id: None,
        platform_specific_content: None,
        status,
        scheduled_at: None,
        published_at: None,
        posting_results: Vec::new(),
        retry_count: 0,
        max_retries: 3,
        last_error: None,
        priority: 5,
        created_at: at("2024-01-01T09:00:00Z"),
        updated_at: None,
    }
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
