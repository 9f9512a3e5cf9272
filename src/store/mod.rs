//! The Post Store boundary.
//!
//! All post identity and persistence live in the backend; the client only
//! requests operations through [`PostStore`] and renders what comes back.
//! Implementations are constructed once and passed around as
//! `Arc<dyn PostStore>`.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{
    BulkPublishRequest, BulkScheduleRequest, NewPost, PageQuery, Post, PostPage, PostingResult,
    PublishRequest, ScheduleRequest,
};

pub mod http;

pub use http::HttpPostStore;

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, post: &NewPost) -> Result<Post>;

    async fn get_posts(&self, query: &PageQuery) -> Result<PostPage>;

    async fn publish_post(&self, req: &PublishRequest) -> Result<PostingResult>;

    async fn schedule_post(&self, req: &ScheduleRequest) -> Result<PostingResult>;

    async fn cancel_scheduled_post(&self, post_id: &str) -> Result<()>;

    async fn retry_post(&self, post_id: &str) -> Result<PostingResult>;

    async fn bulk_publish(&self, req: &BulkPublishRequest) -> Result<Vec<PostingResult>>;

    async fn bulk_schedule(&self, req: &BulkScheduleRequest) -> Result<Vec<PostingResult>>;

    async fn delete_post(&self, post_id: &str) -> Result<()>;
}
