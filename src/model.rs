use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MAX_PRIORITY: u8 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Publishing,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PostStatus::Draft),
            "scheduled" => Some(PostStatus::Scheduled),
            "publishing" => Some(PostStatus::Publishing),
            "published" => Some(PostStatus::Published),
            "failed" => Some(PostStatus::Failed),
            _ => None,
        }
    }

    /// Transitions as observed from the client. Backend-driven moves
    /// (`scheduled -> publishing`, `publishing -> published|failed`) are
    /// included so refreshed state can be sanity-checked.
    pub fn can_transition_to(&self, next: PostStatus) -> bool {
        use PostStatus::*;
        matches!(
            (self, next),
            (Draft, Scheduled)
                | (Draft, Publishing)
                | (Scheduled, Publishing)
                | (Scheduled, Draft)
                | (Publishing, Published)
                | (Publishing, Failed)
                | (Failed, Publishing)
        )
    }

    pub fn can_retry(&self) -> bool {
        *self == PostStatus::Failed
    }

    pub fn can_cancel(&self) -> bool {
        *self == PostStatus::Scheduled
    }

    pub fn is_terminal(&self) -> bool {
        *self == PostStatus::Published
    }

    /// Single-post actions the dashboard offers for a row in this state.
    pub fn available_actions(&self) -> Vec<PostAction> {
        let mut actions = Vec::new();
        if self.can_retry() {
            actions.push(PostAction::Retry);
        }
        if self.can_cancel() {
            actions.push(PostAction::Cancel);
        }
        actions
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Retry,
    Cancel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Published,
    Failed,
    Pending,
}

/// Outcome of one platform attempt, as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostingResult {
    pub platform: String,
    pub status: ResultStatus,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub target_platforms: Vec<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub platform_specific_content: Option<serde_json::Value>,
    pub status: PostStatus,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub posting_results: Vec<PostingResult>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub priority: u8,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload for `createPost`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub description: String,
    pub hashtags: Vec<String>,
    pub images: Vec<String>,
    pub target_platforms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_specific_content: Option<serde_json::Value>,
    pub status: PostStatus,
    pub priority: u8,
}

impl NewPost {
    pub fn draft(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            hashtags: Vec::new(),
            images: Vec::new(),
            target_platforms: Vec::new(),
            product_id: None,
            platform_specific_content: None,
            status: PostStatus::Draft,
            priority: 0,
        }
    }

    /// Copy of `original` as a fresh draft titled `"<title> (Copy)"`.
    /// The original's status, schedule and outcomes are not carried over.
    pub fn duplicate_of(original: &Post) -> Self {
        Self {
            title: format!("{} (Copy)", original.title),
            description: original.description.clone(),
            hashtags: original.hashtags.clone(),
            images: original.images.clone(),
            target_platforms: original.target_platforms.clone(),
            product_id: original.product_id.clone(),
            platform_specific_content: original.platform_specific_content.clone(),
            status: PostStatus::Draft,
            priority: original.priority,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(MAX_PRIORITY);
        self
    }
}

/// Inclusive calendar date range used by the status filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

/// Backend-side filters for `getPosts`. Closed set: anything else is not
/// expressible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilters {
    pub status: Option<PostStatus>,
    pub date_range: Option<DateRange>,
}

impl PostFilters {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(range) = self.date_range {
            pairs.push(("start_date", range.start().format("%Y-%m-%d").to_string()));
            pairs.push(("end_date", range.end().format("%Y-%m-%d").to_string()));
        }
        pairs
    }
}

/// One page request: filters plus skip/limit pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub skip: u32,
    pub limit: u32,
    pub filters: PostFilters,
}

impl PageQuery {
    pub fn first(limit: u32) -> Self {
        Self {
            skip: 0,
            limit,
            filters: PostFilters::default(),
        }
    }

    /// Zero-based page index.
    pub fn page(&self) -> u32 {
        if self.limit == 0 {
            0
        } else {
            self.skip / self.limit
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PublishRequest {
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleRequest {
    pub post_id: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkPublishRequest {
    pub post_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkScheduleRequest {
    pub post_ids: Vec<String>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
}
