//! Bulk actions over a selected set of posts.
//!
//! Schedule, Delete and Duplicate are sent one post at a time, each request
//! awaited before the next is issued. Outcomes therefore come back in
//! selection order and the backend never sees a burst from one action.
//! Keep it sequential.
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::error::{describe, ValidationError, GENERIC_ERROR_MESSAGE};
use crate::model::{BulkPublishRequest, NewPost, Post, PostingResult, ResultStatus, ScheduleRequest};
use crate::schedule::ScheduleForm;
use crate::stagger::stagger;
use crate::store::PostStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaggerOptions {
    pub enabled: bool,
    pub interval_minutes: u32,
}

impl StaggerOptions {
    pub fn off() -> Self {
        Self {
            enabled: false,
            interval_minutes: 0,
        }
    }

    pub fn every(interval_minutes: u32) -> Self {
        Self {
            enabled: true,
            interval_minutes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    /// One request for the whole selection. `None` publishes each post to its
    /// own stored platforms.
    Publish { platforms: Option<Vec<String>> },
    Schedule {
        form: ScheduleForm,
        stagger: StaggerOptions,
    },
    Delete,
    Duplicate,
}

impl BulkAction {
    pub fn kind(&self) -> BulkActionKind {
        match self {
            BulkAction::Publish { .. } => BulkActionKind::Publish,
            BulkAction::Schedule { .. } => BulkActionKind::Schedule,
            BulkAction::Delete => BulkActionKind::Delete,
            BulkAction::Duplicate => BulkActionKind::Duplicate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkActionKind {
    Publish,
    Schedule,
    Delete,
    Duplicate,
}

impl BulkActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkActionKind::Publish => "publish",
            BulkActionKind::Schedule => "schedule",
            BulkActionKind::Delete => "delete",
            BulkActionKind::Duplicate => "duplicate",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            BulkActionKind::Publish => "Published",
            BulkActionKind::Schedule => "Scheduled",
            BulkActionKind::Delete => "Deleted",
            BulkActionKind::Duplicate => "Duplicated",
        }
    }
}

impl fmt::Display for BulkActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BulkError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The single bulk-publish request failed; nothing was attempted per item.
    #[error("{}", describe(.0))]
    Publish(#[source] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemDetail {
    /// Included in a bulk publish request.
    Submitted,
    Scheduled {
        at: DateTime<Utc>,
        result: PostingResult,
    },
    Deleted,
    Duplicated(Post),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub post_id: String,
    pub result: Result<ItemDetail, String>,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }
}

/// Outcomes of one bulk action, in selection order.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkReport {
    pub kind: BulkActionKind,
    pub items: Vec<ItemOutcome>,
    /// Per-platform results returned by a bulk publish.
    pub posting_results: Vec<PostingResult>,
}

impl BulkReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(|i| !i.is_success())
    }

    pub fn summary(&self) -> String {
        let total = self.items.len();
        let noun = if total == 1 { "post" } else { "posts" };
        let mut line = format!(
            "{} {} of {} {}",
            self.kind.past_tense(),
            self.succeeded(),
            total,
            noun
        );
        if self.failed() > 0 {
            line.push_str(&format!(" ({} failed)", self.failed()));
        }
        line
    }
}

pub struct BulkExecutor {
    store: Arc<dyn PostStore>,
}

impl BulkExecutor {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    /// Run `action` over `selected` (ids in the order the user picked them).
    /// `loaded` is the post list currently on screen; Duplicate copies from it.
    ///
    /// Per-item failures are recorded and the loop carries on. Only
    /// validation problems and a failed bulk publish return `Err`.
    #[instrument(skip_all, fields(action = %action.kind(), count = selected.len()))]
    pub async fn execute(
        &self,
        action: &BulkAction,
        selected: &[String],
        loaded: &[Post],
    ) -> Result<BulkReport, BulkError> {
        if selected.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }
        let report = match action {
            BulkAction::Publish { platforms } => self.publish(selected, platforms.clone()).await?,
            BulkAction::Schedule { form, stagger } => {
                let base = form.resolve()?;
                self.schedule_at(selected, base, *stagger, form.platforms.clone())
                    .await?
            }
            BulkAction::Delete => self.delete(selected).await,
            BulkAction::Duplicate => self.duplicate(selected, loaded).await,
        };
        info!(summary = %report.summary(), "bulk action finished");
        Ok(report)
    }

    async fn publish(
        &self,
        selected: &[String],
        platforms: Option<Vec<String>>,
    ) -> Result<BulkReport, BulkError> {
        let req = BulkPublishRequest {
            post_ids: selected.to_vec(),
            platforms,
        };
        let results = self.store.bulk_publish(&req).await.map_err(BulkError::Publish)?;
        Ok(BulkReport {
            kind: BulkActionKind::Publish,
            items: selected
                .iter()
                .map(|id| ItemOutcome {
                    post_id: id.clone(),
                    result: Ok(ItemDetail::Submitted),
                })
                .collect(),
            posting_results: results,
        })
    }

    /// Schedule each post at its staggered slot from an already validated
    /// base time.
    pub async fn schedule_at(
        &self,
        selected: &[String],
        base: DateTime<Utc>,
        options: StaggerOptions,
        platforms: Option<Vec<String>>,
    ) -> Result<BulkReport, BulkError> {
        if selected.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }
        if options.enabled && options.interval_minutes == 0 {
            return Err(ValidationError::InvalidStaggerInterval.into());
        }
        let slots = stagger(base, selected.len(), options.enabled, options.interval_minutes)?;
        let mut items = Vec::with_capacity(selected.len());
        for (id, at) in selected.iter().zip(slots) {
            let req = ScheduleRequest {
                post_id: id.clone(),
                scheduled_at: at,
                platforms: platforms.clone(),
            };
            let result = match self.store.schedule_post(&req).await {
                Ok(r) if r.status == ResultStatus::Failed => Err(r
                    .error_message
                    .clone()
                    .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())),
                Ok(r) => Ok(ItemDetail::Scheduled { at, result: r }),
                Err(err) => Err(describe(&err)),
            };
            log_item(BulkActionKind::Schedule, id, &result);
            items.push(ItemOutcome {
                post_id: id.clone(),
                result,
            });
        }
        Ok(BulkReport {
            kind: BulkActionKind::Schedule,
            items,
            posting_results: Vec::new(),
        })
    }

    async fn delete(&self, selected: &[String]) -> BulkReport {
        let mut items = Vec::with_capacity(selected.len());
        for id in selected {
            let result = match self.store.delete_post(id).await {
                Ok(()) => Ok(ItemDetail::Deleted),
                Err(err) => Err(describe(&err)),
            };
            log_item(BulkActionKind::Delete, id, &result);
            items.push(ItemOutcome {
                post_id: id.clone(),
                result,
            });
        }
        BulkReport {
            kind: BulkActionKind::Delete,
            items,
            posting_results: Vec::new(),
        }
    }

    async fn duplicate(&self, selected: &[String], loaded: &[Post]) -> BulkReport {
        let mut items = Vec::with_capacity(selected.len());
        for id in selected {
            let result = match loaded.iter().find(|p| &p.id == id) {
                None => Err(format!("Post {} is not loaded", id)),
                Some(original) => match self.store.create_post(&NewPost::duplicate_of(original)).await {
                    Ok(created) => Ok(ItemDetail::Duplicated(created)),
                    Err(err) => Err(describe(&err)),
                },
            };
            log_item(BulkActionKind::Duplicate, id, &result);
            items.push(ItemOutcome {
                post_id: id.clone(),
                result,
            });
        }
        BulkReport {
            kind: BulkActionKind::Duplicate,
            items,
            posting_results: Vec::new(),
        }
    }
}

fn log_item(kind: BulkActionKind, post_id: &str, result: &Result<ItemDetail, String>) {
    match result {
        Ok(_) => info!(action = %kind, post_id, "bulk item succeeded"),
        Err(err) => warn!(action = %kind, post_id, error = %err, "bulk item failed; continuing"),
    }
}
