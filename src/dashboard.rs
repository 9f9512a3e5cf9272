//! Live queue status view.
//!
//! The dashboard holds one page of posts fetched from the Post Store, the
//! user's sort and selection, and a dismissible error banner. Filtering and
//! pagination are done by the backend; sorting only reorders the loaded page.
//! Every mutation is followed by a re-fetch.
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::bulk::{BulkAction, BulkExecutor, BulkReport, ItemDetail};
use crate::config::DashboardSettings;
use crate::error::{describe, ValidationError};
use crate::events::ViewEvents;
use crate::model::{
    DateRange, PageQuery, Post, PostAction, PostFilters, PostPage, PostStatus, ResultStatus,
};
use crate::store::PostStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    ScheduledAt,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl SortState {
    /// Header click: same column flips direction, a new column starts
    /// descending.
    pub fn click(&mut self, field: SortField) {
        if self.field == field {
            self.direction = match self.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
        } else {
            self.field = field;
            self.direction = SortDirection::Desc;
        }
    }

    fn compare(&self, a: &Post, b: &Post) -> Ordering {
        let ord = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            // Unscheduled rows sort as if at the epoch.
            SortField::ScheduledAt => a
                .scheduled_at
                .unwrap_or_default()
                .cmp(&b.scheduled_at.unwrap_or_default()),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        };
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// User-initiated; shows the loading state.
    Foreground,
    /// Periodic poll; never toggles the loading state.
    Silent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostActionOutcome {
    Completed,
    /// The action is not offered for the post's current status (or the post
    /// is not on the loaded page). Nothing was sent.
    NotOffered,
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformTally {
    pub published: usize,
    pub failed: usize,
    pub pending: usize,
}

/// Aggregates over the loaded page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub total: u64,
    pub on_page: usize,
    pub by_status: BTreeMap<PostStatus, usize>,
    pub by_platform: BTreeMap<String, PlatformTally>,
}

impl QueueStats {
    pub fn count(&self, status: PostStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

pub struct Dashboard {
    store: Arc<dyn PostStore>,
    events: Arc<dyn ViewEvents>,
    settings: DashboardSettings,
    query: PageQuery,
    posts: Vec<Post>,
    total: u64,
    loading: bool,
    error: Option<String>,
    sort: SortState,
    selection: Vec<String>,
    last_refreshed: Option<DateTime<Utc>>,
}

impl Dashboard {
    pub fn new(
        store: Arc<dyn PostStore>,
        events: Arc<dyn ViewEvents>,
        settings: DashboardSettings,
    ) -> Self {
        Self {
            query: PageQuery::first(settings.page_size),
            store,
            events,
            settings,
            posts: Vec::new(),
            total: 0,
            loading: false,
            error: None,
            sort: SortState::default(),
            selection: Vec::new(),
            last_refreshed: None,
        }
    }

    pub fn query(&self) -> &PageQuery {
        &self.query
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Clears the banner only; loaded rows stay.
    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.settings.refresh_interval_secs)
    }

    #[instrument(skip_all, fields(skip = self.query.skip, limit = self.query.limit))]
    pub async fn load(&mut self) {
        self.fetch(FetchMode::Foreground).await;
    }

    pub async fn refresh_silent(&mut self) {
        self.fetch(FetchMode::Silent).await;
    }

    async fn fetch(&mut self, mode: FetchMode) {
        if mode == FetchMode::Foreground {
            self.loading = true;
        }
        let query = self.query.clone();
        let result = self.store.get_posts(&query).await;
        self.apply_fetch(&query, result, mode);
    }

    /// Apply a fetch result started for `query`. Results for a query that has
    /// since changed are dropped. Returns whether the result was applied.
    pub fn apply_fetch(&mut self, query: &PageQuery, result: Result<PostPage>, mode: FetchMode) -> bool {
        if *query != self.query {
            debug!("dropping stale page result");
            return false;
        }
        if mode == FetchMode::Foreground {
            self.loading = false;
        }
        match result {
            Ok(page) => {
                debug!(count = page.posts.len(), total = page.total, "page loaded");
                for (id, from, to) in unexpected_transitions(&self.posts, &page.posts) {
                    if from.is_terminal() {
                        warn!(post_id = id, %from, %to, "post left a terminal state");
                    } else {
                        debug!(post_id = id, %from, %to, "post status jumped between refreshes");
                    }
                }
                self.posts = page.posts;
                self.total = page.total;
                self.last_refreshed = Some(Utc::now());
            }
            Err(err) => {
                warn!(?err, ?mode, "failed to load posts");
                if mode == FetchMode::Foreground || self.settings.surface_silent_errors {
                    self.error = Some(describe(&err));
                }
            }
        }
        true
    }

    /// Replace the filters and jump back to the first page.
    pub async fn set_filters(&mut self, filters: PostFilters) {
        self.query.filters = filters;
        self.query.skip = 0;
        self.load().await;
    }

    pub async fn filter_by_status(&mut self, status: Option<PostStatus>) {
        let mut filters = self.query.filters.clone();
        filters.status = status;
        self.set_filters(filters).await;
    }

    /// Validate a date range before touching the backend.
    pub async fn filter_by_dates(
        &mut self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<(), ValidationError> {
        let date_range = match range {
            Some((start, end)) => Some(DateRange::new(start, end)?),
            None => None,
        };
        let mut filters = self.query.filters.clone();
        filters.date_range = date_range;
        self.set_filters(filters).await;
        Ok(())
    }

    pub fn page_count(&self) -> u32 {
        let limit = u64::from(self.query.limit.max(1));
        u32::try_from(self.total.div_ceil(limit)).unwrap_or(u32::MAX)
    }

    pub async fn go_to_page(&mut self, page: u32) {
        let last = self.page_count().saturating_sub(1);
        self.query.skip = page.min(last).saturating_mul(self.query.limit);
        self.load().await;
    }

    pub async fn next_page(&mut self) {
        let page = self.query.page() + 1;
        if page < self.page_count() {
            self.go_to_page(page).await;
        }
    }

    pub async fn prev_page(&mut self) {
        if let Some(page) = self.query.page().checked_sub(1) {
            self.go_to_page(page).await;
        }
    }

    pub fn sort_by(&mut self, field: SortField) {
        self.sort.click(field);
    }

    /// Loaded page in display order.
    pub fn rows(&self) -> Vec<&Post> {
        let mut rows: Vec<&Post> = self.posts.iter().collect();
        rows.sort_by(|a, b| self.sort.compare(a, b));
        rows
    }

    pub fn find(&self, post_id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    pub fn actions_for(&self, post_id: &str) -> Vec<PostAction> {
        self.find(post_id)
            .map(|p| p.status.available_actions())
            .unwrap_or_default()
    }

    pub fn is_selected(&self, post_id: &str) -> bool {
        self.selection.iter().any(|id| id == post_id)
    }

    pub fn toggle_selection(&mut self, post_id: &str) {
        if let Some(pos) = self.selection.iter().position(|id| id == post_id) {
            self.selection.remove(pos);
        } else {
            self.selection.push(post_id.to_string());
        }
    }

    /// Select every row on the page in display order, or clear the selection
    /// if every row is already selected.
    pub fn toggle_select_all(&mut self) {
        let ids: Vec<String> = self.rows().iter().map(|p| p.id.clone()).collect();
        if !ids.is_empty() && ids.iter().all(|id| self.is_selected(id)) {
            self.selection.clear();
        } else {
            for id in ids {
                if !self.is_selected(&id) {
                    self.selection.push(id);
                }
            }
        }
    }

    /// Add `post_id` to the selection unless it is already there.
    pub fn select(&mut self, post_id: &str) {
        if !self.is_selected(post_id) {
            self.selection.push(post_id.to_string());
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected ids in the order they were picked.
    pub fn selected_ids(&self) -> &[String] {
        &self.selection
    }

    #[instrument(skip(self))]
    pub async fn retry(&mut self, post_id: &str) -> PostActionOutcome {
        if !self.find(post_id).is_some_and(|p| p.status.can_retry()) {
            return PostActionOutcome::NotOffered;
        }
        let result = self.store.retry_post(post_id).await.map(|_| ());
        self.finish_post_action("retry", result).await
    }

    #[instrument(skip(self))]
    pub async fn cancel(&mut self, post_id: &str) -> PostActionOutcome {
        if !self.find(post_id).is_some_and(|p| p.status.can_cancel()) {
            return PostActionOutcome::NotOffered;
        }
        let result = self.store.cancel_scheduled_post(post_id).await;
        self.finish_post_action("cancel", result).await
    }

    async fn finish_post_action(&mut self, action: &str, result: Result<()>) -> PostActionOutcome {
        match result {
            Ok(()) => {
                info!(action, "post action completed");
                self.load().await;
                self.events.on_refresh();
                PostActionOutcome::Completed
            }
            Err(err) => {
                let message = describe(&err);
                warn!(?err, action, "post action failed");
                self.error = Some(message.clone());
                PostActionOutcome::Failed(message)
            }
        }
    }

    /// Run a bulk action over the current selection. On completion the
    /// selection is cleared and the page re-fetched; on a top-level error the
    /// banner is set and the selection kept. Each post that was scheduled is
    /// reported through `on_post_scheduled` before the refresh.
    pub async fn run_bulk(&mut self, executor: &BulkExecutor, action: &BulkAction) -> Option<BulkReport> {
        let selected = self.selection.clone();
        match executor.execute(action, &selected, &self.posts).await {
            Ok(report) => {
                for item in &report.items {
                    if let Ok(ItemDetail::Scheduled { .. }) = item.result {
                        if let Some(post) = self.find(&item.post_id) {
                            self.events.on_post_scheduled(post);
                        }
                    }
                }
                self.selection.clear();
                self.load().await;
                self.events.on_refresh();
                Some(report)
            }
            Err(err) => {
                warn!(%err, "bulk action rejected");
                self.error = Some(err.to_string());
                None
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.total,
            on_page: self.posts.len(),
            ..Default::default()
        };
        for post in &self.posts {
            *stats.by_status.entry(post.status).or_default() += 1;
            for result in &post.posting_results {
                let tally = stats.by_platform.entry(result.platform.clone()).or_default();
                match result.status {
                    ResultStatus::Published => tally.published += 1,
                    ResultStatus::Failed => tally.failed += 1,
                    ResultStatus::Pending => tally.pending += 1,
                }
            }
        }
        stats
    }
}

/// Posts present in both pages whose status moved along an edge the state
/// machine does not have. Several backend steps between two polls show up
/// here too.
fn unexpected_transitions<'a>(
    before: &[Post],
    after: &'a [Post],
) -> Vec<(&'a str, PostStatus, PostStatus)> {
    after
        .iter()
        .filter_map(|new| {
            let old = before.iter().find(|p| p.id == new.id)?;
            (old.status != new.status && !old.status.can_transition_to(new.status))
                .then_some((new.id.as_str(), old.status, new.status))
        })
        .collect()
}

/// Background silent refresh for a dashboard.
///
/// Holds only a weak reference: once the dashboard is dropped the loop ends.
/// Stopping (or dropping) the handle ends the loop at its next wake-up; a
/// fetch already in flight is allowed to finish.
pub struct LiveRefresh {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LiveRefresh {
    pub fn spawn(dashboard: &Arc<Mutex<Dashboard>>, every: Duration) -> Self {
        let weak: Weak<Mutex<Dashboard>> = Arc::downgrade(dashboard);
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the initial load is the
            // caller's job.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                let Some(dash) = weak.upgrade() else { break };
                let (store, query) = {
                    let guard = dash.lock().await;
                    (guard.store.clone(), guard.query.clone())
                };
                drop(dash);
                let result = store.get_posts(&query).await;
                let Some(dash) = weak.upgrade() else { break };
                dash.lock().await.apply_fetch(&query, result, FetchMode::Silent);
            }
            debug!("live refresh stopped");
        });
        Self { stop, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn stop(self) {
        let _ = self.stop.send(true);
    }
}
