//! Schedule form handling shared by the calendar and the bulk executor.
use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::{info, instrument};

use crate::error::ValidationError;
use crate::events::ViewEvents;
use crate::model::{Post, PostingResult, ScheduleRequest};
use crate::store::PostStore;

/// Date and time as picked by the user, in local wall-clock terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleForm {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub platforms: Option<Vec<String>>,
}

impl ScheduleForm {
    pub fn at(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            date: Some(date),
            time: Some(time),
            platforms: None,
        }
    }

    pub fn with_platforms(mut self, platforms: Vec<String>) -> Self {
        self.platforms = Some(platforms);
        self
    }

    /// Resolve to an absolute instant in `tz`, checking that both parts were
    /// supplied and that the result is strictly after `now`.
    pub fn resolve_in<Tz: TimeZone>(
        &self,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ValidationError> {
        let date = self.date.ok_or(ValidationError::MissingDate)?;
        let time = self.time.ok_or(ValidationError::MissingTime)?;
        let naive = date.and_time(time);
        let at = tz
            .from_local_datetime(&naive)
            .earliest()
            .ok_or(ValidationError::NonexistentLocalTime(naive))?
            .with_timezone(&Utc);
        if at <= now {
            return Err(ValidationError::NotInFuture);
        }
        Ok(at)
    }

    pub fn resolve(&self) -> Result<DateTime<Utc>, ValidationError> {
        self.resolve_in(&Local, Utc::now())
    }
}

/// Schedule one post from the calendar view. Validation failures return
/// before the store is contacted; on success the view is told about the
/// post and asked to refresh.
#[instrument(skip_all, fields(post_id = %post.id))]
pub async fn schedule_post(
    store: &dyn PostStore,
    events: &dyn ViewEvents,
    post: &Post,
    form: &ScheduleForm,
) -> Result<PostingResult> {
    let scheduled_at = form.resolve()?;
    let req = ScheduleRequest {
        post_id: post.id.clone(),
        scheduled_at,
        platforms: form.platforms.clone(),
    };
    let result = store.schedule_post(&req).await?;
    info!(%scheduled_at, "post scheduled");
    events.on_post_scheduled(post);
    events.on_refresh();
    Ok(result)
}
