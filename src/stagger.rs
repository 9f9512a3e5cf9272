use chrono::{DateTime, Duration, Utc};

use crate::error::ValidationError;

/// Compute `count` publish times starting at `base`.
///
/// With staggering off every slot equals `base`. With it on, slot `i` is
/// `base + i * interval_minutes`, so the first post in the input order gets
/// the earliest time. No ceiling is placed on the total span, but a span that
/// runs past the representable date range is rejected.
pub fn stagger(
    base: DateTime<Utc>,
    count: usize,
    enabled: bool,
    interval_minutes: u32,
) -> Result<Vec<DateTime<Utc>>, ValidationError> {
    if !enabled {
        return Ok(vec![base; count]);
    }
    let step = Duration::try_minutes(i64::from(interval_minutes))
        .ok_or(ValidationError::StaggerSpanTooLarge)?;
    (0..count)
        .map(|i| {
            i32::try_from(i)
                .ok()
                .and_then(|i| step.checked_mul(i))
                .and_then(|offset| base.checked_add_signed(offset))
                .ok_or(ValidationError::StaggerSpanTooLarge)
        })
        .collect()
}
