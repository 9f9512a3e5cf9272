//! Hooks the presentation layer implements to re-render after a mutation.
use crate::model::Post;

pub trait ViewEvents: Send + Sync {
    /// A single post was scheduled from the calendar view.
    fn on_post_scheduled(&self, _post: &Post) {}

    /// Any mutating operation finished; the post list should be reloaded.
    fn on_refresh(&self) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

impl ViewEvents for NoopEvents {}
