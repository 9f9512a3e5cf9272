pub mod bulk;
pub mod calendar;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod model;
pub mod schedule;
pub mod stagger;
pub mod store;
