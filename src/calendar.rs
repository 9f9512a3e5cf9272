//! Month grid for the scheduling calendar.
//!
//! The grid always has six full weeks (42 cells) starting on the Sunday on or
//! before the first of the month. Posts are bucketed by the *local* calendar
//! date of `scheduled_at`; time of day only affects ordering within a cell.
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone};

use crate::error::ValidationError;
use crate::model::Post;

pub const GRID_DAYS: usize = 42;
pub const EMPTY_DAY_MESSAGE: &str = "No posts scheduled for this day";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthRef {
    year: i32,
    month: u32,
}

impl MonthRef {
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(ValidationError::InvalidMonth { year, month });
        }
        Ok(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Following month, or `None` past the last representable year.
    pub fn next(&self) -> Option<Self> {
        if self.month == 12 {
            Self::new(self.year.checked_add(1)?, 1).ok()
        } else {
            Self::new(self.year, self.month + 1).ok()
        }
    }

    pub fn prev(&self) -> Option<Self> {
        if self.month == 1 {
            Self::new(self.year.checked_sub(1)?, 12).ok()
        } else {
            Self::new(self.year, self.month - 1).ok()
        }
    }

    /// e.g. `"January 2024"`.
    pub fn title(&self) -> String {
        self.first_day().format("%B %Y").to_string()
    }

    /// Sunday on or before the first of the month.
    pub fn grid_start(&self) -> NaiveDate {
        let first = self.first_day();
        let back = i64::from(first.weekday().num_days_from_sunday());
        first - Duration::days(back)
    }
}

/// A post placed in a day cell, with its local time of day.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEntry {
    pub time: NaiveTime,
    pub post: Post,
}

impl ScheduledEntry {
    /// 12-hour label such as `"2:30 PM"`.
    pub fn time_label(&self) -> String {
        self.time.format("%-I:%M %p").to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_current_month: bool,
    pub is_today: bool,
    pub entries: Vec<ScheduledEntry>,
}

impl CalendarDay {
    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.entries.iter().map(|e| &e.post)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What the side panel shows for a selected day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayAgenda<'a> {
    Empty,
    Entries(&'a [ScheduledEntry]),
}

impl DayAgenda<'_> {
    pub fn lines(&self) -> Vec<String> {
        match self {
            DayAgenda::Empty => vec![EMPTY_DAY_MESSAGE.to_string()],
            DayAgenda::Entries(entries) => entries
                .iter()
                .map(|e| format!("{}  {} [{}]", e.time_label(), e.post.title, e.post.status))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarGrid {
    month: MonthRef,
    days: Vec<CalendarDay>,
}

impl CalendarGrid {
    pub fn month(&self) -> MonthRef {
        self.month
    }

    pub fn days(&self) -> &[CalendarDay] {
        &self.days
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarDay]> {
        self.days.chunks(7)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay> {
        let offset = (date - self.month.grid_start()).num_days();
        usize::try_from(offset).ok().and_then(|i| self.days.get(i))
    }

    /// Cell for a day number of the displayed month.
    pub fn day_of_month(&self, day: u32) -> Option<&CalendarDay> {
        let date = NaiveDate::from_ymd_opt(self.month.year, self.month.month, day)?;
        self.day(date)
    }

    pub fn agenda(&self, date: NaiveDate) -> DayAgenda<'_> {
        match self.day(date) {
            Some(day) if !day.is_empty() => DayAgenda::Entries(&day.entries),
            _ => DayAgenda::Empty,
        }
    }
}

/// Build the grid in the machine's local timezone, highlighting the real
/// current date. Call again whenever "today" may have moved.
pub fn build_month(month: MonthRef, posts: &[Post]) -> CalendarGrid {
    build_month_in(&Local, month, posts, Local::now().date_naive())
}

pub fn build_month_in<Tz: TimeZone>(
    tz: &Tz,
    month: MonthRef,
    posts: &[Post],
    today: NaiveDate,
) -> CalendarGrid {
    let start = month.grid_start();
    let mut days: Vec<CalendarDay> = start
        .iter_days()
        .take(GRID_DAYS)
        .map(|date| CalendarDay {
            date,
            is_current_month: date.month() == month.month && date.year() == month.year,
            is_today: date == today,
            entries: Vec::new(),
        })
        .collect();

    for post in posts {
        let Some(at) = post.scheduled_at else {
            continue;
        };
        let local = at.with_timezone(tz).naive_local();
        let offset = (local.date() - start).num_days();
        if let Some(day) = usize::try_from(offset).ok().and_then(|i| days.get_mut(i)) {
            day.entries.push(ScheduledEntry {
                time: local.time(),
                post: post.clone(),
            });
        }
    }

    for day in &mut days {
        day.entries.sort_by_key(|e| e.time);
    }

    CalendarGrid { month, days }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::post;
    use crate::model::PostStatus;
    use chrono::{FixedOffset, Utc, Weekday};

    fn scheduled(id: &str, rfc3339: &str) -> Post {
        let mut p = post(id, PostStatus::Scheduled);
        p.scheduled_at = Some(rfc3339.parse().unwrap());
        p
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn always_42_days_starting_sunday() {
        let today = date(2024, 6, 1);
        for year in 1999..=2031 {
            for m in 1..=12 {
                let month = MonthRef::new(year, m).unwrap();
                let grid = build_month_in(&Utc, month, &[], today);
                assert_eq!(grid.days().len(), GRID_DAYS);
                let first = &grid.days()[0];
                assert_eq!(first.date.weekday(), Weekday::Sun);
                assert!(first.date <= month.first_day());
                assert!((month.first_day() - first.date).num_days() < 7);
                assert!(grid
                    .days()
                    .windows(2)
                    .all(|w| w[1].date == w[0].date + Duration::days(1)));
            }
        }
    }

    #[test]
    fn month_starting_on_sunday_starts_on_first() {
        // 1 Sep 2024 is a Sunday.
        let grid = build_month_in(&Utc, MonthRef::new(2024, 9).unwrap(), &[], date(2024, 9, 3));
        assert_eq!(grid.days()[0].date, date(2024, 9, 1));
        assert!(grid.days()[0].is_current_month);
    }

    #[test]
    fn same_month_builds_identical_dates() {
        let month = MonthRef::new(2024, 2).unwrap();
        let a = build_month_in(&Utc, month, &[], date(2024, 2, 10));
        let b = build_month_in(&Utc, month, &[], date(2030, 1, 1));
        let da: Vec<_> = a.days().iter().map(|d| (d.date, d.is_current_month)).collect();
        let db: Vec<_> = b.days().iter().map(|d| (d.date, d.is_current_month)).collect();
        assert_eq!(da, db);
    }

    #[test]
    fn adjacent_month_cells_flagged() {
        let grid = build_month_in(&Utc, MonthRef::new(2024, 1).unwrap(), &[], date(2024, 1, 20));
        // Jan 2024 starts on a Monday, so the grid opens with 31 Dec 2023.
        assert_eq!(grid.days()[0].date, date(2023, 12, 31));
        assert!(!grid.days()[0].is_current_month);
        assert!(grid.days()[1].is_current_month);
        assert!(!grid.days()[41].is_current_month);
        let today: Vec<_> = grid.days().iter().filter(|d| d.is_today).collect();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].date, date(2024, 1, 20));
    }

    #[test]
    fn post_lands_in_exactly_one_bucket_by_local_date() {
        let posts = vec![
            scheduled("early", "2024-01-15T00:05:00Z"),
            scheduled("late", "2024-01-15T23:55:00Z"),
        ];
        let grid = build_month_in(&Utc, MonthRef::new(2024, 1).unwrap(), &posts, date(2024, 1, 1));
        for p in &posts {
            let hits = grid
                .days()
                .iter()
                .filter(|d| d.posts().any(|q| q.id == p.id))
                .count();
            assert_eq!(hits, 1);
        }
        let ids: Vec<_> = grid.day(date(2024, 1, 15)).unwrap().posts().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn bucketing_follows_timezone() {
        let posts = vec![scheduled("p", "2024-01-15T23:30:00Z")];
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let grid = build_month_in(&tz, MonthRef::new(2024, 1).unwrap(), &posts, date(2024, 1, 1));
        assert!(grid.day(date(2024, 1, 15)).unwrap().is_empty());
        let day = grid.day(date(2024, 1, 16)).unwrap();
        assert_eq!(day.entries[0].time_label(), "1:30 AM");
    }

    #[test]
    fn unscheduled_and_out_of_grid_posts_are_skipped() {
        let mut draft = post("d", PostStatus::Draft);
        draft.scheduled_at = None;
        let far = scheduled("far", "2024-05-01T10:00:00Z");
        let grid = build_month_in(&Utc, MonthRef::new(2024, 1).unwrap(), &[draft, far], date(2024, 1, 1));
        assert!(grid.days().iter().all(CalendarDay::is_empty));
    }

    #[test]
    fn day_panel_lists_times_or_empty_message() {
        let posts = vec![
            scheduled("b", "2024-01-15T16:00:00Z"),
            scheduled("a", "2024-01-15T14:30:00Z"),
        ];
        let grid = build_month_in(&Utc, MonthRef::new(2024, 1).unwrap(), &posts, date(2024, 1, 1));

        let day15 = grid.day_of_month(15).unwrap();
        let labels: Vec<_> = day15.entries.iter().map(ScheduledEntry::time_label).collect();
        assert_eq!(labels, vec!["2:30 PM", "4:00 PM"]);
        match grid.agenda(day15.date) {
            DayAgenda::Entries(entries) => assert_eq!(entries.len(), 2),
            DayAgenda::Empty => panic!("expected entries"),
        }

        let day16 = grid.day_of_month(16).unwrap();
        assert_eq!(grid.agenda(day16.date), DayAgenda::Empty);
        assert_eq!(grid.agenda(day16.date).lines(), vec![EMPTY_DAY_MESSAGE.to_string()]);
    }

    #[test]
    fn month_navigation_wraps_years() {
        let dec = MonthRef::new(2023, 12).unwrap();
        assert_eq!(dec.next(), Some(MonthRef::new(2024, 1).unwrap()));
        assert_eq!(dec.next().and_then(|m| m.prev()), Some(dec));
        assert_eq!(MonthRef::new(2024, 1).unwrap().title(), "January 2024");
        assert!(matches!(
            MonthRef::new(2024, 13),
            Err(ValidationError::InvalidMonth { month: 13, .. })
        ));
    }

    #[test]
    fn navigation_stops_at_representable_range() {
        let last = MonthRef::containing(NaiveDate::MAX);
        assert_eq!(last.next(), None);
        assert!(last.prev().is_some());
        let first = MonthRef::containing(NaiveDate::MIN);
        assert_eq!(first.prev(), None);
        assert!(first.next().is_some());
    }
}
