/// Month grid and reminder grouping for the calendar view.
use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::types::Reminder;

pub const GRID_DAYS: usize = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDay {
    pub date: NaiveDate,
    pub in_month: bool,
}

/// Six weeks starting on the Monday on or before the first of the month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub days: Vec<GridDay>,
}

impl MonthGrid {
    /// `None` for an out-of-range month.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let start = first - Duration::days(first.weekday().num_days_from_monday() as i64);
        let days = (0..GRID_DAYS as i64)
            .map(|offset| {
                let date = start + Duration::days(offset);
                GridDay {
                    date,
                    in_month: date.year() == year && date.month() == month,
                }
            })
            .collect();
        Some(Self { year, month, days })
    }

    /// Parse `YYYY-MM`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (year, month) = raw.trim().split_once('-')?;
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn next(&self) -> Option<Self> {
        match self.month {
            12 => Self::new(self.year + 1, 1),
            m => Self::new(self.year, m + 1),
        }
    }

    pub fn previous(&self) -> Option<Self> {
        match self.month {
            1 => Self::new(self.year - 1, 12),
            m => Self::new(self.year, m - 1),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        self.days[0].date
    }

    pub fn last_day(&self) -> NaiveDate {
        self.days[GRID_DAYS - 1].date
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[GridDay]> {
        self.days.chunks(7)
    }
}

/// Reminders grouped by calendar day, input order kept within a day.
pub fn reminders_by_day(reminders: &[Reminder]) -> BTreeMap<NaiveDate, Vec<&Reminder>> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&Reminder>> = BTreeMap::new();
    for reminder in reminders {
        by_day
            .entry(reminder.remind_at.date())
            .or_default()
            .push(reminder);
    }
    by_day
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_timestamp;
    use chrono::Weekday;

    fn reminder(id: &str, at: &str) -> Reminder {
        Reminder {
            id: id.into(),
            deal_id: "d1".into(),
            remind_at: parse_timestamp(at).unwrap(),
        }
    }

    #[test]
    fn test_grid_starts_on_monday() {
        // 1 May 2024 is a Wednesday.
        let grid = MonthGrid::new(2024, 5).unwrap();
        assert_eq!(grid.days.len(), GRID_DAYS);
        assert_eq!(grid.first_day(), NaiveDate::from_ymd_opt(2024, 4, 29).unwrap());
        assert_eq!(grid.first_day().weekday(), Weekday::Mon);
        assert!(!grid.days[0].in_month);
        assert!(grid.days[2].in_month);
        assert_eq!(grid.days.iter().filter(|d| d.in_month).count(), 31);
        assert_eq!(grid.weeks().count(), 6);
    }

    #[test]
    fn test_month_starting_on_monday() {
        let grid = MonthGrid::new(2024, 4).unwrap();
        assert_eq!(grid.first_day(), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert!(grid.days[0].in_month);
    }

    #[test]
    fn test_parse_and_navigation() {
        let grid = MonthGrid::parse("2024-12").unwrap();
        assert_eq!((grid.year, grid.month), (2024, 12));
        let next = grid.next().unwrap();
        assert_eq!((next.year, next.month), (2025, 1));
        let back = next.previous().unwrap();
        assert_eq!((back.year, back.month), (2024, 12));
        assert!(MonthGrid::parse("2024-13").is_none());
        assert!(MonthGrid::parse("soon").is_none());
    }

    #[test]
    fn test_reminders_by_day_keeps_order() {
        let reminders = vec![
            reminder("late", "2024-05-02T17:00"),
            reminder("other", "2024-05-03T08:00"),
            reminder("early", "2024-05-02T08:00"),
        ];
        let grouped = reminders_by_day(&reminders);
        let day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let ids: Vec<&str> = grouped[&day].iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["late", "early"]);
        assert_eq!(grouped.len(), 2);
    }
}
