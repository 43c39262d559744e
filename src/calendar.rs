//! Month calendar view of the lesson schedule.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::Lesson;

pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Error, PartialEq)]
pub enum CalendarError {
    #[error("Invalid month {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, CalendarError> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(CalendarError::InvalidMonth { year, month })
}

/// Number of days in the month: the day before the first of the next month.
pub fn days_in_month(year: i32, month: u32) -> Result<u32, CalendarError> {
    let first = first_of_month(year, month)?;
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .ok_or(CalendarError::InvalidMonth { year, month })
}

/// Column of the month's first day in a Monday-first week (Monday = 0).
pub fn first_weekday_offset(year: i32, month: u32) -> Result<u32, CalendarError> {
    let sunday_based = first_of_month(year, month)?.weekday().num_days_from_sunday();
    Ok(if sunday_based == 0 { 6 } else { sunday_based - 1 })
}

/// Lessons whose start falls on `date`. Lessons without a start time never match.
pub fn lessons_on<'a>(lessons: &'a [Lesson], date: NaiveDate) -> Vec<&'a Lesson> {
    lessons
        .iter()
        .filter(|lesson| lesson.start_time.is_some_and(|start| start.date() == date))
        .collect()
}

/// Year and month `delta` months away, rolling over year boundaries.
pub fn shift_month(year: i32, month: u32, delta: i32) -> Result<(i32, u32), CalendarError> {
    let first = first_of_month(year, month)?;
    let shifted = if delta >= 0 {
        first.checked_add_months(Months::new(delta.unsigned_abs()))
    } else {
        first.checked_sub_months(Months::new(delta.unsigned_abs()))
    };
    shifted
        .map(|d| (d.year(), d.month()))
        .ok_or(CalendarError::InvalidMonth { year, month })
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct DayCell {
    /// `None` for the blank cells before the first day.
    #[schema(value_type = Option<String>, format = Date, example = "2024-02-01")]
    pub date: Option<NaiveDate>,
    pub is_today: bool,
    pub lessons: Vec<Lesson>,
}

impl DayCell {
    fn blank() -> Self {
        Self {
            date: None,
            is_today: false,
            lessons: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct MonthRef {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub weekdays: Vec<String>,
    pub leading_blanks: u32,
    pub days_in_month: u32,
    pub previous: MonthRef,
    pub next: MonthRef,
    pub cells: Vec<DayCell>,
}

impl MonthGrid {
    pub fn build(
        year: i32,
        month: u32,
        today: NaiveDate,
        lessons: &[Lesson],
    ) -> Result<Self, CalendarError> {
        let first = first_of_month(year, month)?;
        let days = days_in_month(year, month)?;
        let leading_blanks = first_weekday_offset(year, month)?;

        let mut by_day: BTreeMap<NaiveDate, Vec<Lesson>> = BTreeMap::new();
        for lesson in lessons {
            let Some(start) = lesson.start_time else {
                continue;
            };
            let day = start.date();
            if day.year() == year && day.month() == month {
                by_day.entry(day).or_default().push(lesson.clone());
            }
        }

        let mut cells = Vec::with_capacity((leading_blanks + days) as usize);
        cells.extend((0..leading_blanks).map(|_| DayCell::blank()));
        for date in first.iter_days().take(days as usize) {
            cells.push(DayCell {
                date: Some(date),
                is_today: date == today,
                lessons: by_day.remove(&date).unwrap_or_default(),
            });
        }

        let (prev_year, prev_month) = shift_month(year, month, -1)?;
        let (next_year, next_month) = shift_month(year, month, 1)?;

        Ok(Self {
            year,
            month,
            month_name: MONTH_NAMES[(month - 1) as usize].to_string(),
            weekdays: WEEKDAYS.iter().map(|d| d.to_string()).collect(),
            leading_blanks,
            days_in_month: days,
            previous: MonthRef {
                year: prev_year,
                month: prev_month,
            },
            next: MonthRef {
                year: next_year,
                month: next_month,
            },
            cells,
        })
    }

    pub fn day(&self, day: u32) -> Option<&DayCell> {
        self.cells
            .get((self.leading_blanks + day).checked_sub(1)? as usize)
            .filter(|cell| cell.date.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(id: i64, start: Option<&str>) -> Lesson {
        serde_json::from_value(serde_json::json!({
            "lesson_id": id,
            "start_time": start,
        }))
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2).unwrap(), 29);
        assert_eq!(days_in_month(2023, 2).unwrap(), 28);
        assert_eq!(days_in_month(1900, 2).unwrap(), 28);
        assert_eq!(days_in_month(2000, 2).unwrap(), 29);
        assert_eq!(days_in_month(2024, 12).unwrap(), 31);
        assert_eq!(days_in_month(2024, 4).unwrap(), 30);
        assert!(days_in_month(2024, 13).is_err());
        assert!(days_in_month(2024, 0).is_err());
    }

    #[test]
    fn test_first_weekday_offset() {
        // 2024-02-01 is a Thursday
        assert_eq!(first_weekday_offset(2024, 2).unwrap(), 3);
        // 2024-09-01 is a Sunday
        assert_eq!(first_weekday_offset(2024, 9).unwrap(), 6);
        // 2024-01-01 is a Monday
        assert_eq!(first_weekday_offset(2024, 1).unwrap(), 0);
    }

    #[test]
    fn test_leap_february_grid() {
        let grid = MonthGrid::build(2024, 2, date(2024, 2, 14), &[]).unwrap();
        assert_eq!(grid.leading_blanks, 3);
        assert_eq!(grid.cells.len(), 3 + 29);
        assert!(grid.cells[..3].iter().all(|c| c.date.is_none()));
        assert_eq!(grid.day(29).unwrap().date, Some(date(2024, 2, 29)));
        assert!(grid.day(30).is_none());
        assert!(grid.day(0).is_none());
        assert_eq!(grid.month_name, "February");
        assert_eq!(grid.weekdays[0], "Monday");
    }

    #[test]
    fn test_grid_shape_for_every_month() {
        for year in [1999, 2000, 2023, 2024, 2100] {
            for month in 1..=12 {
                let grid = MonthGrid::build(year, month, date(2024, 1, 1), &[]).unwrap();
                let days = days_in_month(year, month).unwrap();
                let offset = first_weekday_offset(year, month).unwrap();
                assert_eq!(grid.cells.len() as u32, days + offset);
                for (n, cell) in grid.cells.iter().skip(offset as usize).enumerate() {
                    assert_eq!(cell.date.unwrap().day(), n as u32 + 1);
                }
            }
        }
    }

    #[test]
    fn test_today_flag() {
        let grid = MonthGrid::build(2024, 5, date(2024, 5, 10), &[]).unwrap();
        let flagged: Vec<_> = grid.cells.iter().filter(|c| c.is_today).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].date, Some(date(2024, 5, 10)));

        let other = MonthGrid::build(2024, 6, date(2024, 5, 10), &[]).unwrap();
        assert!(other.cells.iter().all(|c| !c.is_today));
    }

    #[test]
    fn test_lessons_on() {
        let lessons = vec![
            lesson(1, Some("2024-05-10T09:00:00")),
            lesson(2, Some("2024-05-10T23:59:00")),
            lesson(3, Some("2024-05-11T00:00:00")),
            lesson(4, None),
        ];
        let ids: Vec<_> = lessons_on(&lessons, date(2024, 5, 10))
            .iter()
            .map(|l| l.lesson_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        let ids: Vec<_> = lessons_on(&lessons, date(2024, 5, 11))
            .iter()
            .map(|l| l.lesson_id)
            .collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_grid_buckets_each_lesson_once() {
        let lessons = vec![
            lesson(1, Some("2024-05-10T09:00:00")),
            lesson(2, Some("2024-05-10T11:00:00")),
            lesson(3, Some("2024-05-31T18:00:00")),
            lesson(4, Some("2024-06-01T08:00:00")),
            lesson(5, Some("garbage")),
        ];
        let grid = MonthGrid::build(2024, 5, date(2024, 5, 1), &lessons).unwrap();
        let placed: Vec<i64> = grid
            .cells
            .iter()
            .flat_map(|c| c.lessons.iter().map(|l| l.lesson_id))
            .collect();
        assert_eq!(placed, vec![1, 2, 3]);
        assert_eq!(grid.day(10).unwrap().lessons.len(), 2);
        assert_eq!(grid.day(31).unwrap().lessons[0].lesson_id, 3);
    }

    #[test]
    fn test_shift_month_rolls_over_years() {
        assert_eq!(shift_month(2024, 1, -1).unwrap(), (2023, 12));
        assert_eq!(shift_month(2024, 12, 1).unwrap(), (2025, 1));
        assert_eq!(shift_month(2024, 5, 0).unwrap(), (2024, 5));
        let grid = MonthGrid::build(2024, 12, date(2024, 12, 1), &[]).unwrap();
        assert_eq!(grid.next, MonthRef { year: 2025, month: 1 });
        assert_eq!(grid.previous, MonthRef { year: 2024, month: 11 });
    }
}
