//! Monthly attendance reconciliation.
//!
//! Takes the raw per-student marks for a month and produces the completed
//! day grid with Sundays and holidays folded in, plus the aggregates shown on
//! the monthly report.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceMark {
    #[serde(rename = "P")]
    Present,
    #[serde(rename = "A")]
    Absent,
    #[serde(rename = "H")]
    Holiday,
    #[serde(rename = "-")]
    Unmarked,
}

impl AttendanceMark {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceMark::Present => "P",
            AttendanceMark::Absent => "A",
            AttendanceMark::Holiday => "H",
            AttendanceMark::Unmarked => "-",
        }
    }

    /// Parses a stored mark. Empty strings and anything unknown read as
    /// unmarked.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "P" => AttendanceMark::Present,
            "A" => AttendanceMark::Absent,
            "H" => AttendanceMark::Holiday,
            _ => AttendanceMark::Unmarked,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RawStudentAttendance {
    pub student_id: i64,
    pub roll_no: i64,
    pub name: String,
    pub marks: BTreeMap<u32, AttendanceMark>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentMonthSummary {
    pub student_id: i64,
    pub roll_no: i64,
    pub name: String,
    pub days: BTreeMap<u32, AttendanceMark>,
    pub present: u32,
    pub instructional_days: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyAttendanceReport {
    pub year: i32,
    pub month: u32,
    pub days_in_month: u32,
    pub holidays: Vec<u32>,
    pub students: Vec<StudentMonthSummary>,
    pub average_percentage: u32,
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, AppError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::Validation(format!("Invalid month: {}-{}", year, month)))
}

/// Last day of the month, found as the day before the first of the next one.
pub fn days_in_month(year: i32, month: u32) -> Result<u32, AppError> {
    first_of_month(year, month)?;
    let next_first = if month == 12 {
        first_of_month(year + 1, 1)?
    } else {
        first_of_month(year, month + 1)?
    };

    next_first
        .pred_opt()
        .map(|last| last.day())
        .ok_or_else(|| AppError::Internal("Date out of range".to_string()))
}

/// First and last date of the month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let first = first_of_month(year, month)?;
    let last = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month)?)
        .ok_or_else(|| AppError::Internal("Date out of range".to_string()))?;
    Ok((first, last))
}

/// `false` for a day that does not exist in the month.
pub fn is_sunday(year: i32, month: u32, day: u32) -> bool {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|date| date.weekday() == Weekday::Sun)
        .unwrap_or(false)
}

/// Days of the month treated as non-instructional.
///
/// A day qualifies when it is a Sunday, when it is in `declared`, or when any
/// single student already carries an `H` for it. That last rule lets one
/// stray entry mark the day as a holiday for the whole class.
pub fn holiday_days(
    year: i32,
    month: u32,
    students: &[RawStudentAttendance],
    declared: &BTreeSet<u32>,
) -> Result<BTreeSet<u32>, AppError> {
    let days = days_in_month(year, month)?;

    Ok((1..=days)
        .filter(|day| {
            is_sunday(year, month, *day)
                || declared.contains(day)
                || students
                    .iter()
                    .any(|s| s.marks.get(day) == Some(&AttendanceMark::Holiday))
        })
        .collect())
}

fn percentage(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) / f64::from(whole) * 100.0).round() as u32
}

fn summarise(
    student: RawStudentAttendance,
    days: u32,
    holidays: &BTreeSet<u32>,
) -> StudentMonthSummary {
    let mut grid = BTreeMap::new();
    let mut present = 0;
    let mut instructional_days = 0;

    for day in 1..=days {
        let mut mark = student
            .marks
            .get(&day)
            .copied()
            .unwrap_or(AttendanceMark::Unmarked);

        // Holidays only fill gaps; recorded P/A survive.
        if holidays.contains(&day) && mark == AttendanceMark::Unmarked {
            mark = AttendanceMark::Holiday;
        }

        match mark {
            AttendanceMark::Present => {
                present += 1;
                instructional_days += 1;
            }
            AttendanceMark::Absent => instructional_days += 1,
            AttendanceMark::Holiday | AttendanceMark::Unmarked => {}
        }

        grid.insert(day, mark);
    }

    StudentMonthSummary {
        student_id: student.student_id,
        roll_no: student.roll_no,
        name: student.name,
        days: grid,
        present,
        instructional_days,
        percentage: percentage(present, instructional_days),
    }
}

pub fn reconcile_month(
    year: i32,
    month: u32,
    students: Vec<RawStudentAttendance>,
    declared: &BTreeSet<u32>,
) -> Result<MonthlyAttendanceReport, AppError> {
    let days = days_in_month(year, month)?;
    let holidays = holiday_days(year, month, &students, declared)?;

    let summaries: Vec<StudentMonthSummary> = students
        .into_iter()
        .map(|student| summarise(student, days, &holidays))
        .collect();

    let average_percentage = if summaries.is_empty() {
        0
    } else {
        let total: u32 = summaries.iter().map(|s| s.percentage).sum();
        (f64::from(total) / summaries.len() as f64).round() as u32
    };

    Ok(MonthlyAttendanceReport {
        year,
        month,
        days_in_month: days,
        holidays: holidays.into_iter().collect(),
        students: summaries,
        average_percentage,
    })
}
