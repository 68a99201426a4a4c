use chrono::{Datelike, NaiveDate};
use sqlx::{Pool, Sqlite};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{error, info, instrument};

use crate::db::{get_holidays_in_month, get_students_in_class};
use crate::error::AppError;
use crate::models::{AttendanceEntry, AttendanceSheet, DbAttendanceRow};
use crate::reconciler::{
    AttendanceMark, MonthlyAttendanceReport, RawStudentAttendance, days_in_month, month_bounds,
    reconcile_month,
};
use crate::standards::validate_class;

/// Stores one day's attendance for a class.
///
/// The header row is upserted and its records replaced inside a single
/// transaction, so an interrupted request never leaves half a sheet behind.
/// Unmarked entries are not stored.
#[instrument(skip(pool, entries), fields(entries = entries.len()))]
pub async fn save_attendance(
    pool: &Pool<Sqlite>,
    date: NaiveDate,
    standard: &str,
    class_name: &str,
    entries: &[AttendanceEntry],
    marked_by: i64,
) -> Result<i64, AppError> {
    info!("Saving attendance");

    validate_class(standard, class_name)?;

    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.student_id) {
            return Err(AppError::Validation(format!(
                "Student {} appears more than once",
                entry.student_id
            )));
        }
    }

    let mut tx = pool.begin().await?;

    let members: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM students WHERE standard = ? AND class_name = ?")
            .bind(standard)
            .bind(class_name)
            .fetch_all(&mut *tx)
            .await?;
    let members: HashSet<i64> = members.into_iter().map(|(id,)| id).collect();

    if let Some(stranger) = entries.iter().find(|e| !members.contains(&e.student_id)) {
        return Err(AppError::Validation(format!(
            "Student {} is not in standard {} class {}",
            stranger.student_id, standard, class_name
        )));
    }

    let (attendance_id,): (i64,) = sqlx::query_as(
        "INSERT INTO attendance (date, standard, class_name, marked_by)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (date, standard, class_name)
         DO UPDATE SET marked_by = excluded.marked_by, updated_at = CURRENT_TIMESTAMP
         RETURNING id",
    )
    .bind(date)
    .bind(standard)
    .bind(class_name)
    .bind(marked_by)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM attendance_records WHERE attendance_id = ?")
        .bind(attendance_id)
        .execute(&mut *tx)
        .await?;

    for entry in entries
        .iter()
        .filter(|e| e.status != AttendanceMark::Unmarked)
    {
        sqlx::query(
            "INSERT INTO attendance_records (attendance_id, student_id, status) VALUES (?, ?, ?)",
        )
        .bind(attendance_id)
        .bind(entry.student_id)
        .bind(entry.status.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(attendance_id)
}

#[instrument]
pub async fn get_attendance_sheet(
    pool: &Pool<Sqlite>,
    date: NaiveDate,
    standard: &str,
    class_name: &str,
) -> Result<AttendanceSheet, AppError> {
    info!("Getting attendance sheet");

    let header: Option<(i64, Option<i64>)> = sqlx::query_as(
        "SELECT id, marked_by FROM attendance WHERE date = ? AND standard = ? AND class_name = ?",
    )
    .bind(date)
    .bind(standard)
    .bind(class_name)
    .fetch_optional(pool)
    .await?;

    let Some((id, marked_by)) = header else {
        return Err(AppError::NotFound(format!(
            "No attendance for standard {} class {} on {}",
            standard, class_name, date
        )));
    };

    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT student_id, status FROM attendance_records WHERE attendance_id = ? ORDER BY student_id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(AttendanceSheet {
        id,
        date,
        standard: standard.to_string(),
        class_name: class_name.to_string(),
        marked_by,
        records: rows
            .into_iter()
            .map(|(student_id, status)| AttendanceEntry {
                student_id,
                status: AttendanceMark::parse(&status),
            })
            .collect(),
    })
}

/// Raw marks for every active student of a class across one month, keyed by
/// day of month. Days without a record are simply absent from the map.
#[instrument]
pub async fn fetch_monthly_attendance(
    pool: &Pool<Sqlite>,
    standard: &str,
    class_name: &str,
    year: i32,
    month: u32,
) -> Result<Vec<RawStudentAttendance>, AppError> {
    info!("Fetching monthly attendance");

    let (first, last) = month_bounds(year, month)?;

    let students = get_students_in_class(pool, standard, class_name, false).await?;

    let rows = sqlx::query_as::<_, DbAttendanceRow>(
        "SELECT r.student_id, a.date, r.status
         FROM attendance_records r
         JOIN attendance a ON a.id = r.attendance_id
         WHERE a.standard = ? AND a.class_name = ? AND a.date BETWEEN ? AND ?",
    )
    .bind(standard)
    .bind(class_name)
    .bind(first)
    .bind(last)
    .fetch_all(pool)
    .await?;

    let mut marks_by_student: HashMap<i64, BTreeMap<u32, AttendanceMark>> = HashMap::new();
    for row in rows {
        if let (Some(student_id), Some(date), Some(status)) = (row.student_id, row.date, row.status)
        {
            marks_by_student
                .entry(student_id)
                .or_default()
                .insert(date.day(), AttendanceMark::parse(&status));
        }
    }

    Ok(students
        .into_iter()
        .map(|student| RawStudentAttendance {
            marks: marks_by_student.remove(&student.id).unwrap_or_default(),
            student_id: student.id,
            roll_no: student.roll_no,
            name: student.name,
        })
        .collect())
}

/// Builds the reconciled monthly report for a class. Any failure while
/// loading the data is reported as a single generic error.
#[instrument]
pub async fn monthly_report(
    pool: &Pool<Sqlite>,
    standard: &str,
    class_name: &str,
    year: i32,
    month: u32,
) -> Result<MonthlyAttendanceReport, AppError> {
    validate_class(standard, class_name)?;
    days_in_month(year, month)?;

    let loaded = async {
        let raw = fetch_monthly_attendance(pool, standard, class_name, year, month).await?;
        let declared: BTreeSet<u32> = get_holidays_in_month(pool, year, month)
            .await?
            .into_iter()
            .map(|holiday| holiday.date.day())
            .collect();
        Ok::<_, AppError>((raw, declared))
    }
    .await;

    let (raw, declared) = match loaded {
        Ok(data) => data,
        Err(e) => {
            error!(error = %e, "Loading attendance failed");
            return Err(AppError::Internal("Failed to fetch attendance".to_string()));
        }
    };

    reconcile_month(year, month, raw, &declared)
}
