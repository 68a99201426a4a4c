use sqlx::{Pool, Sqlite};
use std::collections::HashSet;
use tracing::{info, instrument, warn};

use crate::auth::User;
use crate::error::AppError;
use crate::models::{DbMark, DbTest, Mark, MarkEntry, NewTest, Test};
use crate::standards::validate_class;

const TEST_COLUMNS: &str =
    "id, teacher_id, standard, class_name, subject, exam_type, name, max_marks, test_date";

#[instrument(skip(pool))]
pub async fn create_test(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
    test: &NewTest,
) -> Result<i64, AppError> {
    info!("Creating test");

    validate_class(&test.standard, &test.class_name)?;

    if !(test.max_marks > 0.0) {
        return Err(AppError::Validation(
            "Maximum marks must be greater than zero".to_string(),
        ));
    }

    let res = sqlx::query(
        "INSERT INTO tests (teacher_id, standard, class_name, subject, exam_type, name, max_marks, test_date)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(teacher_id)
    .bind(&test.standard)
    .bind(&test.class_name)
    .bind(&test.subject)
    .bind(test.exam_type.as_str())
    .bind(&test.name)
    .bind(test.max_marks)
    .bind(test.test_date)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_test(pool: &Pool<Sqlite>, id: i64) -> Result<Test, AppError> {
    let row = sqlx::query_as::<_, DbTest>(&format!(
        "SELECT {} FROM tests WHERE id = ?",
        TEST_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(test) => Ok(Test::from(test)),
        _ => Err(AppError::NotFound(format!("Test {} not found", id))),
    }
}

/// Tests for a class, optionally restricted to one teacher's.
#[instrument]
pub async fn get_tests_for_class(
    pool: &Pool<Sqlite>,
    standard: &str,
    class_name: &str,
    teacher_id: Option<i64>,
) -> Result<Vec<Test>, AppError> {
    info!("Getting tests for class");
    let rows = match teacher_id {
        Some(teacher_id) => {
            sqlx::query_as::<_, DbTest>(&format!(
                "SELECT {} FROM tests WHERE standard = ? AND class_name = ? AND teacher_id = ?
                 ORDER BY test_date DESC, id DESC",
                TEST_COLUMNS
            ))
            .bind(standard)
            .bind(class_name)
            .bind(teacher_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, DbTest>(&format!(
                "SELECT {} FROM tests WHERE standard = ? AND class_name = ?
                 ORDER BY test_date DESC, id DESC",
                TEST_COLUMNS
            ))
            .bind(standard)
            .bind(class_name)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows.into_iter().map(Test::from).collect())
}

/// Only the teacher who set a test, or an admin, may change it.
pub fn ensure_test_owner(user: &User, test: &Test) -> Result<(), AppError> {
    if user.is_admin() || test.teacher_id == user.id {
        return Ok(());
    }

    warn!(username = %user.username, test_id = test.id, "Access to another teacher's test");
    Err(AppError::Authorization(format!(
        "test {} belongs to another teacher",
        test.id
    )))
}

#[instrument]
pub async fn delete_test(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting test");
    let result = sqlx::query("DELETE FROM tests WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Test {} not found", id)));
    }

    Ok(())
}

/// Upserts a batch of marks for one test in a single transaction. Every
/// student must belong to the test's class and every score must lie within
/// `0..=max_marks`, otherwise nothing is written.
#[instrument(skip(pool, test, entries), fields(test_id = test.id, entries = entries.len()))]
pub async fn save_marks(
    pool: &Pool<Sqlite>,
    test: &Test,
    entries: &[MarkEntry],
) -> Result<usize, AppError> {
    info!("Saving marks");

    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.student_id) {
            return Err(AppError::Validation(format!(
                "Student {} appears more than once",
                entry.student_id
            )));
        }
        if !(0.0..=test.max_marks).contains(&entry.score) {
            return Err(AppError::Validation(format!(
                "Score {} for student {} must be between 0 and {}",
                entry.score, entry.student_id, test.max_marks
            )));
        }
    }

    let mut tx = pool.begin().await?;

    let members: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM students WHERE standard = ? AND class_name = ?")
            .bind(&test.standard)
            .bind(&test.class_name)
            .fetch_all(&mut *tx)
            .await?;
    let members: HashSet<i64> = members.into_iter().map(|(id,)| id).collect();

    if let Some(stranger) = entries.iter().find(|e| !members.contains(&e.student_id)) {
        return Err(AppError::Validation(format!(
            "Student {} is not in standard {} class {}",
            stranger.student_id, test.standard, test.class_name
        )));
    }

    for entry in entries {
        sqlx::query(
            "INSERT INTO marks (student_id, test_id, score) VALUES (?, ?, ?)
             ON CONFLICT (student_id, test_id)
             DO UPDATE SET score = excluded.score, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(entry.student_id)
        .bind(test.id)
        .bind(entry.score)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(entries.len())
}

#[instrument]
pub async fn get_marks_for_test(pool: &Pool<Sqlite>, test_id: i64) -> Result<Vec<Mark>, AppError> {
    info!("Getting marks for test");
    let rows = sqlx::query_as::<_, DbMark>(
        "SELECT m.id, m.student_id, s.name AS student_name, s.roll_no, m.test_id, m.score
         FROM marks m
         JOIN students s ON s.id = m.student_id
         WHERE m.test_id = ?
         ORDER BY s.roll_no",
    )
    .bind(test_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Mark::from).collect())
}
