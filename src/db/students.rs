use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::allocator::{enrollment_number, needs_new_enrollment, resolve_roll_number};
use crate::error::{AppError, is_unique_violation};
use crate::models::{DbStudent, NewStudent, Student, StudentStatus, StudentUpdate};
use crate::standards::validate_class;

const STUDENT_COLUMNS: &str = "id, gr_no, enrollment_no, roll_no, name, standard, class_name, status, created_at, updated_at";

#[instrument]
pub async fn get_student(pool: &Pool<Sqlite>, id: i64) -> Result<Student, AppError> {
    info!("Fetching student by ID");
    let row = sqlx::query_as::<_, DbStudent>(&format!(
        "SELECT {} FROM students WHERE id = ?",
        STUDENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(student) => Ok(Student::from(student)),
        _ => Err(AppError::NotFound(format!("Student with id {} not found", id))),
    }
}

#[instrument]
pub async fn get_students_in_class(
    pool: &Pool<Sqlite>,
    standard: &str,
    class_name: &str,
    include_inactive: bool,
) -> Result<Vec<Student>, AppError> {
    info!("Getting students in class");
    let query = if include_inactive {
        format!(
            "SELECT {} FROM students WHERE standard = ? AND class_name = ? ORDER BY roll_no",
            STUDENT_COLUMNS
        )
    } else {
        format!(
            "SELECT {} FROM students WHERE standard = ? AND class_name = ? AND status = 'ACTIVE' ORDER BY roll_no",
            STUDENT_COLUMNS
        )
    };

    let rows = sqlx::query_as::<_, DbStudent>(&query)
        .bind(standard)
        .bind(class_name)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Student::from).collect())
}

#[instrument]
pub async fn get_all_students(
    pool: &Pool<Sqlite>,
    include_inactive: bool,
) -> Result<Vec<Student>, AppError> {
    info!("Getting all students");
    let query = if include_inactive {
        format!(
            "SELECT {} FROM students ORDER BY standard, class_name, roll_no",
            STUDENT_COLUMNS
        )
    } else {
        format!(
            "SELECT {} FROM students WHERE status = 'ACTIVE' ORDER BY standard, class_name, roll_no",
            STUDENT_COLUMNS
        )
    };

    let rows = sqlx::query_as::<_, DbStudent>(&query).fetch_all(pool).await?;

    Ok(rows.into_iter().map(Student::from).collect())
}

/// Roll numbers taken in a class by any student other than `exclude_id`,
/// highest first.
#[instrument]
pub async fn get_roll_numbers(
    pool: &Pool<Sqlite>,
    standard: &str,
    class_name: &str,
    exclude_id: Option<i64>,
) -> Result<Vec<i64>, AppError> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT roll_no FROM students
         WHERE standard = ? AND class_name = ? AND id != ?
         ORDER BY roll_no DESC",
    )
    .bind(standard)
    .bind(class_name)
    .bind(exclude_id.unwrap_or(-1))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(roll_no,)| roll_no).collect())
}

async fn gr_no_taken(
    pool: &Pool<Sqlite>,
    gr_no: &str,
    exclude_id: Option<i64>,
) -> Result<bool, AppError> {
    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM students WHERE gr_no = ? AND id != ?")
        .bind(gr_no)
        .bind(exclude_id.unwrap_or(-1))
        .fetch_optional(pool)
        .await?;

    Ok(existing.is_some())
}

async fn enrollment_no_taken(
    pool: &Pool<Sqlite>,
    enrollment_no: &str,
    exclude_id: Option<i64>,
) -> Result<bool, AppError> {
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM students WHERE enrollment_no = ? AND id != ?")
            .bind(enrollment_no)
            .bind(exclude_id.unwrap_or(-1))
            .fetch_optional(pool)
            .await?;

    Ok(existing.is_some())
}

fn enrollment_collision(enrollment_no: &str) -> AppError {
    AppError::Validation(format!(
        "Enrollment number {} already exists",
        enrollment_no
    ))
}

/// Logs whether a rejected write lost a race on a unique key before it is
/// collapsed into the generic failure.
fn record_write_failure(err: sqlx::Error, context: &str) -> AppError {
    if is_unique_violation(&err) {
        warn!(error = %err, "{}: unique constraint rejected a concurrent write", context);
    }
    AppError::from(err).generic_failure(context)
}

/// Creates a student, allocating a roll number when none is supplied and
/// deriving the enrollment number from `admission_year`.
///
/// Roll numbers are per class but the enrollment number only encodes the
/// standard, so two classes of one standard holding the same roll derive the
/// same enrollment number. That is reported as a validation error naming the
/// number before anything is written.
///
/// Allocation reads the class and then inserts without a lock. When two
/// creations race, the unique constraint rejects the second one and the
/// caller gets the generic failure. Nothing is retried.
#[instrument(skip(pool))]
pub async fn create_student(
    pool: &Pool<Sqlite>,
    student: &NewStudent,
    admission_year: i32,
) -> Result<Student, AppError> {
    info!("Creating student");

    validate_class(&student.standard, &student.class_name)?;

    if gr_no_taken(pool, &student.gr_no, None).await? {
        return Err(AppError::Validation(format!(
            "GR number {} already exists",
            student.gr_no
        )));
    }

    let taken = get_roll_numbers(pool, &student.standard, &student.class_name, None).await?;
    let roll_no = resolve_roll_number(student.roll_no, &taken)?;
    let enrollment_no = enrollment_number(admission_year, &student.standard, roll_no);
    if enrollment_no_taken(pool, &enrollment_no, None).await? {
        warn!(enrollment_no = %enrollment_no, "Derived enrollment number collides");
        return Err(enrollment_collision(&enrollment_no));
    }

    let res = sqlx::query(
        "INSERT INTO students (gr_no, enrollment_no, roll_no, name, standard, class_name, status)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&student.gr_no)
    .bind(&enrollment_no)
    .bind(roll_no)
    .bind(&student.name)
    .bind(&student.standard)
    .bind(&student.class_name)
    .bind(StudentStatus::Active.as_str())
    .execute(pool)
    .await
    .map_err(|e| record_write_failure(e, "Failed to create student"))?;

    info!(roll_no, enrollment_no = %enrollment_no, "Student created");

    get_student(pool, res.last_insert_rowid()).await
}

/// Applies an edit or transfer.
///
/// The enrollment number is regenerated with `current_year` only when the
/// standard or roll number changes, and must then be unique among the other
/// students. A class-only move keeps it.
#[instrument(skip(pool))]
pub async fn update_student(
    pool: &Pool<Sqlite>,
    id: i64,
    update: &StudentUpdate,
    current_year: i32,
) -> Result<Student, AppError> {
    info!("Updating student");

    let existing = get_student(pool, id).await?;

    let standard = update.standard.clone().unwrap_or(existing.standard.clone());
    let class_name = update
        .class_name
        .clone()
        .unwrap_or(existing.class_name.clone());
    let roll_no = update.roll_no.unwrap_or(existing.roll_no);
    let gr_no = update.gr_no.clone().unwrap_or(existing.gr_no.clone());
    let name = update.name.clone().unwrap_or(existing.name.clone());
    let status = update.status.unwrap_or(existing.status);

    validate_class(&standard, &class_name)?;

    if gr_no != existing.gr_no && gr_no_taken(pool, &gr_no, Some(id)).await? {
        return Err(AppError::Validation(format!(
            "GR number {} already exists",
            gr_no
        )));
    }

    let placement_changed = standard != existing.standard
        || class_name != existing.class_name
        || roll_no != existing.roll_no;
    if placement_changed {
        let taken = get_roll_numbers(pool, &standard, &class_name, Some(id)).await?;
        resolve_roll_number(Some(roll_no), &taken)?;
    }

    let enrollment_no = if needs_new_enrollment(&existing.standard, existing.roll_no, &standard, roll_no)
    {
        let regenerated = enrollment_number(current_year, &standard, roll_no);
        if enrollment_no_taken(pool, &regenerated, Some(id)).await? {
            warn!(enrollment_no = %regenerated, "Regenerated enrollment number collides");
            return Err(enrollment_collision(&regenerated));
        }
        regenerated
    } else {
        existing.enrollment_no.clone()
    };

    sqlx::query(
        "UPDATE students
         SET gr_no = ?, enrollment_no = ?, roll_no = ?, name = ?, standard = ?, class_name = ?,
             status = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(&gr_no)
    .bind(&enrollment_no)
    .bind(roll_no)
    .bind(&name)
    .bind(&standard)
    .bind(&class_name)
    .bind(status.as_str())
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| record_write_failure(e, "Failed to update student"))?;

    get_student(pool, id).await
}

#[instrument]
pub async fn delete_student(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting student");
    let result = sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Student with id {} not found", id)));
    }

    Ok(())
}
