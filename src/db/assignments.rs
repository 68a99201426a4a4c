use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::auth::{Permission, Role, User};
use crate::db::get_user;
use crate::error::{AppError, is_unique_violation};
use crate::models::{DbTeacherAssignment, TeacherAssignment};
use crate::standards::validate_class;

const ASSIGNMENT_SELECT: &str = "SELECT a.id, a.teacher_id, u.display_name AS teacher_name, a.standard,
        a.class_name, a.subject, a.is_class_teacher
     FROM teacher_assignments a
     JOIN users u ON u.id = a.teacher_id";

#[instrument]
pub async fn create_assignment(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
    standard: &str,
    class_name: &str,
    subject: &str,
    is_class_teacher: bool,
) -> Result<i64, AppError> {
    info!("Creating teacher assignment");

    validate_class(standard, class_name)?;

    let teacher = get_user(pool, teacher_id).await?;
    if teacher.role == Role::Admin {
        return Err(AppError::Validation(
            "Assignments can only be given to teachers".to_string(),
        ));
    }

    let res = sqlx::query(
        "INSERT INTO teacher_assignments (teacher_id, standard, class_name, subject, is_class_teacher)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(teacher_id)
    .bind(standard)
    .bind(class_name)
    .bind(subject)
    .bind(is_class_teacher)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Validation(format!(
                "{} is already assigned {} for standard {} class {}",
                teacher.username, subject, standard, class_name
            ))
        } else {
            AppError::Database(e)
        }
    })?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn delete_assignment(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting teacher assignment");
    let result = sqlx::query("DELETE FROM teacher_assignments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Assignment {} not found", id)));
    }

    Ok(())
}

#[instrument]
pub async fn get_assignments_for_teacher(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
) -> Result<Vec<TeacherAssignment>, AppError> {
    info!("Getting assignments for teacher");
    let rows = sqlx::query_as::<_, DbTeacherAssignment>(&format!(
        "{} WHERE a.teacher_id = ? ORDER BY a.standard, a.class_name, a.subject",
        ASSIGNMENT_SELECT
    ))
    .bind(teacher_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TeacherAssignment::from).collect())
}

#[instrument]
pub async fn get_all_assignments(pool: &Pool<Sqlite>) -> Result<Vec<TeacherAssignment>, AppError> {
    info!("Getting all assignments");
    let rows = sqlx::query_as::<_, DbTeacherAssignment>(&format!(
        "{} ORDER BY a.standard, a.class_name, a.subject",
        ASSIGNMENT_SELECT
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TeacherAssignment::from).collect())
}

#[instrument]
pub async fn teacher_has_assignment(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
    standard: &str,
    class_name: &str,
    subject: Option<&str>,
) -> Result<bool, AppError> {
    let found: Option<(i64,)> = match subject {
        Some(subject) => {
            sqlx::query_as(
                "SELECT id FROM teacher_assignments
                 WHERE teacher_id = ? AND standard = ? AND class_name = ? AND subject = ?
                 LIMIT 1",
            )
            .bind(teacher_id)
            .bind(standard)
            .bind(class_name)
            .bind(subject)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT id FROM teacher_assignments
                 WHERE teacher_id = ? AND standard = ? AND class_name = ?
                 LIMIT 1",
            )
            .bind(teacher_id)
            .bind(standard)
            .bind(class_name)
            .fetch_optional(pool)
            .await?
        }
    };

    Ok(found.is_some())
}

/// Admins reach every class; everyone else only the classes they are
/// assigned to (for `subject`, when given).
#[instrument(skip(pool, user), fields(user_id = user.id))]
pub async fn ensure_class_access(
    pool: &Pool<Sqlite>,
    user: &User,
    standard: &str,
    class_name: &str,
    subject: Option<&str>,
) -> Result<(), AppError> {
    if user.has_permission(Permission::ViewAllClasses) {
        return Ok(());
    }

    if teacher_has_assignment(pool, user.id, standard, class_name, subject).await? {
        return Ok(());
    }

    warn!(
        username = %user.username,
        standard = %standard,
        class_name = %class_name,
        "Class access denied"
    );
    Err(AppError::Authorization(format!(
        "not assigned to standard {} class {}",
        standard, class_name
    )))
}
