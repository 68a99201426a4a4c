use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{
    create_assignment, delete_assignment, get_all_assignments, get_assignments_for_teacher,
};
use crate::models::TeacherAssignment;
use crate::validation::{
    AppErrorExt, ApiResult, JsonValidateExt, PermissionCheckExt, SUBJECT_PATTERN,
};

#[derive(Deserialize, Validate)]
pub struct CreateAssignmentRequest {
    teacher_id: i64,
    standard: String,
    class_name: String,
    #[validate(regex(path = *SUBJECT_PATTERN, message = "Subject must start with a letter and be at most 64 characters"))]
    subject: String,
    #[serde(default)]
    is_class_teacher: bool,
}

#[derive(Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[post("/assignments", data = "<request>")]
pub async fn api_create_assignment(
    request: Json<CreateAssignmentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<CreatedResponse>>> {
    user.require_permission(Permission::ManageAssignments)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    let id = create_assignment(
        db,
        validated.teacher_id,
        &validated.standard,
        &validated.class_name,
        validated.subject.trim(),
        validated.is_class_teacher,
    )
    .await
    .validate_custom()?;

    Ok(Custom(Status::Created, Json(CreatedResponse { id })))
}

#[get("/assignments?<teacher_id>")]
pub async fn api_get_assignments(
    teacher_id: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<TeacherAssignment>>, Status> {
    user.require_permission(Permission::ManageAssignments)?;

    let assignments = match teacher_id {
        Some(teacher_id) => get_assignments_for_teacher(db, teacher_id).await?,
        None => get_all_assignments(db).await?,
    };

    Ok(Json(assignments))
}

#[get("/me/assignments")]
pub async fn api_get_my_assignments(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<TeacherAssignment>>, Status> {
    let assignments = get_assignments_for_teacher(db, user.id).await?;

    Ok(Json(assignments))
}

#[delete("/assignments/<id>")]
pub async fn api_delete_assignment(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    user.require_permission(Permission::ManageAssignments)?;

    delete_assignment(db, id).await?;

    Ok(Status::NoContent)
}
