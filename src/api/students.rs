use chrono::{Datelike, Utc};
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{
    create_student, delete_student, ensure_class_access, get_all_students, get_student,
    get_students_in_class, update_student,
};
use crate::models::{NewStudent, Student, StudentStatus, StudentUpdate};
use crate::standards::{STANDARDS, StandardClasses};
use crate::validation::{
    AppErrorExt, ApiResult, GR_NO_PATTERN, JsonValidateExt, PermissionCheckExt,
};

#[get("/standards")]
pub async fn api_get_standards(_user: User) -> Json<Vec<StandardClasses>> {
    Json(STANDARDS.clone())
}

#[derive(Deserialize, Validate)]
pub struct CreateStudentRequest {
    #[validate(regex(path = *GR_NO_PATTERN, message = "GR number may only contain letters, digits, '/' and '-'"))]
    gr_no: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    name: String,
    standard: String,
    class_name: String,
    #[validate(range(min = 1, message = "Roll number must be a positive integer"))]
    roll_no: Option<i64>,
}

#[post("/students", data = "<request>")]
pub async fn api_create_student(
    request: Json<CreateStudentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<Student>>> {
    user.require_permission(Permission::ManageStudents)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    let new_student = NewStudent {
        gr_no: validated.gr_no.trim().to_string(),
        name: validated.name.trim().to_string(),
        standard: validated.standard,
        class_name: validated.class_name,
        roll_no: validated.roll_no,
    };

    let student = create_student(db, &new_student, Utc::now().year())
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(student)))
}

#[derive(FromForm)]
pub struct StudentsQueryParams {
    standard: Option<String>,
    class_name: Option<String>,
    include_inactive: Option<bool>,
}

#[get("/students?<params..>")]
pub async fn api_get_students(
    params: StudentsQueryParams,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Student>>> {
    user.require_permission(Permission::ViewAssignedStudents)
        .validate_custom()?;

    let include_inactive = params.include_inactive.unwrap_or(false);

    let students = match (params.standard.as_deref(), params.class_name.as_deref()) {
        (Some(standard), Some(class_name)) => {
            ensure_class_access(db, &user, standard, class_name, None)
                .await
                .validate_custom()?;
            get_students_in_class(db, standard, class_name, include_inactive)
                .await
                .validate_custom()?
        }
        _ => {
            // Listing across classes is an admin view.
            user.require_permission(Permission::ViewAllClasses)
                .validate_custom()?;
            get_all_students(db, include_inactive)
                .await
                .validate_custom()?
        }
    };

    Ok(Json(students))
}

#[get("/students/<id>")]
pub async fn api_get_student(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Student>, Status> {
    user.require_permission(Permission::ViewAssignedStudents)?;

    let student = get_student(db, id).await?;
    ensure_class_access(db, &user, &student.standard, &student.class_name, None).await?;

    Ok(Json(student))
}

#[derive(Deserialize, Validate)]
pub struct UpdateStudentRequest {
    #[validate(regex(path = *GR_NO_PATTERN, message = "GR number may only contain letters, digits, '/' and '-'"))]
    gr_no: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    name: Option<String>,
    standard: Option<String>,
    class_name: Option<String>,
    #[validate(range(min = 1, message = "Roll number must be a positive integer"))]
    roll_no: Option<i64>,
    status: Option<StudentStatus>,
}

#[put("/students/<id>", data = "<request>")]
pub async fn api_update_student(
    id: i64,
    request: Json<UpdateStudentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Student>> {
    user.require_permission(Permission::ManageStudents)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    let update = StudentUpdate {
        gr_no: validated.gr_no.map(|gr_no| gr_no.trim().to_string()),
        name: validated.name.map(|name| name.trim().to_string()),
        standard: validated.standard,
        class_name: validated.class_name,
        roll_no: validated.roll_no,
        status: validated.status,
    };

    let student = update_student(db, id, &update, Utc::now().year())
        .await
        .validate_custom()?;

    Ok(Json(student))
}

#[delete("/students/<id>")]
pub async fn api_delete_student(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    user.require_permission(Permission::ManageStudents)?;

    delete_student(db, id).await?;

    Ok(Status::NoContent)
}
