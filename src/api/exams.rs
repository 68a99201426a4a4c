use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::api::{CreatedResponse, parse_date};
use crate::auth::{Permission, User};
use crate::db::{
    create_test, delete_test, ensure_class_access, ensure_test_owner, get_marks_for_test,
    get_test, get_tests_for_class, save_marks,
};
use crate::models::{ExamType, Mark, MarkEntry, NewTest, Test};
use crate::validation::{
    AppErrorExt, ApiResult, JsonValidateExt, PermissionCheckExt, SUBJECT_PATTERN,
};

#[derive(Deserialize, Validate)]
pub struct CreateTestRequest {
    standard: String,
    class_name: String,
    #[validate(regex(path = *SUBJECT_PATTERN, message = "Subject must start with a letter and be at most 64 characters"))]
    subject: String,
    exam_type: ExamType,
    #[validate(length(min = 1, max = 100, message = "Test name must be 1-100 characters"))]
    name: String,
    #[validate(range(exclusive_min = 0.0, message = "Maximum marks must be greater than zero"))]
    max_marks: f64,
    test_date: String,
}

#[post("/tests", data = "<request>")]
pub async fn api_create_test(
    request: Json<CreateTestRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<CreatedResponse>>> {
    user.require_permission(Permission::CreateTests)
        .validate_custom()?;

    let validated = request.validate_custom()?;
    let test_date = parse_date("test_date", &validated.test_date).validate_custom()?;
    let subject = validated.subject.trim().to_string();

    ensure_class_access(
        db,
        &user,
        &validated.standard,
        &validated.class_name,
        Some(&subject),
    )
    .await
    .validate_custom()?;

    let new_test = NewTest {
        standard: validated.standard,
        class_name: validated.class_name,
        subject,
        exam_type: validated.exam_type,
        name: validated.name.trim().to_string(),
        max_marks: validated.max_marks,
        test_date,
    };

    let id = create_test(db, user.id, &new_test).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(CreatedResponse { id })))
}

/// Admins see every test for the class, teachers only the ones they set.
#[get("/tests?<standard>&<class_name>")]
pub async fn api_get_tests(
    standard: &str,
    class_name: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Test>>, Status> {
    user.require_permission(Permission::CreateTests)?;

    ensure_class_access(db, &user, standard, class_name, None).await?;

    let owner = if user.is_admin() { None } else { Some(user.id) };
    let tests = get_tests_for_class(db, standard, class_name, owner).await?;

    Ok(Json(tests))
}

#[delete("/tests/<id>")]
pub async fn api_delete_test(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    user.require_permission(Permission::CreateTests)?;

    let test = get_test(db, id).await?;
    ensure_test_owner(&user, &test)?;

    delete_test(db, id).await?;

    Ok(Status::NoContent)
}

#[derive(Deserialize, Validate)]
pub struct SaveMarksRequest {
    #[validate(length(min = 1, message = "At least one mark is required"))]
    marks: Vec<MarkEntry>,
}

#[derive(Serialize, Deserialize)]
pub struct SaveMarksResponse {
    pub saved: usize,
}

#[put("/tests/<id>/marks", data = "<request>")]
pub async fn api_save_marks(
    id: i64,
    request: Json<SaveMarksRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<SaveMarksResponse>> {
    user.require_permission(Permission::EnterMarks)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    let test = get_test(db, id).await.validate_custom()?;
    ensure_test_owner(&user, &test).validate_custom()?;

    let saved = save_marks(db, &test, &validated.marks)
        .await
        .validate_custom()?;

    Ok(Json(SaveMarksResponse { saved }))
}

#[get("/tests/<id>/marks")]
pub async fn api_get_marks(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Mark>>, Status> {
    user.require_permission(Permission::EnterMarks)?;

    let test = get_test(db, id).await?;
    ensure_test_owner(&user, &test)?;

    let marks = get_marks_for_test(db, id).await?;

    Ok(Json(marks))
}
