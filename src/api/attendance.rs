use rocket::State;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::info;
use validator::Validate;

use crate::api::parse_date;
use crate::auth::{Permission, User};
use crate::db::{ensure_class_access, get_attendance_sheet, monthly_report, save_attendance};
use crate::models::{AttendanceEntry, AttendanceSheet};
use crate::reconciler::MonthlyAttendanceReport;
use crate::validation::{AppErrorExt, ApiResult, JsonValidateExt, PermissionCheckExt};

#[derive(Deserialize, Validate)]
pub struct MarkAttendanceRequest {
    date: String,
    standard: String,
    class_name: String,
    #[validate(length(min = 1, message = "At least one attendance record is required"))]
    records: Vec<AttendanceEntry>,
}

#[derive(Serialize, Deserialize)]
pub struct MarkAttendanceResponse {
    pub id: i64,
    pub recorded: usize,
}

/// Replaces the sheet for the given class and date.
#[post("/attendance", data = "<request>")]
pub async fn api_mark_attendance(
    request: Json<MarkAttendanceRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<MarkAttendanceResponse>> {
    user.require_permission(Permission::MarkAttendance)
        .validate_custom()?;

    let validated = request.validate_custom()?;
    let date = parse_date("date", &validated.date).validate_custom()?;

    ensure_class_access(db, &user, &validated.standard, &validated.class_name, None)
        .await
        .validate_custom()?;

    let id = save_attendance(
        db,
        date,
        &validated.standard,
        &validated.class_name,
        &validated.records,
        user.id,
    )
    .await
    .validate_custom()?;

    info!(attendance_id = id, "Attendance saved");

    let sheet = get_attendance_sheet(db, date, &validated.standard, &validated.class_name)
        .await
        .validate_custom()?;

    Ok(Json(MarkAttendanceResponse {
        id,
        recorded: sheet.records.len(),
    }))
}

#[get("/attendance?<date>&<standard>&<class_name>")]
pub async fn api_get_attendance(
    date: &str,
    standard: &str,
    class_name: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<AttendanceSheet>> {
    user.require_permission(Permission::ViewAttendance)
        .validate_custom()?;

    let date = parse_date("date", date).validate_custom()?;

    ensure_class_access(db, &user, standard, class_name, None)
        .await
        .validate_custom()?;

    let sheet = get_attendance_sheet(db, date, standard, class_name)
        .await
        .validate_custom()?;

    Ok(Json(sheet))
}

#[get("/attendance/report?<standard>&<class_name>&<year>&<month>")]
pub async fn api_attendance_report(
    standard: &str,
    class_name: &str,
    year: i32,
    month: u32,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<MonthlyAttendanceReport>> {
    user.require_permission(Permission::ViewAttendance)
        .validate_custom()?;

    ensure_class_access(db, &user, standard, class_name, None)
        .await
        .validate_custom()?;

    let report = monthly_report(db, standard, class_name, year, month)
        .await
        .validate_custom()?;

    Ok(Json(report))
}
