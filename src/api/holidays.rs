use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::api::{CreatedResponse, parse_date};
use crate::auth::{Permission, User};
use crate::db::{create_holiday, delete_holiday, get_holidays_in_month};
use crate::models::Holiday;
use crate::validation::{AppErrorExt, ApiResult, JsonValidateExt, PermissionCheckExt};

#[derive(Deserialize, Validate)]
pub struct CreateHolidayRequest {
    date: String,
    #[validate(length(min = 1, max = 200, message = "Description must be 1-200 characters"))]
    description: String,
}

#[post("/holidays", data = "<request>")]
pub async fn api_create_holiday(
    request: Json<CreateHolidayRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<CreatedResponse>>> {
    user.require_permission(Permission::ManageHolidays)
        .validate_custom()?;

    let validated = request.validate_custom()?;
    let date = parse_date("date", &validated.date).validate_custom()?;

    let id = create_holiday(db, date, validated.description.trim())
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(CreatedResponse { id })))
}

#[get("/holidays?<year>&<month>")]
pub async fn api_get_holidays(
    year: i32,
    month: u32,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Holiday>>> {
    let holidays = get_holidays_in_month(db, year, month)
        .await
        .validate_custom()?;

    Ok(Json(holidays))
}

#[delete("/holidays/<id>")]
pub async fn api_delete_holiday(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    user.require_permission(Permission::ManageHolidays)?;

    delete_holiday(db, id).await?;

    Ok(Status::NoContent)
}
