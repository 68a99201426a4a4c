use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::api::UserData;
use crate::auth::{Permission, Role, User};
use crate::db::{
    create_user, get_all_users, get_user, invalidate_user_sessions, set_user_archived,
    update_user_display_name, update_user_password, update_user_role, update_username,
};
use crate::error::AppError;
use crate::validation::{
    AppErrorExt, ApiResult, JsonValidateExt, PermissionCheckExt, ToValidationResponse,
    ValidationResponse,
};

fn parse_role(role: &str) -> Result<Role, AppError> {
    Role::from_str(role).map_err(|e| AppError::Validation(e.to_string()))
}

#[derive(Deserialize, Validate)]
pub struct UserRegistrationRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    username: String,
    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    display_name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    role: String,
}

#[post("/register", data = "<registration>")]
pub async fn api_register_user(
    registration: Json<UserRegistrationRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<UserData>>> {
    user.require_permission(Permission::RegisterUsers)
        .validate_custom()?;

    let validated = registration.validate_custom()?;
    let role = parse_role(&validated.role).validate_custom()?;

    let id = match create_user(
        db,
        &validated.username,
        &validated.password,
        role,
        Some(&validated.display_name),
    )
    .await
    {
        Ok(id) => id,
        Err(AppError::Validation(msg)) => {
            return Err(Custom(
                Status::Conflict,
                Json(ValidationResponse::with_error("username", &msg)),
            ));
        }
        Err(e) => return Err(e.to_validation_response()),
    };

    let created = get_user(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(UserData::from(created))))
}

#[get("/admin/users")]
pub async fn api_get_all_users(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UserData>>, Status> {
    user.require_permission(Permission::EditUserRoles)?;

    let users = get_all_users(db).await?;

    Ok(Json(users.into_iter().map(UserData::from).collect()))
}

#[derive(Deserialize, Validate)]
pub struct UserUpdateRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    username: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    display_name: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: Option<String>,
    archived: Option<bool>,
    role: Option<String>,
}

#[put("/admin/users/<id>", data = "<update>")]
pub async fn api_update_user(
    id: i64,
    update: Json<UserUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<UserData>> {
    let update = update.validate_custom()?;

    if update.role.is_some() {
        user.require_all_permissions(&[Permission::EditUserCredentials, Permission::EditUserRoles])
            .validate_custom()?;
    } else {
        user.require_permission(Permission::EditUserCredentials)
            .validate_custom()?;
    }

    // Fail before any partial write when the target is missing.
    get_user(db, id).await.validate_custom()?;

    let role = update
        .role
        .as_deref()
        .map(parse_role)
        .transpose()
        .validate_custom()?;

    if let Some(username) = &update.username {
        update_username(db, id, username).await.validate_custom()?;
    }

    if let Some(display_name) = &update.display_name {
        update_user_display_name(db, id, display_name)
            .await
            .validate_custom()?;
    }

    if let Some(password) = &update.password {
        update_user_password(db, id, password)
            .await
            .validate_custom()?;
    }

    if let Some(role) = role {
        update_user_role(db, id, role).await.validate_custom()?;
    }

    if let Some(archived) = update.archived {
        set_user_archived(db, id, archived)
            .await
            .validate_custom()?;
        if archived {
            invalidate_user_sessions(db, id).await.validate_custom()?;
        }
    }

    let updated = get_user(db, id).await.validate_custom()?;

    Ok(Json(UserData::from(updated)))
}
