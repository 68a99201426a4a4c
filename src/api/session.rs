use rocket::State;
use rocket::http::{CookieJar, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, SESSION_COOKIE, User, clear_session_cookies, start_session};
use crate::db::{
    authenticate_user, invalidate_session, update_user_display_name, update_user_password,
};
use crate::env::AppConfig;
use crate::validation::{
    AppErrorExt, ApiResult, JsonValidateExt, PermissionCheckExt, ValidationResponse,
};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub archived: bool,
    pub face_enrolled: bool,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            role: user.role.to_string(),
            username: user.username,
            display_name: user.display_name,
            archived: user.archived,
            face_enrolled: user.face_enrolled,
        }
    }
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<Json<LoginResponse>> {
    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.username, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            start_session(db, cookies, &user, config.session_hours)
                .await
                .validate_custom()?;

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid username or password".to_string()),
        })),
    }
}

#[get("/me")]
pub async fn api_me(user: User) -> Result<Json<UserData>, Status> {
    user.require_permission(Permission::ViewOwnProfile)?;

    Ok(Json(UserData::from(user)))
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[post("/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Status {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(e) = invalidate_session(db, &token).await {
            e.log_and_record("Logout");
        }
    }

    clear_session_cookies(cookies);

    Status::Ok
}

#[derive(Deserialize, Validate)]
pub struct ProfileUpdateRequest {
    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    display_name: String,
}

#[put("/profile", data = "<profile>")]
pub async fn api_update_profile(
    profile: Json<ProfileUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_permission(Permission::EditOwnProfile)
        .validate_custom()?;

    let validated = profile.validate_custom()?;

    update_user_display_name(db, user.id, &validated.display_name)
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

#[derive(Deserialize, Validate)]
pub struct PasswordChangeRequest {
    current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    new_password: String,
}

#[post("/change-password", data = "<password>")]
pub async fn api_change_password(
    password: Json<PasswordChangeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    let validated = password.validate_custom()?;

    let is_valid = authenticate_user(db, &user.username, &validated.current_password)
        .await
        .validate_custom()?;

    match is_valid {
        Some(_) => {
            update_user_password(db, user.id, &validated.new_password)
                .await
                .validate_custom()?;

            Ok(Status::Ok)
        }
        _ => Err(Custom(
            Status::Unauthorized,
            Json(ValidationResponse::with_error(
                "current_password",
                "Current password is incorrect",
            )),
        )),
    }
}
