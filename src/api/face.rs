use std::sync::Arc;

use rocket::State;
use rocket::http::{CookieJar, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};
use validator::Validate;

use crate::api::{LoginResponse, UserData};
use crate::auth::{Permission, User, start_session};
use crate::db::{find_user_by_username, get_user, set_face_enrolled};
use crate::env::AppConfig;
use crate::face::{FaceVerifier, LivenessChallenge};
use crate::validation::{
    AppErrorExt, ApiResult, JsonValidateExt, PermissionCheckExt, ValidationResponse,
};

const FACE_LOGIN_FAILED: &str = "Face verification failed";

fn face_login_rejected() -> Custom<Json<ValidationResponse>> {
    Custom(
        Status::Unauthorized,
        Json(ValidationResponse::with_error("face", FACE_LOGIN_FAILED)),
    )
}

#[get("/face/challenge")]
pub async fn api_face_challenge(
    verifier: &State<Arc<dyn FaceVerifier>>,
) -> ApiResult<Json<LivenessChallenge>> {
    let challenge = verifier.get_challenge().await.validate_custom()?;

    Ok(Json(challenge))
}

#[derive(Deserialize, Validate)]
pub struct FaceLoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(length(min = 1, message = "Challenge id is required"))]
    challenge_id: String,
    #[validate(length(min = 1, message = "At least one liveness frame is required"))]
    frames: Vec<String>,
    #[validate(length(min = 1, message = "A face image is required"))]
    image: String,
}

/// Signs a user in once the face service confirms liveness and matches the
/// face to the account being claimed.
#[post("/face/login", data = "<request>")]
pub async fn api_face_login(
    request: Json<FaceLoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    verifier: &State<Arc<dyn FaceVerifier>>,
) -> ApiResult<Json<LoginResponse>> {
    let validated = request.validate_custom()?;

    let user = match find_user_by_username(db, &validated.username)
        .await
        .validate_custom()?
    {
        Some(user) if !user.archived && user.face_enrolled => user,
        _ => {
            warn!(username = %validated.username, "Face login for unknown or unenrolled account");
            return Err(face_login_rejected());
        }
    };

    let liveness = verifier
        .verify_liveness(&validated.challenge_id, &validated.frames)
        .await
        .validate_custom()?;
    if !liveness.passed {
        warn!(username = %user.username, score = liveness.score, "Liveness check failed");
        return Err(face_login_rejected());
    }

    let face = verifier
        .verify_face(&validated.challenge_id, &validated.image)
        .await
        .validate_custom()?;
    let expected_subject = user.id.to_string();
    if !face.matched || face.subject_id.as_deref() != Some(expected_subject.as_str()) {
        warn!(username = %user.username, confidence = face.confidence, "Face did not match account");
        return Err(face_login_rejected());
    }

    start_session(db, cookies, &user, config.session_hours)
        .await
        .validate_custom()?;

    info!(username = %user.username, "User signed in by face");

    Ok(Json(LoginResponse {
        success: true,
        user: Some(UserData::from(user)),
        error: None,
    }))
}

#[derive(Deserialize, Validate)]
pub struct EnrollFaceRequest {
    #[validate(length(min = 1, message = "A face image is required"))]
    image: String,
}

#[derive(Serialize, Deserialize)]
pub struct EnrollFaceResponse {
    pub user: UserData,
}

#[post("/admin/users/<id>/face", data = "<request>")]
pub async fn api_enroll_face(
    id: i64,
    request: Json<EnrollFaceRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    verifier: &State<Arc<dyn FaceVerifier>>,
) -> ApiResult<Json<EnrollFaceResponse>> {
    user.require_permission(Permission::EnrollFaces)
        .validate_custom()?;

    let validated = request.validate_custom()?;
    let target = get_user(db, id).await.validate_custom()?;

    verifier
        .enroll_face(&target.id.to_string(), &validated.image)
        .await
        .validate_custom()?;

    set_face_enrolled(db, target.id, true)
        .await
        .validate_custom()?;

    let updated = get_user(db, target.id).await.validate_custom()?;

    Ok(Json(EnrollFaceResponse {
        user: UserData::from(updated),
    }))
}
