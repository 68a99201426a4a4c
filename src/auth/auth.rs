use chrono::Utc;
use rocket::Request;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::{Pool, Sqlite, SqlitePool};
use tracing::{instrument, warn};

use crate::db::{create_user_session, get_session_by_token, get_user};
use crate::error::AppError;

use super::{User, UserSession};

pub const SESSION_COOKIE: &str = "session_token";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");
        let _guard = auth_span.enter();

        let cookies = request.cookies();

        let token = cookies
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string());

        if let Some(token) = token {
            let db = match request.rocket().state::<SqlitePool>() {
                Some(pool) => pool,
                _ => {
                    tracing::error!("Database pool not found in managed state");
                    return Outcome::Error((Status::InternalServerError, ()));
                }
            };

            match get_session_by_token(db, &token).await {
                Ok(session) => {
                    if !session.is_valid() {
                        tracing::warn!("Session token expired");
                        return Outcome::Forward(Status::Unauthorized);
                    }

                    match get_user(db, session.user_id).await {
                        Ok(user) if user.archived => {
                            tracing::warn!(username = %user.username, "Archived user presented a session");
                            return Outcome::Forward(Status::Unauthorized);
                        }
                        Ok(user) => {
                            tracing::info!(username = %user.username, role = %user.role.as_str(), "User authenticated via session token");
                            return Outcome::Success(user);
                        }
                        Err(err) => {
                            tracing::error!(user_id = %session.user_id, error = ?err, "Failed to fetch user for valid session");
                            return Outcome::Error((Status::InternalServerError, ()));
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(error = ?err, "Invalid session token");
                    return Outcome::Forward(Status::Unauthorized);
                }
            }
        }

        Outcome::Forward(Status::Unauthorized)
    }
}

/// Persists a fresh session for `user` and sets the private cookies the
/// request guard reads back. Shared by password and face login.
#[instrument(skip(db, cookies, user), fields(user_id = user.id))]
pub async fn start_session(
    db: &Pool<Sqlite>,
    cookies: &CookieJar<'_>,
    user: &User,
    session_hours: i64,
) -> Result<(), AppError> {
    let token = UserSession::generate_token();
    let expires_at = Utc::now() + chrono::Duration::hours(session_hours);

    create_user_session(db, user.id, &token, expires_at.naive_utc()).await?;

    cookies.add_private(
        Cookie::build((SESSION_COOKIE, token))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::hours(session_hours)),
    );

    cookies.add_private(
        Cookie::build(("user_role", user.role.to_string()))
            .same_site(SameSite::Lax)
            .max_age(rocket::time::Duration::hours(session_hours)),
    );

    Ok(())
}

pub fn clear_session_cookies(cookies: &CookieJar<'_>) {
    cookies.remove_private(Cookie::build(SESSION_COOKIE));
    cookies.remove_private(Cookie::build("user_role"));
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    warn!("Unauthorized access attempt");
    let error_json = json!({
        "error": "Unauthorized",
        "message": "Authentication required"
    });

    Custom(Status::Unauthorized, Json(error_json))
}

#[catch(403)]
pub fn forbidden_api(_req: &Request) -> Custom<Json<Value>> {
    warn!("Forbidden access attempt");
    let error_json = json!({
        "error": "Forbidden",
        "message": "You don't have permission to perform this action"
    });

    Custom(Status::Forbidden, Json(error_json))
}
