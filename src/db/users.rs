use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::auth::{DbUser, Role, User};
use crate::error::AppError;

const USER_COLUMNS: &str = "id, username, role, display_name, archived, face_enrolled";

#[derive(sqlx::FromRow)]
struct DbCredentials {
    id: i64,
    password: String,
}

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

/// Returns the user when the password matches and the account is not archived.
#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let credentials = sqlx::query_as::<_, DbCredentials>(
        "SELECT id, password FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    let Some(credentials) = credentials else {
        return Ok(None);
    };

    // A malformed stored hash is treated as a failed login.
    if !bcrypt::verify(password, &credentials.password).unwrap_or(false) {
        return Ok(None);
    }

    let user = get_user(pool, credentials.id).await?;
    if user.archived {
        warn!(username = %user.username, "Archived user attempted to log in");
        return Ok(None);
    }

    Ok(Some(user))
}

#[instrument(skip(pool, password))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    role: Role,
    display_name: Option<&str>,
) -> Result<i64, AppError> {
    info!("Creating new user");

    if find_user_by_username(pool, username).await?.is_some() {
        return Err(AppError::Validation(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query(
        "INSERT INTO users (username, password, role, display_name) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(hashed_password)
    .bind(role.as_str())
    .bind(display_name.unwrap_or(username))
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_all_users(pool: &Pool<Sqlite>) -> Result<Vec<User>, AppError> {
    info!("Getting all users");
    let rows = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users ORDER BY username",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

#[instrument]
pub async fn update_user_display_name(
    pool: &Pool<Sqlite>,
    user_id: i64,
    display_name: &str,
) -> Result<(), AppError> {
    info!("Updating user display name");
    sqlx::query("UPDATE users SET display_name = ? WHERE id = ?")
        .bind(display_name)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip_all, fields(user_id))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn update_username(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_username: &str,
) -> Result<(), AppError> {
    info!("Updating user username");
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = ? AND id != ?")
            .bind(new_username)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    if existing.is_some() {
        return Err(AppError::Validation("Username already exists".to_string()));
    }

    sqlx::query("UPDATE users SET username = ? WHERE id = ?")
        .bind(new_username)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn update_user_role(pool: &Pool<Sqlite>, user_id: i64, role: Role) -> Result<(), AppError> {
    info!("Updating user role");
    sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn set_user_archived(
    pool: &Pool<Sqlite>,
    user_id: i64,
    archive: bool,
) -> Result<bool, AppError> {
    info!("Toggling user archived status");

    sqlx::query("UPDATE users SET archived = ? WHERE id = ?")
        .bind(archive)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(archive)
}

#[instrument]
pub async fn set_face_enrolled(
    pool: &Pool<Sqlite>,
    user_id: i64,
    enrolled: bool,
) -> Result<(), AppError> {
    info!("Recording face enrollment");

    sqlx::query("UPDATE users SET face_enrolled = ? WHERE id = ?")
        .bind(enrolled)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Creates the first admin account when none exists yet. Returns whether a
/// user was created.
#[instrument(skip(pool, password))]
pub async fn ensure_initial_admin(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<bool, AppError> {
    let (admins,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(Role::Admin.as_str())
        .fetch_one(pool)
        .await?;

    if admins > 0 {
        return Ok(false);
    }

    info!(username = %username, "Bootstrapping initial admin account");
    create_user(pool, username, password, Role::Admin, Some("Administrator")).await?;

    Ok(true)
}
