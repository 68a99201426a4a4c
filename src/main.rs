#[macro_use]
extern crate rocket;

mod allocator;
mod api;
mod auth;
mod db;
mod env;
mod error;
mod face;
mod models;
mod reconciler;
mod standards;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::sync::{Arc, Mutex};

use api::{
    api_attendance_report, api_change_password, api_create_assignment, api_create_holiday,
    api_create_student, api_create_test, api_delete_assignment, api_delete_holiday,
    api_delete_student, api_delete_test, api_enroll_face, api_face_challenge, api_face_login,
    api_get_all_users, api_get_assignments, api_get_attendance, api_get_holidays,
    api_get_marks, api_get_my_assignments, api_get_standards, api_get_student,
    api_get_students, api_get_tests, api_login, api_logout, api_mark_attendance, api_me,
    api_me_unauthorized, api_register_user, api_save_marks, api_update_profile,
    api_update_student, api_update_user, health,
};
use auth::{forbidden_api, unauthorized_api};
use db::{clean_expired_sessions, ensure_initial_admin};
use env::{AppConfig, load_environment};
use error::AppError;
use face::{DisabledFaceVerifier, FaceVerifier};
use once_cell::sync::Lazy;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use telemetry::{OtelGuard, TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracing::{error, info};

pub static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

async fn prepare_database(config: &AppConfig) -> Result<SqlitePool, Error> {
    let pool = SqlitePool::connect(&config.database_url).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    if let Some(admin) = &config.initial_admin {
        if ensure_initial_admin(&pool, &admin.username, &admin.password).await? {
            info!(username = %admin.username, "Created initial admin account");
        }
    }

    Ok(pool)
}

fn spawn_session_cleanup(pool: SqlitePool, interval_secs: u64) {
    rocket::tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(interval_secs)).await;
        }
    });
}

#[launch]
async fn rocket() -> _ {
    if let Err(e) = load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    let guard = init_tracing();
    match TELEMETRY_GUARD.lock() {
        Ok(mut slot) => *slot = guard,
        Err(poisoned) => *poisoned.into_inner() = guard,
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            panic!("Invalid configuration: {}", e);
        }
    };

    let pool = match prepare_database(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to prepare database: {}", e);
            panic!("Database setup failed: {}", e);
        }
    };

    spawn_session_cleanup(pool.clone(), config.session_cleanup_secs);

    let face: Arc<dyn FaceVerifier> = Arc::new(DisabledFaceVerifier);

    init_rocket(pool, config, face).await
}

pub async fn init_rocket(
    pool: SqlitePool,
    config: AppConfig,
    face: Arc<dyn FaceVerifier>,
) -> Rocket<Build> {
    info!("Starting school admin");

    rocket::build()
        .manage(pool)
        .manage(config)
        .manage(face)
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_me,
                api_me_unauthorized,
                api_update_profile,
                api_change_password,
                api_register_user,
                api_get_all_users,
                api_update_user,
                api_get_standards,
                api_create_student,
                api_get_students,
                api_get_student,
                api_update_student,
                api_delete_student,
                api_create_assignment,
                api_get_assignments,
                api_get_my_assignments,
                api_delete_assignment,
                api_mark_attendance,
                api_get_attendance,
                api_attendance_report,
                api_create_test,
                api_get_tests,
                api_delete_test,
                api_save_marks,
                api_get_marks,
                api_create_holiday,
                api_get_holidays,
                api_delete_holiday,
                api_face_challenge,
                api_face_login,
                api_enroll_face,
            ],
        )
        .register("/api", catchers![unauthorized_api, forbidden_api])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Telemetry shutdown", |_| {
            Box::pin(async move {
                shutdown_telemetry();
            })
        }))
}
