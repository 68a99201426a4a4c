use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::{AppError, is_unique_violation};
use crate::models::{DbHoliday, Holiday};
use crate::reconciler::month_bounds;

#[instrument]
pub async fn create_holiday(
    pool: &Pool<Sqlite>,
    date: NaiveDate,
    description: &str,
) -> Result<i64, AppError> {
    info!("Creating holiday");
    let res = sqlx::query("INSERT INTO holidays (date, description) VALUES (?, ?)")
        .bind(date)
        .bind(description)
        .execute(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation(format!("{} is already a holiday", date))
            } else {
                AppError::Database(e)
            }
        })?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn delete_holiday(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting holiday");
    let result = sqlx::query("DELETE FROM holidays WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Holiday {} not found", id)));
    }

    Ok(())
}

#[instrument]
pub async fn get_holidays_in_month(
    pool: &Pool<Sqlite>,
    year: i32,
    month: u32,
) -> Result<Vec<Holiday>, AppError> {
    let (first, last) = month_bounds(year, month)?;

    let rows = sqlx::query_as::<_, DbHoliday>(
        "SELECT id, date, description FROM holidays WHERE date BETWEEN ? AND ? ORDER BY date",
    )
    .bind(first)
    .bind(last)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Holiday::from).collect())
}
