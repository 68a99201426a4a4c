pub mod assignments;
pub mod attendance;
pub mod exams;
pub mod face;
pub mod holidays;
pub mod session;
pub mod students;
pub mod users;

pub use assignments::*;
pub use attendance::*;
pub use exams::*;
pub use face::*;
pub use holidays::*;
pub use session::*;
pub use students::*;
pub use users::*;

use chrono::NaiveDate;

use crate::error::AppError;

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!("{} must be a date in YYYY-MM-DD format", field))
    })
}
