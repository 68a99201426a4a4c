//! Roll and enrollment number derivation.
//!
//! Everything here is a pure function over values already read from the
//! store; `db::students` supplies the reads and performs the writes.

use crate::error::AppError;

/// Code used for standards that are not plain numbers ("KG1", "KG2").
pub const NON_NUMERIC_STANDARD_CODE: &str = "00";

/// Two-digit code for a standard: numeric standards are zero-padded, anything
/// else maps to [`NON_NUMERIC_STANDARD_CODE`].
pub fn standard_code(standard: &str) -> String {
    match standard.trim().parse::<u32>() {
        Ok(number) => format!("{:02}", number),
        Err(_) => NON_NUMERIC_STANDARD_CODE.to_string(),
    }
}

/// `YY` + standard code + four-digit roll number, e.g. 2025 / "3" / 7 gives
/// `"25030007"`.
///
/// Only unique while roll numbers are unique within a standard for a given
/// admission year. Collisions across years are possible.
pub fn enrollment_number(admission_year: i32, standard: &str, roll_no: i64) -> String {
    format!(
        "{:02}{}{:04}",
        admission_year.rem_euclid(100),
        standard_code(standard),
        roll_no
    )
}

/// Next roll number after the existing ones in a class: `max + 1`, or 1 for
/// an empty class.
pub fn next_roll_number<I>(existing: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    existing.into_iter().max().map_or(1, |max| max + 1)
}

/// Picks the roll number for a new or moved student.
///
/// `existing` holds the roll numbers already taken in the target class by
/// other students, whatever their status.
pub fn resolve_roll_number(requested: Option<i64>, existing: &[i64]) -> Result<i64, AppError> {
    match requested {
        Some(roll_no) if roll_no <= 0 => Err(AppError::Validation(
            "Roll number must be a positive integer".to_string(),
        )),
        Some(roll_no) if existing.contains(&roll_no) => Err(AppError::Validation(format!(
            "Roll number {} already exists in this class",
            roll_no
        ))),
        Some(roll_no) => Ok(roll_no),
        None => Ok(next_roll_number(existing.iter().copied())),
    }
}

/// Enrollment numbers are regenerated only when one of their inputs moves.
pub fn needs_new_enrollment(
    old_standard: &str,
    old_roll_no: i64,
    new_standard: &str,
    new_roll_no: i64,
) -> bool {
    old_standard != new_standard || old_roll_no != new_roll_no
}
