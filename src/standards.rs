use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::AppError;

const PRIMARY_CLASSES: &[&str] = &["Dhruv", "Nachiketa", "Prahlad", "Eklavya"];
const SECONDARY_CLASSES: &[&str] = &["Dhruv", "Nachiketa", "Prahlad"];
const SENIOR_CLASSES: &[&str] = &["Aryabhatta", "Chanakya"];

#[derive(Debug, Clone, Serialize)]
pub struct StandardClasses {
    pub standard: &'static str,
    pub classes: &'static [&'static str],
}

/// Every standard the school runs, in display order, with its fixed sections.
pub static STANDARDS: Lazy<Vec<StandardClasses>> = Lazy::new(|| {
    let mut standards = vec![
        StandardClasses {
            standard: "KG1",
            classes: PRIMARY_CLASSES,
        },
        StandardClasses {
            standard: "KG2",
            classes: PRIMARY_CLASSES,
        },
    ];

    const NUMBERED: [&str; 12] = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12"];
    for (index, standard) in NUMBERED.iter().enumerate() {
        let classes = match index + 1 {
            1..=5 => PRIMARY_CLASSES,
            6..=10 => SECONDARY_CLASSES,
            _ => SENIOR_CLASSES,
        };
        standards.push(StandardClasses {
            standard: *standard,
            classes,
        });
    }

    standards
});

pub fn classes_for(standard: &str) -> Option<&'static [&'static str]> {
    STANDARDS
        .iter()
        .find(|entry| entry.standard == standard)
        .map(|entry| entry.classes)
}

pub fn validate_class(standard: &str, class_name: &str) -> Result<(), AppError> {
    let classes = classes_for(standard)
        .ok_or_else(|| AppError::Validation(format!("Invalid standard: {}", standard)))?;

    if !classes.contains(&class_name) {
        return Err(AppError::Validation(format!(
            "Class {} is not valid for standard {}",
            class_name, standard
        )));
    }

    Ok(())
}
