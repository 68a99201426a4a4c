use crate::error::AppError;
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;
use validator::Validate;

pub static GR_NO_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9/-]{0,31}$").expect("valid GR number regex"));

pub static SUBJECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9 .&-]{0,63}$").expect("valid subject regex"));

pub type ApiResult<T> = Result<T, Custom<Json<ValidationResponse>>>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResponse {
    pub status: String,
    pub error: String,
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationResponse {
    pub fn new(errors: HashMap<String, Vec<String>>) -> Self {
        let mut fields: Vec<&String> = errors.keys().collect();
        fields.sort();

        let error = fields
            .first()
            .and_then(|field| errors.get(*field))
            .and_then(|messages| messages.first())
            .cloned()
            .unwrap_or_else(|| "Validation failed".to_string());

        Self {
            status: "error".to_string(),
            error,
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }
}

pub trait ToValidationResponse {
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>>;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        self.log_and_record("API Validation Error");
        let status = self.status_code();

        let (field, message) = match &self {
            AppError::Database(_) => ("database", "Database error".to_string()),
            AppError::Authentication(msg) => ("authentication", msg.clone()),
            AppError::Authorization(msg) => ("authorization", format!("Permission denied: {}", msg)),
            AppError::NotFound(msg) => ("resource", format!("Not found: {}", msg)),
            AppError::Validation(msg) => ("validation", msg.clone()),
            AppError::ExternalService(msg) => ("service", format!("Service error: {}", msg)),
            AppError::Internal(msg) => ("server", msg.clone()),
        };

        Custom(status, Json(ValidationResponse::with_error(field, &message)))
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        let (field, message) = match self.code {
            403 => (
                "permission",
                "You don't have permission to perform this action",
            ),
            401 => ("authentication", "Authentication required"),
            404 => ("resource", "Resource not found"),
            409 => ("resource", "Resource already exists"),
            400 => ("request", "Bad request"),
            422 => ("validation", "Validation failed"),
            500 => ("server", "Internal server error"),
            503 => ("service", "Service unavailable"),
            _ => ("error", "An error occurred"),
        };

        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

#[derive(Debug)]
pub struct ValidationErrorWrapper(pub validator::ValidationErrors);

impl From<ValidationErrorWrapper> for Custom<Json<ValidationResponse>> {
    #[instrument]
    fn from(wrapper: ValidationErrorWrapper) -> Self {
        let errors = wrapper.0;
        let mut error_map = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let error_messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();

            error_map.insert(field.to_string(), error_messages);
        }

        Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::new(error_map)),
        )
    }
}

/// Runs `validator` rules on a JSON body and hands back the inner value.
pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> ApiResult<T>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> ApiResult<T> {
        let inner = self.into_inner();
        inner
            .validate()
            .map_err(|errors| Custom::from(ValidationErrorWrapper(errors)))?;
        Ok(inner)
    }
}

pub trait AppErrorExt<T> {
    fn validate_custom(self) -> ApiResult<T>;
}

impl<T> AppErrorExt<T> for Result<T, AppError> {
    fn validate_custom(self) -> ApiResult<T> {
        self.map_err(|e| e.to_validation_response())
    }
}

pub trait PermissionCheckExt {
    fn validate_custom(self) -> ApiResult<()>;
}

impl PermissionCheckExt for Result<(), Status> {
    fn validate_custom(self) -> ApiResult<()> {
        self.map_err(|status| status.to_validation_response())
    }
}
