//! Client-side contract for the external face-recognition service.
//!
//! Liveness checks and face matching happen entirely in that service. This
//! crate only sequences the calls and decides what a successful match lets
//! the caller do.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessChallenge {
    pub challenge_id: String,
    pub instructions: Vec<String>,
    pub expires_in_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResult {
    pub passed: bool,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceMatch {
    pub matched: bool,
    /// Identifier the face was enrolled under; the user id as a string.
    pub subject_id: Option<String>,
    pub confidence: f32,
}

/// Frames and images are passed through untouched (data URLs or base64, as
/// the browser captured them).
#[rocket::async_trait]
pub trait FaceVerifier: Send + Sync {
    async fn get_challenge(&self) -> Result<LivenessChallenge, AppError>;

    async fn verify_liveness(
        &self,
        challenge_id: &str,
        frames: &[String],
    ) -> Result<LivenessResult, AppError>;

    async fn verify_face(&self, challenge_id: &str, image: &str) -> Result<FaceMatch, AppError>;

    async fn enroll_face(&self, subject_id: &str, image: &str) -> Result<(), AppError>;
}

/// Used when no face service has been wired in. Every call fails as an
/// unavailable external service.
pub struct DisabledFaceVerifier;

impl DisabledFaceVerifier {
    fn unavailable<T>() -> Result<T, AppError> {
        Err(AppError::ExternalService(
            "Face verification service is not configured".to_string(),
        ))
    }
}

#[rocket::async_trait]
impl FaceVerifier for DisabledFaceVerifier {
    async fn get_challenge(&self) -> Result<LivenessChallenge, AppError> {
        Self::unavailable()
    }

    async fn verify_liveness(
        &self,
        _challenge_id: &str,
        _frames: &[String],
    ) -> Result<LivenessResult, AppError> {
        Self::unavailable()
    }

    async fn verify_face(&self, _challenge_id: &str, _image: &str) -> Result<FaceMatch, AppError> {
        Self::unavailable()
    }

    async fn enroll_face(&self, _subject_id: &str, _image: &str) -> Result<(), AppError> {
        Self::unavailable()
    }
}
