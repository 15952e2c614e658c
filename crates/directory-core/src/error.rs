//! Directory error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::DoctorId;
use crate::store::StoreError;

/// Errors surfaced to directory callers
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum DirectoryError {
    /// Bad input; reported inline and not retried
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller may not perform this action
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend failure; safe to retry manually
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Claim(#[from] ClaimError),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

impl DirectoryError {
    /// Only backend failures are worth a manual retry
    pub fn is_retryable(&self) -> bool {
        match self {
            DirectoryError::StoreUnavailable(_) => true,
            DirectoryError::Claim(ClaimError::Store(_)) => true,
            _ => false,
        }
    }

    /// Short message suitable for a toast or inline notice
    pub fn user_message(&self) -> &'static str {
        match self {
            DirectoryError::Validation(_) => "Please check the highlighted fields",
            DirectoryError::NotFound(_) => "Not found",
            DirectoryError::Permission(_) => "You do not have permission to do that",
            DirectoryError::Conflict(_) => "This has already been done",
            DirectoryError::StoreUnavailable(_) => "Something went wrong, please try again",
            DirectoryError::Claim(ClaimError::Unauthenticated) => {
                "You must be logged in to claim a profile"
            }
            DirectoryError::Claim(ClaimError::AlreadyClaimedElsewhere)
            | DirectoryError::Claim(ClaimError::AlreadyClaimed) => {
                "You have already claimed a doctor profile"
            }
            DirectoryError::Claim(ClaimError::DoctorNotFound(_)) => "Not found",
            DirectoryError::Claim(ClaimError::Store(_)) => "Something went wrong, please try again",
        }
    }
}

impl From<StoreError> for DirectoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => DirectoryError::NotFound(msg),
            StoreError::Conflict(msg) => DirectoryError::Conflict(msg),
            StoreError::Unavailable(msg) => DirectoryError::StoreUnavailable(msg),
        }
    }
}

/// Reasons a profile claim is refused
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum ClaimError {
    #[error("Claim requires a signed-in identity")]
    Unauthenticated,

    #[error("Doctor not found: {0}")]
    DoctorNotFound(DoctorId),

    /// The claimant already holds this very claim
    #[error("Doctor profile already claimed by this identity")]
    AlreadyClaimed,

    /// The claimant holds a verified claim on another doctor
    #[error("Identity has already claimed another doctor profile")]
    AlreadyClaimedElsewhere,

    #[error("Store unavailable: {0}")]
    Store(String),
}
