//! Error types for entity API
use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;

/// Errors while executing operations against the user store.
/// The intent is to categorize errors into two major types:
///  * Errors related to the referenced record. Ex RecordNotFound
///  * Errors related to the data supplied by the caller. Ex ValidationError
#[derive(Debug, PartialEq)]
pub struct Error {
    // Enum representing which category of error
    pub error_kind: EntityApiErrorKind,
}

#[derive(Debug, PartialEq, Serialize)]
pub enum EntityApiErrorKind {
    // Record not found
    RecordNotFound,
    // Validation error
    ValidationError(ValidationErrorKind),
}

/// The business rule a rejected input violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationErrorKind {
    MissingRequiredFields,
    InvalidEmail,
    AgeOutOfRange,
    EmptyBatch,
    BatchTooLarge,
    EmptyIdList,
}

impl Error {
    pub fn not_found() -> Self {
        Error {
            error_kind: EntityApiErrorKind::RecordNotFound,
        }
    }

    pub fn validation(kind: ValidationErrorKind) -> Self {
        Error {
            error_kind: EntityApiErrorKind::ValidationError(kind),
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationErrorKind::MissingRequiredFields => write!(f, "Name and email are required"),
            ValidationErrorKind::InvalidEmail => write!(f, "Invalid email format"),
            ValidationErrorKind::AgeOutOfRange => write!(f, "Age must be between 0 and 150"),
            ValidationErrorKind::EmptyBatch => write!(f, "No users provided"),
            ValidationErrorKind::BatchTooLarge => write!(f, "Maximum 100 users per batch"),
            ValidationErrorKind::EmptyIdList => write!(f, "No IDs provided"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            EntityApiErrorKind::RecordNotFound => write!(f, "Entity API Error: record not found"),
            EntityApiErrorKind::ValidationError(kind) => write!(f, "Entity API Error: {kind}"),
        }
    }
}

impl StdError for Error {}
