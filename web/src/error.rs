use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use domain::error::{DomainErrorKind, EntityErrorKind, Error as DomainError, InternalErrorKind};

extern crate log;
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl Error {
    /// A request the handler rejected before it reached the domain layer.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(DomainError {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::Invalid(message.into()),
            )),
        })
    }

    fn status_code(&self) -> StatusCode {
        match &self.0.error_kind {
            DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                InternalErrorKind::Entity(entity_error_kind) => match entity_error_kind {
                    EntityErrorKind::NotFound => StatusCode::NOT_FOUND,
                    EntityErrorKind::Invalid(_) => StatusCode::BAD_REQUEST,
                },
                InternalErrorKind::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// Body of every error response: `{"status_code": 404, "error": "User not found"}`.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub(crate) status_code: u16,
    pub(crate) error: String,
}

impl ErrorBody {
    pub(crate) fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            error: error.into(),
        }
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}: {}", status, self.0);
        } else {
            debug!("{}: {}", status, self.0);
        }

        (status, Json(ErrorBody::new(status, self.0.message()))).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn bad_request_renders_as_400_with_message() {
        let response = Error::bad_request("Invalid ID").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"status_code": 400, "error": "Invalid ID"})
        );
    }

    #[tokio::test]
    async fn internal_error_renders_as_500_without_detail() {
        let err = Error(DomainError {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "Failed to encode users".to_string(),
            )),
        });

        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"status_code": 500, "error": "Internal server error"})
        );
    }
}
