//! JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tidings_core::Error;
use tracing::{debug, error};

#[derive(Debug)]
pub enum ApiError {
    /// The bucket has no notification configuration
    NoSuchConfiguration(String),
    /// Request body could not be parsed
    MalformedBody(String),
    Core(Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoSuchConfiguration(_) => StatusCode::NOT_FOUND,
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NoSuchConfiguration(_) => "NoSuchNotificationConfiguration",
            ApiError::MalformedBody(_) => "MalformedJSON",
            ApiError::Core(e) => e.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::NoSuchConfiguration(path) => {
                format!("no notification configuration for '{}'", path)
            }
            ApiError::MalformedBody(reason) => reason.clone(),
            ApiError::Core(e) => e.to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.code(),
            message: self.message(),
        };

        if status.is_server_error() {
            error!(code = body.code, "Request failed: {}", body.message);
        } else {
            debug!(code = body.code, "Request rejected: {}", body.message);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(Error::InvalidBucketName("a/b".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::Store("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(Error::Timeout("get".into())).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::NoSuchConfiguration("b".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::MalformedBody("eof".into()).code(), "MalformedJSON");
    }
}
