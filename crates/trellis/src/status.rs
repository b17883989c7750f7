use axum::response::IntoResponse;
use http::StatusCode;
use serde_derive::{Deserialize, Serialize};

/// Canonical RPC error codes, mirroring the gRPC code set.
///
/// Generated servers map these onto HTTP status codes when a handler
/// returns an error; generated clients surface the code decoded from the
/// error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Code {
    /// The request message failed validation or could not be decoded.
    InvalidArgument,
    /// The named entity does not exist.
    NotFound,
    /// The entity already exists.
    AlreadyExists,
    /// The caller lacks permission.
    PermissionDenied,
    /// No or invalid credentials.
    Unauthenticated,
    /// Quota or rate limit exhausted.
    ResourceExhausted,
    /// The system is not in the state required for the operation.
    FailedPrecondition,
    /// The operation was aborted, typically a concurrency conflict.
    Aborted,
    /// A value is outside the valid range.
    OutOfRange,
    /// The operation is not implemented.
    Unimplemented,
    /// Internal error.
    Internal,
    /// The service is currently unavailable.
    Unavailable,
    /// The deadline expired before the operation completed.
    DeadlineExceeded,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// An error that does not fit any other code.
    Unknown,
}

impl Code {
    /// The snake_case name serialized into error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Code::InvalidArgument => "invalid_argument",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::PermissionDenied => "permission_denied",
            Code::Unauthenticated => "unauthenticated",
            Code::ResourceExhausted => "resource_exhausted",
            Code::FailedPrecondition => "failed_precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out_of_range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::Cancelled => "cancelled",
            Code::Unknown => "unknown",
        }
    }

    /// The HTTP status this code maps to on the wire.
    pub fn http_status(self) -> StatusCode {
        match self {
            Code::InvalidArgument => StatusCode::BAD_REQUEST,
            Code::NotFound => StatusCode::NOT_FOUND,
            Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
            Code::PermissionDenied => StatusCode::FORBIDDEN,
            Code::Unauthenticated => StatusCode::UNAUTHORIZED,
            Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            Code::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
            Code::OutOfRange => StatusCode::RANGE_NOT_SATISFIABLE,
            Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
            Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Code::DeadlineExceeded | Code::Cancelled => StatusCode::REQUEST_TIMEOUT,
            Code::Internal | Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A service-level error returned by generated server-trait methods.
///
/// Converting a `Status` into a response produces the canonical JSON error
/// body `{"code": "...", "message": "..."}` with the HTTP status from
/// [`Code::http_status`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}: {}", .code.as_str(), .message)]
pub struct Status {
    code: Code,
    message: String,
}

impl Status {
    /// Create a status with an explicit code.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The code attached to this status.
    pub fn code(&self) -> Code {
        self.code
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// `Code::InvalidArgument` with the given message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// `Code::NotFound` with the given message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    /// `Code::AlreadyExists` with the given message.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(Code::AlreadyExists, message)
    }

    /// `Code::PermissionDenied` with the given message.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(Code::PermissionDenied, message)
    }

    /// `Code::Unauthenticated` with the given message.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(Code::Unauthenticated, message)
    }

    /// `Code::Unimplemented` with the given message.
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    /// `Code::Internal` with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// `Code::Unavailable` with the given message.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }
}

impl IntoResponse for Status {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            code: self.code.as_str().to_owned(),
            message: self.message,
        };
        (self.code.http_status(), axum::Json(body)).into_response()
    }
}

/// The wire shape of an error reply, shared by the server and client sides.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) code: String,
    pub(crate) message: String,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn code_http_mapping() {
        assert_eq!(Code::InvalidArgument.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(Code::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(Code::Aborted.http_status(), StatusCode::CONFLICT);
        assert_eq!(Code::Unknown.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_display() {
        let status = Status::not_found("no such message");
        assert_eq!(status.to_string(), "not_found: no such message");
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "no such message");
    }

    #[tokio::test]
    async fn status_into_response_body() {
        let response = Status::invalid_argument("bad id").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "invalid_argument");
        assert_eq!(body["message"], "bad id");
    }
}
