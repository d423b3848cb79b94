//! HTTP error boundary.
//!
//! Every handler returns `Result<_, ApiError>`. Domain errors from
//! `jobby-platform-access` convert into it with `?`, and `IntoResponse`
//! maps each variant to a status code and the `{message, statusCode, data}`
//! envelope. Internal details are logged, never returned.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jobby_platform_access::{
    AuthenticationError, AuthorizationError, IdentityError, RequestedRoleError,
};
use std::fmt;

use crate::response::Envelope;

/// Errors returned from HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    Authentication(AuthenticationError),
    Authorization(AuthorizationError),
    Identity(IdentityError),
    RequestedRole(RequestedRoleError),
    /// Malformed input or a broken business rule, shown to the caller as is.
    BadRequest { message: String },
    /// A record the caller named does not exist.
    NotFound { message: String },
    /// Database failure.
    Database { details: String },
    /// Any other server-side failure.
    Internal { details: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn internal(details: impl fmt::Display) -> Self {
        Self::Internal {
            details: details.to_string(),
        }
    }

    /// Status code and caller-facing message for this error.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Authentication(err) => authentication_response(err),
            Self::Authorization(err) => match err {
                AuthorizationError::NotAuthenticated => (
                    StatusCode::UNAUTHORIZED,
                    "User not found in session".to_string(),
                ),
                AuthorizationError::RoleNotAllowed { .. } => (
                    StatusCode::UNAUTHORIZED,
                    "You don't have the required role".to_string(),
                ),
                AuthorizationError::NotOwner { .. } => (
                    StatusCode::FORBIDDEN,
                    "you don't have permission to view this record".to_string(),
                ),
                AuthorizationError::NotAdministrator => {
                    (StatusCode::UNAUTHORIZED, "Unauthorized access".to_string())
                }
            },
            Self::Identity(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::RequestedRole(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
            Self::NotFound { message } => (StatusCode::NOT_FOUND, message.clone()),
            Self::Database { .. } | Self::Internal { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

fn authentication_response(err: &AuthenticationError) -> (StatusCode, String) {
    use AuthenticationError as E;
    match err {
        E::MissingCredential => (StatusCode::UNAUTHORIZED, "invalid jwt".to_string()),
        E::InvalidToken { .. } => (StatusCode::BAD_REQUEST, "invalid jwt".to_string()),
        E::MissingLoginState | E::StateMismatch => (
            StatusCode::BAD_REQUEST,
            "Invalid state parameter.".to_string(),
        ),
        E::TokenExchange { .. } => (
            StatusCode::UNAUTHORIZED,
            "Failed to exchange an authorization code for a token.".to_string(),
        ),
        E::TokenVerification { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to verify ID Token.".to_string(),
        ),
        E::UnsupportedProvider { .. } => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        E::MalformedClaims { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read the identity provider profile.".to_string(),
        ),
        E::UserNotFound { .. } => (StatusCode::BAD_REQUEST, "user not found".to_string()),
        E::InvalidCredentials => (StatusCode::BAD_REQUEST, "Invalid credentials".to_string()),
        E::InvalidOtp => (
            StatusCode::BAD_REQUEST,
            "Invalid otp try login again.".to_string(),
        ),
        E::InvalidSigningKey | E::TokenSigning { .. } | E::PasswordHashing { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication(err) => write!(f, "authentication failed: {err}"),
            Self::Authorization(err) => write!(f, "authorization failed: {err}"),
            Self::Identity(err) => write!(f, "identity resolution failed: {err}"),
            Self::RequestedRole(err) => write!(f, "invalid requested role: {err}"),
            Self::BadRequest { message } => write!(f, "bad request: {message}"),
            Self::NotFound { message } => write!(f, "not found: {message}"),
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::Internal { details } => write!(f, "internal error: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = Envelope {
            message,
            status_code: status.as_u16(),
            data: serde_json::Value::Null,
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthenticationError> for ApiError {
    fn from(err: AuthenticationError) -> Self {
        Self::Authentication(err)
    }
}

impl From<AuthorizationError> for ApiError {
    fn from(err: AuthorizationError) -> Self {
        Self::Authorization(err)
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        Self::Identity(err)
    }
}

impl From<RequestedRoleError> for ApiError {
    fn from(err: RequestedRoleError) -> Self {
        Self::RequestedRole(err)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            details: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}
