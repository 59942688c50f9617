//! Gateway-owned error taxonomy (§7). One `thiserror`-derived enum whose
//! `code()` maps 1:1 onto the wire `error` frame codes, so the WebSocket and
//! HTTP surfaces share a single conversion path.

use wingman_protocol::error_codes;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("capacity exceeded")]
    CapacityExceeded,

    #[error("rate limited")]
    RateLimited,

    #[error("busy")]
    Busy,

    #[error("cancelled")]
    Cancelled,

    #[error("cancellation timed out")]
    CancellationTimeout,

    #[error("frame too large")]
    FrameTooLarge,

    #[error("backpressure")]
    Backpressure,

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Sessions(#[from] wingman_sessions::Error),

    #[error(transparent)]
    Routing(#[from] wingman_routing::Error),

    #[error(transparent)]
    Auth(#[from] wingman_auth::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Machine-readable code carried on wire `error` frames and terminal
    /// lifecycle events.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Invalid(_) => error_codes::INVALID,
            GatewayError::Unauthorized(_) => error_codes::UNAUTHORIZED,
            GatewayError::Forbidden(_) => error_codes::INVALID,
            GatewayError::NotFound(_) => error_codes::NOT_FOUND,
            GatewayError::Conflict(_) => error_codes::CONFLICT,
            GatewayError::CapacityExceeded => error_codes::CAPACITY_EXCEEDED,
            GatewayError::RateLimited => error_codes::RATE_LIMITED,
            GatewayError::Busy => error_codes::BUSY,
            GatewayError::Cancelled => error_codes::CANCELLED,
            GatewayError::CancellationTimeout => error_codes::CANCELLATION_TIMEOUT,
            GatewayError::FrameTooLarge => error_codes::FRAME_TOO_LARGE,
            GatewayError::Backpressure => error_codes::BACKPRESSURE,
            GatewayError::Transient(_) => error_codes::TRANSIENT,
            GatewayError::Routing(wingman_routing::Error::NotConfigured) => error_codes::INVALID,
            GatewayError::Sessions(_) | GatewayError::Sqlx(_) | GatewayError::Io(_) => {
                error_codes::INTERNAL
            },
            GatewayError::Auth(wingman_auth::Error::Unauthorized { .. }) => {
                error_codes::UNAUTHORIZED
            },
            GatewayError::Auth(wingman_auth::Error::RateLimited { .. }) => error_codes::RATE_LIMITED,
            GatewayError::Auth(_) => error_codes::INTERNAL,
            GatewayError::Internal(_) => error_codes::INTERNAL,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status this error maps to, for the `/api/*` surface.
    #[must_use]
    pub fn status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            GatewayError::Invalid(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized(_) | GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::CapacityExceeded => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Busy => StatusCode::CONFLICT,
            GatewayError::Cancelled | GatewayError::CancellationTimeout => StatusCode::GONE,
            GatewayError::FrameTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Backpressure => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Sessions(_)
            | GatewayError::Routing(_)
            | GatewayError::Sqlx(_)
            | GatewayError::Io(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = axum::Json(serde_json::json!({
            "error": { "code": self.code(), "message": self.to_string() }
        }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
