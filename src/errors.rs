use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Bad or missing input supplied by the caller.
    InvalidInput(String),
    /// Resource not found error.
    NotFound(String),
    /// A discovery, enrichment or messaging upstream failed or is unreachable.
    UpstreamUnavailable(String),
    /// A store read or write failed.
    Persistence(sqlx::Error),
    /// A required external credential or setting is missing.
    Configuration(String),
    /// Unauthorized access error.
    Unauthorized(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Innermost error, skipping any context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {}", msg),
            AppError::Persistence(e) => write!(f, "Persistence error: {}", e),
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::UpstreamUnavailable(msg) => {
                tracing::error!("Upstream unavailable: {}", msg);
                (StatusCode::BAD_GATEWAY, "External service error".to_string())
            }
            AppError::Persistence(e) => {
                tracing::error!("Persistence error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Service misconfigured".to_string(),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AppError::WithContext { source, context } => {
                // Log full context chain, then answer as the underlying error would
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    /// Converts a `sqlx::Error` into an `AppError`.
    fn from(err: sqlx::Error) -> Self {
        AppError::Persistence(err)
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        AppError::UpstreamUnavailable(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::Persistence(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::Persistence(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_chain_reports_root() {
        let err: Result<(), AppError> =
            Err(AppError::UpstreamUnavailable("registry down".to_string()));
        let wrapped = err.context("discovery cfm/SP").unwrap_err();

        assert!(matches!(wrapped.root(), AppError::UpstreamUnavailable(_)));
        assert_eq!(
            wrapped.to_string(),
            "discovery cfm/SP: Upstream unavailable: registry down"
        );
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        let resp = AppError::InvalidInput("region is required".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::UpstreamUnavailable("timeout".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let resp = AppError::WithContext {
            source: Box::new(AppError::NotFound("campaign".into())),
            context: "run".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
