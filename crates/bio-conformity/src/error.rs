use crate::config::ConfigError;
use crate::invoices::NormalizeError;
use crate::records::RepositoryError;
use crate::service::ComplianceServiceError;
use crate::telemetry::TelemetryError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// External collaborators whose failures are recovered by a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalService {
    Ai,
    Registry,
}

impl fmt::Display for ExternalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalService::Ai => write!(f, "AI service"),
            ExternalService::Registry => write!(f, "organic operator registry"),
        }
    }
}

/// An external call failed, returned non-2xx, or timed out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{service} unavailable: {reason}")]
pub struct ExternalServiceUnavailable {
    pub service: ExternalService,
    pub reason: String,
}

impl ExternalServiceUnavailable {
    pub fn new(service: ExternalService, reason: impl Into<String>) -> Self {
        Self {
            service,
            reason: reason.into(),
        }
    }
}

/// Await an external call under a caller-side ceiling. Elapsed time becomes unavailability.
pub async fn within<T, F>(
    service: ExternalService,
    ceiling: Duration,
    call: F,
) -> Result<T, ExternalServiceUnavailable>
where
    F: Future<Output = Result<T, ExternalServiceUnavailable>>,
{
    match tokio::time::timeout(ceiling, call).await {
        Ok(result) => result,
        Err(_) => Err(ExternalServiceUnavailable::new(
            service,
            format!("no response within {}s", ceiling.as_secs_f32()),
        )),
    }
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Json(serde_json::Error),
    Body(JsonRejection),
    Compliance(ComplianceServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Json(err) => write!(f, "invalid JSON: {}", err),
            AppError::Body(err) => write!(f, "invalid request body: {}", err.body_text()),
            AppError::Compliance(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::Body(err) => Some(err),
            AppError::Compliance(err) => Some(err),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Json(_) | AppError::Body(_) => StatusCode::BAD_REQUEST,
            AppError::Compliance(err) => match err {
                ComplianceServiceError::Normalize(NormalizeError::Malformed(_))
                | ComplianceServiceError::InvalidDocument(_)
                | ComplianceServiceError::InvalidRecord(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ComplianceServiceError::Repository(RepositoryError::NotFound) => {
                    StatusCode::NOT_FOUND
                }
                ComplianceServiceError::Repository(RepositoryError::Conflict) => {
                    StatusCode::CONFLICT
                }
                ComplianceServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ComplianceServiceError::Repository(RepositoryError::Unavailable(_)) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<JsonRejection> for AppError {
    fn from(value: JsonRejection) -> Self {
        Self::Body(value)
    }
}

impl From<ComplianceServiceError> for AppError {
    fn from(value: ComplianceServiceError) -> Self {
        Self::Compliance(value)
    }
}

impl From<ExternalServiceUnavailable> for AppError {
    fn from(value: ExternalServiceUnavailable) -> Self {
        Self::Compliance(ComplianceServiceError::Unavailable(value))
    }
}

impl From<NormalizeError> for AppError {
    fn from(value: NormalizeError) -> Self {
        Self::Compliance(ComplianceServiceError::Normalize(value))
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Compliance(ComplianceServiceError::Repository(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn within_converts_elapsed_into_unavailability() {
        let result: Result<(), _> = within(
            ExternalService::Registry,
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            },
        )
        .await;

        let err = result.expect_err("call should time out");
        assert_eq!(err.service, ExternalService::Registry);
        assert!(err.to_string().starts_with("organic operator registry unavailable"));
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let malformed = AppError::from(NormalizeError::Malformed("x".into()));
        assert_eq!(malformed.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let missing = AppError::from(RepositoryError::NotFound);
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    }
}
