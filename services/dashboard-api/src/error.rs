use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chipline_utils::{ChiplineError, ErrorResponse};
use thiserror::Error;

/// Handler error. Wraps the domain error so it can be rendered as JSON.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Chipline(#[from] ChiplineError),

    #[error("Forbidden: {message}")]
    Forbidden { message: String },
}

impl ApiError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Chipline(error) => {
                StatusCode::from_u16(error.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = match self {
            Self::Chipline(error) => ErrorResponse::from(error),
            Self::Forbidden { message } => ErrorResponse {
                error: "Forbidden".to_string(),
                code: "FORBIDDEN".to_string(),
                message,
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(ChiplineError::directory_not_found("/data")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ChiplineError::validation("stage", "unknown")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::forbidden("export").status(), StatusCode::FORBIDDEN);
    }
}
