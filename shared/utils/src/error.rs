use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ChiplineError {
    #[error("Source directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("File is locked or access was denied: {path} ({message})")]
    PermissionDenied { path: String, message: String },

    #[error("Workbook error: {message}")]
    Workbook { message: String },

    #[error("Missing sheet: {sheet}")]
    MissingSheet { sheet: String },

    #[error("Unexpected layout in sheet {sheet}: {message}")]
    Layout { sheet: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ChiplineError {
    pub fn directory_not_found(path: impl Into<String>) -> Self {
        Self::DirectoryNotFound { path: path.into() }
    }

    pub fn workbook(message: impl Into<String>) -> Self {
        Self::Workbook {
            message: message.into(),
        }
    }

    pub fn missing_sheet(sheet: impl Into<String>) -> Self {
        Self::MissingSheet {
            sheet: sheet.into(),
        }
    }

    pub fn layout(sheet: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Layout {
            sheet: sheet.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classifies an I/O failure on `path`. Permission denials and Windows
    /// sharing violations (a workbook held open by Excel) get their own variant.
    pub fn from_io(path: impl Into<String>, error: &std::io::Error) -> Self {
        let path = path.into();
        let message = error.to_string();
        let locked = cfg!(windows) && matches!(error.raw_os_error(), Some(32) | Some(33));
        if error.kind() == std::io::ErrorKind::PermissionDenied || locked {
            Self::PermissionDenied { path, message }
        } else {
            Self::Io { path, message }
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DirectoryNotFound { .. } => "DIRECTORY_NOT_FOUND",
            Self::Io { .. } => "IO_ERROR",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::Workbook { .. } => "WORKBOOK_ERROR",
            Self::MissingSheet { .. } => "MISSING_SHEET",
            Self::Layout { .. } => "LAYOUT_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::DirectoryNotFound { .. } => 404,
            Self::Io { .. } => 500,
            Self::PermissionDenied { .. } => 423,
            Self::Workbook { .. } => 422,
            Self::MissingSheet { .. } => 422,
            Self::Layout { .. } => 422,
            Self::Configuration { .. } => 500,
            Self::Validation { .. } => 400,
            Self::Internal { .. } => 500,
        }
    }
}

pub type ChiplineResult<T> = Result<T, ChiplineError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl From<ChiplineError> for ErrorResponse {
    fn from(error: ChiplineError) -> Self {
        Self {
            error: error.to_string(),
            code: error.error_code().to_string(),
            message: error.to_string(),
            details: None,
        }
    }
}

impl From<config::ConfigError> for ChiplineError {
    fn from(error: config::ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}

impl From<calamine::XlsxError> for ChiplineError {
    fn from(error: calamine::XlsxError) -> Self {
        Self::workbook(error.to_string())
    }
}

impl From<calamine::XlsError> for ChiplineError {
    fn from(error: calamine::XlsError) -> Self {
        Self::workbook(error.to_string())
    }
}
