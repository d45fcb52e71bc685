use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

impl AppError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            trace_id: trace_id.into(),
        }
    }

    pub fn device_not_found(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_DEVICE_NOT_FOUND", message, trace_id)
    }

    pub fn command_timeout(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_COMMAND_TIMEOUT", message, trace_id)
    }

    pub fn reboot_failed(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_REBOOT_FAILED", message, trace_id)
    }

    pub fn archive_too_small(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_ARCHIVE_TOO_SMALL", message, trace_id)
    }

    pub fn archive_missing(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_ARCHIVE_MISSING", message, trace_id)
    }

    pub fn no_guid_found(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_NO_GUID_FOUND", message, trace_id)
    }

    pub fn low_confidence_unconfirmed(
        message: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self::new("ERR_LOW_CONFIDENCE_UNCONFIRMED", message, trace_id)
    }

    pub fn payload_resolution(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_PAYLOAD_RESOLUTION", message, trace_id)
    }

    pub fn download_failed(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_DOWNLOAD_FAILED", message, trace_id)
    }

    pub fn invalid_payload_db(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_INVALID_PAYLOAD_DB", message, trace_id)
    }

    pub fn transfer_failed(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_TRANSFER_FAILED", message, trace_id)
    }

    pub fn transfer_unconfirmed(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_TRANSFER_UNCONFIRMED", message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_SYSTEM", message, trace_id)
    }

    pub fn is_timeout(&self) -> bool {
        self.code == "ERR_COMMAND_TIMEOUT"
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AppError {}
