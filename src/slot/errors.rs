use thiserror::Error;
use crate::utils::format_bytes;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("Maximum {limit} file{} allowed, got {count}", plural(.limit))]
    TooManyFiles {
        count: usize,
        limit: usize,
    },

    #[error("File size exceeds maximum allowed ({}), got {}", bytes(.max), bytes(.size))]
    SizeExceeded {
        size: u64,
        max: u64,
    },

    #[error("File type {mime} not accepted (accept: {accept})")]
    UnsupportedType {
        mime: String,
        accept: String,
    },

    #[error("Upload slot is occupied")]
    SlotOccupied,

    #[error("Upload failed: {0}")]
    Transport(String),

    #[error("Upload failed: No URL returned")]
    EmptyUrl,

    #[error("Upload was cancelled")]
    Cancelled,

    #[error("HTTP Request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Upload slot shut down")]
    SlotShutdown,
}

impl UploadError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 同步校验错误，不会产生任务
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            UploadError::NoFileSelected
                | UploadError::TooManyFiles { .. }
                | UploadError::SizeExceeded { .. }
                | UploadError::UnsupportedType { .. }
        )
    }
}

fn plural(count: &usize) -> &'static str {
    if *count == 1 { "" } else { "s" }
}

fn bytes(size: &u64) -> String {
    format_bytes(*size)
}

/// Error alias
pub type Result<T, E = UploadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = UploadError::SizeExceeded { size: 2 * 1024 * 1024, max: 1024 * 1024 };
        assert_eq!(err.to_string(), "File size exceeds maximum allowed (1.00 MB), got 2.00 MB");

        let err = UploadError::TooManyFiles { count: 2, limit: 1 };
        assert_eq!(err.to_string(), "Maximum 1 file allowed, got 2");

        let err = UploadError::TooManyFiles { count: 5, limit: 3 };
        assert_eq!(err.to_string(), "Maximum 3 files allowed, got 5");
    }

    #[test]
    fn test_rejection_kinds() {
        assert!(UploadError::NoFileSelected.is_rejection());
        assert!(UploadError::TooManyFiles { count: 2, limit: 1 }.is_rejection());
        assert!(!UploadError::transport("boom").is_rejection());
        assert!(!UploadError::EmptyUrl.is_rejection());
    }
}
