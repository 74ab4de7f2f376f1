//! Error taxonomy and wire result codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure modes of filesystem operations.
///
/// `RetryAgain` is not a terminal failure: it signals that the operation
/// could not complete yet and should be re-attempted by the caller. It is
/// never reported to a client; the dispatch layer parks the request instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("permission denied")]
    PermissionDenied,
    #[error("input/output error")]
    IoError,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("not supported")]
    NotSupported,
    #[error("retry again")]
    RetryAgain,
}

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Outcome code carried in every response message.
///
/// Extends [`FsError`] with the two non-error outcomes: plain success and
/// the redirect that points a caller at another server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    Success,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    IoError,
    InvalidArgument,
    NotSupported,
    RetryAgain,
    RedirectRequest,
}

impl ResultCode {
    /// True for every code except `RetryAgain`. Terminal outcomes always
    /// produce a response; `RetryAgain` parks the request instead.
    pub fn is_terminal(&self) -> bool {
        *self != ResultCode::RetryAgain
    }
}

impl From<FsError> for ResultCode {
    fn from(err: FsError) -> Self {
        match err {
            FsError::NotFound => ResultCode::NotFound,
            FsError::AlreadyExists => ResultCode::AlreadyExists,
            FsError::PermissionDenied => ResultCode::PermissionDenied,
            FsError::IoError => ResultCode::IoError,
            FsError::InvalidArgument => ResultCode::InvalidArgument,
            FsError::NotSupported => ResultCode::NotSupported,
            FsError::RetryAgain => ResultCode::RetryAgain,
        }
    }
}

impl<T> From<FsResult<T>> for ResultCode {
    fn from(result: FsResult<T>) -> Self {
        match result {
            Ok(_) => ResultCode::Success,
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_is_the_only_non_terminal_code() {
        assert!(!ResultCode::RetryAgain.is_terminal());
        assert!(ResultCode::Success.is_terminal());
        assert!(ResultCode::RedirectRequest.is_terminal());
        assert!(ResultCode::IoError.is_terminal());
    }

    #[test]
    fn error_maps_to_matching_code() {
        assert_eq!(ResultCode::from(FsError::NotFound), ResultCode::NotFound);
        assert_eq!(ResultCode::from(FsError::RetryAgain), ResultCode::RetryAgain);
    }

    #[test]
    fn ok_result_maps_to_success() {
        let result: FsResult<u64> = Ok(42);
        assert_eq!(ResultCode::from(result), ResultCode::Success);
    }
}
