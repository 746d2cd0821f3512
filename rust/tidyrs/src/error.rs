//! Status code translation
//!
//! libtidy reports failure in two ways: an `int` status (0 clean, 1 warnings,
//! 2 errors, negative for severe failures) and a `Bool` for setters. Both are
//! folded into [`Error`] here so every wrapper applies the same rule.

use std::ffi::{c_int, NulError};

use crate::ffi;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A status-returning call reported errors or a severe failure.
    #[error("{context} (status {code})")]
    Status { context: &'static str, code: i32 },

    /// A `Bool`-returning call answered `no`.
    #[error("{context}")]
    Rejected { context: &'static str },

    #[error("string passed to libtidy contains a NUL byte")]
    NulByte(#[from] NulError),

    #[error("output buffer too small, {needed} bytes required")]
    BufferTooSmall { needed: usize },

    #[error("unknown tidy option `{0}`")]
    UnknownOption(String),
}

impl Error {
    /// The fixed description of the failing operation, if there is one.
    pub fn context(&self) -> Option<&'static str> {
        match self {
            Error::Status { context, .. } | Error::Rejected { context } => Some(context),
            _ => None,
        }
    }

    /// The raw libtidy status, for [`Error::Status`].
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Outcome of a status-returning call that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Clean,
    Warnings,
}

/// libtidy's status for "errors were found".
pub const STATUS_ERRORS: c_int = 2;

/// Apply the uniform rule: negative or error status fails with `context`,
/// anything else passes through.
pub fn check(code: c_int, context: &'static str) -> Result<Status> {
    if code < 0 || code == STATUS_ERRORS {
        log::warn!("{} (status {})", context, code);
        return Err(Error::Status { context, code });
    }
    Ok(if code == 0 {
        Status::Clean
    } else {
        Status::Warnings
    })
}

/// Same rule for `Bool` results: `no` fails with `context`.
pub fn check_bool(flag: ffi::Bool, context: &'static str) -> Result<()> {
    if flag == ffi::NO {
        log::warn!("{}", context);
        return Err(Error::Rejected { context });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_passes_clean_and_warnings() {
        assert_eq!(check(0, "op").unwrap(), Status::Clean);
        assert_eq!(check(1, "op").unwrap(), Status::Warnings);
    }

    #[test]
    fn test_check_rejects_errors_and_negative() {
        let err = check(2, "document.parse: failed").unwrap_err();
        assert_eq!(err.context(), Some("document.parse: failed"));
        assert_eq!(err.code(), Some(2));

        let err = check(-12, "document.save: failed").unwrap_err();
        assert_eq!(err.code(), Some(-12));
        assert_eq!(err.to_string(), "document.save: failed (status -12)");
    }

    #[test]
    fn test_check_bool() {
        assert!(check_bool(ffi::YES, "op").is_ok());
        let err = check_bool(ffi::NO, "option rejected").unwrap_err();
        assert_eq!(err.context(), Some("option rejected"));
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), "option rejected");
    }
}
