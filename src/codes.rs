use crate::constants::{
    LAST_ERRORS, LOGIN_ERROR_SEE_LAST_ERROR, LOGIN_ERRORS, UNKNOWN_LAST_ERROR, UNKNOWN_LOGIN_ERROR,
};
use crate::transport::StreamVariant;
use std::fmt;

/// Human readable reason for a login `nError` code. Never fails.
pub fn describe_login_error(code: i32) -> &'static str {
    LOGIN_ERRORS.get(&code).copied().unwrap_or(UNKNOWN_LOGIN_ERROR)
}

/// Classify the value of `CLIENT_GetLastError` after a sentinel login reply.
pub fn describe_last_error(last_error: u32) -> &'static str {
    LAST_ERRORS.get(&last_error).copied().unwrap_or(UNKNOWN_LAST_ERROR)
}

pub fn resolve_stream_variant(selector: i32) -> Option<StreamVariant> {
    StreamVariant::from_selector(selector)
}

/// Result of a single login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub success: bool,
    /// `nError` as reported by the device.
    pub error_code: i32,
    /// Set only when `error_code` was the sentinel and the last error was queried.
    pub last_error: Option<u32>,
    pub message: String,
}

impl LoginOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            error_code: 0,
            last_error: None,
            message: describe_login_error(0).to_string(),
        }
    }

    /// Build a failure outcome. `last_error` is only consulted for the sentinel code.
    pub fn from_reply(error_code: i32, last_error: impl FnOnce() -> u32) -> Self {
        if error_code == LOGIN_ERROR_SEE_LAST_ERROR {
            let last = last_error();
            return Self {
                success: false,
                error_code,
                last_error: Some(last),
                message: describe_last_error(last).to_string(),
            };
        }

        Self {
            success: false,
            error_code,
            last_error: None,
            message: describe_login_error(error_code).to_string(),
        }
    }
}

impl fmt::Display for LoginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.last_error.is_some() {
            f.write_str(&self.message)
        } else {
            write!(f, "Error code: {}: {}", self.error_code, self.message)
        }
    }
}
