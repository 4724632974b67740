//! Error taxonomy.
//!
//! Every failure crossing a component boundary carries one of four
//! classifications, which drive retry behavior and logging. Components catch
//! their own internal failures and re-raise exactly one normalized error per
//! public operation; the pipeline coordinator is the only place errors turn
//! into user-facing copy.

/// Log level an error should be reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors such as validation failures.
    Debug,
    /// Recoverable or degraded-mode issues.
    Warn,
    /// Unexpected failures.
    Error,
}

/// Retry classification for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A local precondition was not met (missing token, missing user id).
    /// Fails fast, never retried.
    Precondition,
    /// Transient network/service failure. Safe to retry with backoff.
    Transient,
    /// Authentication/authorization failure. Never retried.
    Unauthorized,
    /// Permanent failure (bad input, exhausted fallbacks).
    Permanent,
}

impl ErrorClass {
    /// Whether a caller may retry the failed operation.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorClass::Transient)
    }

    pub fn log_level(self) -> LogLevel {
        match self {
            ErrorClass::Precondition => LogLevel::Debug,
            ErrorClass::Transient => LogLevel::Warn,
            ErrorClass::Unauthorized | ErrorClass::Permanent => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_recoverable() {
        assert!(ErrorClass::Transient.is_recoverable());
        assert!(!ErrorClass::Precondition.is_recoverable());
        assert!(!ErrorClass::Unauthorized.is_recoverable());
        assert!(!ErrorClass::Permanent.is_recoverable());
    }

    #[test]
    fn log_levels() {
        assert_eq!(ErrorClass::Precondition.log_level(), LogLevel::Debug);
        assert_eq!(ErrorClass::Transient.log_level(), LogLevel::Warn);
        assert_eq!(ErrorClass::Unauthorized.log_level(), LogLevel::Error);
    }
}
