//! Validation verdicts and their process exit codes.

use serde::Serialize;
use std::fmt;

/// Result of one harness invocation. The discriminant is the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ValidationOutcome {
    Success = 0,
    /// Timeout elapsed while timeouts count as errors.
    Timeout = 1,
    /// The process ignored the interrupt and had to be killed.
    HardTimeout = 2,
    /// Matched-sample count differs from the expectation.
    NotValidMessages = 3,
    /// Non-zero exit status or supervision failure.
    CommandFail = 4,
    /// Lines outside the expected message template were captured.
    StderrOutput = 5,
    DuplicatesExceeded = 6,
    LaunchFailed = 7,
    /// Arguments or configuration could not be resolved; nothing was launched.
    SetupFailed = 8,
}

impl ValidationOutcome {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ValidationOutcome::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationOutcome::Success => "success",
            ValidationOutcome::Timeout => "timeout",
            ValidationOutcome::HardTimeout => "hard_timeout",
            ValidationOutcome::NotValidMessages => "not_valid_messages",
            ValidationOutcome::CommandFail => "command_fail",
            ValidationOutcome::StderrOutput => "stderr_output",
            ValidationOutcome::DuplicatesExceeded => "duplicates_exceeded",
            ValidationOutcome::LaunchFailed => "launch_failed",
            ValidationOutcome::SetupFailed => "setup_failed",
        }
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_stable() {
        assert_eq!(ValidationOutcome::Success.code(), 0);
        assert_eq!(ValidationOutcome::Timeout.code(), 1);
        assert_eq!(ValidationOutcome::NotValidMessages.code(), 3);
        assert_eq!(ValidationOutcome::DuplicatesExceeded.code(), 6);
        assert_eq!(ValidationOutcome::LaunchFailed.code(), 7);
        assert_eq!(ValidationOutcome::SetupFailed.code(), 8);
        assert_eq!(ValidationOutcome::StderrOutput.to_string(), "stderr_output(5)");
    }

    #[test]
    fn test_codes_are_distinct() {
        let all = [
            ValidationOutcome::Success,
            ValidationOutcome::Timeout,
            ValidationOutcome::HardTimeout,
            ValidationOutcome::NotValidMessages,
            ValidationOutcome::CommandFail,
            ValidationOutcome::StderrOutput,
            ValidationOutcome::DuplicatesExceeded,
            ValidationOutcome::LaunchFailed,
            ValidationOutcome::SetupFailed,
        ];
        let codes: std::collections::HashSet<i32> = all.iter().map(|o| o.code()).collect();
        assert_eq!(codes.len(), all.len());
    }
}
