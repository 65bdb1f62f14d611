//! Gateway error taxonomy

use super::catalog::UnknownOperation;
use super::validator::Denial;

/// Why a tool call produced no command output
///
/// A command that ran and exited non-zero is not an error here: its
/// diagnostic output is returned as ordinary tool text.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or mistyped tool parameter
    #[error("{0}")]
    ParameterShape(String),

    #[error(transparent)]
    UnknownOperation(#[from] UnknownOperation),

    #[error(transparent)]
    Denied(#[from] Denial),

    #[error("command timed out after {after_secs}s")]
    TimedOut { after_secs: u64 },

    /// The binary could not be spawned or its output could not be read
    #[error("failed to run command: {0}")]
    ProcessFailed(String),
}

impl GatewayError {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ParameterShape(_) => "parameter_shape",
            Self::UnknownOperation(_) => "unknown_operation",
            Self::Denied(_) => "denied",
            Self::TimedOut { .. } => "timed_out",
            Self::ProcessFailed(_) => "process_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = GatewayError::TimedOut { after_secs: 5 };
        assert_eq!(err.to_string(), "command timed out after 5s");
        assert_eq!(err.kind(), "timed_out");
    }

    #[test]
    fn test_unknown_operation_is_transparent() {
        let err: GatewayError = UnknownOperation("invalid operation 'x'".into()).into();
        assert_eq!(err.to_string(), "invalid operation 'x'");
    }
}
