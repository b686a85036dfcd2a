//! Observed interaction outcomes and which of them count as evidence.

use edgetrust_core::ResponseCode;

/// What happened when a task was submitted to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSubmissionOutcome {
    /// The edge answered with this code
    Response(ResponseCode),
    /// No answer before the request timed out
    Timeout,
    /// The request never left this node
    SendFailed,
}

impl TaskSubmissionOutcome {
    /// `Some(good)` if the outcome says something about the edge, `None` to discard.
    ///
    /// Client errors are ours, not the edge's.
    pub fn evidence(&self) -> Option<bool> {
        match self {
            Self::Response(code) if code.is_success() => Some(true),
            Self::Response(code) if code.is_server_error() => Some(false),
            Self::Response(_) => None,
            Self::Timeout => Some(false),
            Self::SendFailed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResultOutcome {
    /// Result arrived when expected
    Delivered,
    /// Result missing or late
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThroughputDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingAction {
    Sent,
    Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeResponseOutcome {
    Correct,
    Incorrect,
    TimedOut,
    /// Challenge could not be issued locally
    LocalFailure,
}

impl ChallengeResponseOutcome {
    pub fn evidence(&self) -> Option<bool> {
        match self {
            Self::Correct => Some(true),
            Self::Incorrect | Self::TimedOut => Some(false),
            Self::LocalFailure => None,
        }
    }
}
