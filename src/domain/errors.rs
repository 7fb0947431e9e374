use thiserror::Error;

/// Classified failure shared by the remote client, the query cache and the
/// mutation controller.
///
/// Cloneable so it can be stored inside cache entries and mutation state and
/// handed to every observer of a key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    /// No response was received (connect failure, reset, timeout).
    #[error("Network error: {reason}")]
    NetworkError { reason: String },

    /// The service rejected the bearer credential, or none was available.
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// The response (or a derived value) violates the expected contract.
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("A submission is already pending")]
    AlreadyPending,
}

impl DashboardError {
    pub fn network(reason: impl Into<String>) -> Self {
        Self::NetworkError {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Short, non-technical message for inline display in a dashboard section.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NetworkError { .. } => "Service unreachable",
            Self::Unauthorized { .. } => "Not authorized, sign in again",
            Self::ServerError { .. } => "The service reported an error",
            Self::MalformedPayload { .. } => "Received unexpected data",
            Self::AlreadyPending => "Submission in progress",
        }
    }

    /// Failures worth retrying when a retry policy is configured.
    ///
    /// Auth rejections, contract violations and client-side 4xx never improve
    /// on a second attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError { .. } => true,
            Self::ServerError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
