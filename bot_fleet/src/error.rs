use thiserror::Error;

/// Session collaborator failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invocation of `{procedure}` failed: {reason}")]
    Invocation { procedure: String, reason: String },
}

impl SessionError {
    pub fn invocation(procedure: &str, reason: impl Into<String>) -> Self {
        SessionError::Invocation {
            procedure: procedure.to_string(),
            reason: reason.into(),
        }
    }
}

/// Rejected reconfiguration. The previous value is always retained.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: i64 },

    #[error("unknown movement pattern: {0}")]
    UnknownPattern(String),
}

#[derive(Error, Debug)]
pub enum FleetError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("fleet is at capacity ({capacity} bots)")]
    CapacityReached { capacity: usize },

    #[error("spawn of bot {id} was cancelled by a fleet stop")]
    Cancelled { id: String },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Actor mailbox error: {0}")]
    Mailbox(#[from] actix::MailboxError),
}
