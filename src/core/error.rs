use thiserror::Error;

/// Tag identifying which family an error belongs to, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidDestination,
    InvalidSelector,
    IllegalState,
    TransactionRolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JmsError {
    /// Destination was absent or does not name a declared queue.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// Selector string could not be parsed.
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Operation not allowed in the current session/handle state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Commit could not be applied; the unit of work was rolled back instead.
    #[error("transaction rolled back: {0}")]
    TransactionRolledBack(String),
}

impl JmsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JmsError::InvalidDestination(_) => ErrorKind::InvalidDestination,
            JmsError::InvalidSelector { .. } => ErrorKind::InvalidSelector,
            JmsError::IllegalState(_) => ErrorKind::IllegalState,
            JmsError::TransactionRolledBack(_) => ErrorKind::TransactionRolledBack,
        }
    }

    pub(crate) fn closed(what: &str) -> Self {
        JmsError::IllegalState(format!("{what} is closed"))
    }

    pub(crate) fn unknown_queue(name: &str) -> Self {
        JmsError::InvalidDestination(format!("queue '{name}' does not exist"))
    }

    pub(crate) fn missing_destination() -> Self {
        JmsError::InvalidDestination("destination is null".to_string())
    }
}

pub type Result<T> = std::result::Result<T, JmsError>;
