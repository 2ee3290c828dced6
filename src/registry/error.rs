//! Registry error types

/// Error type for registry operations
#[derive(Debug, Clone)]
pub enum RegistryError {
    /// The session's outbound channel is closed; its writer task is gone
    SessionClosed(u64),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::SessionClosed(session_id) => {
                write!(f, "Session {} is closed", session_id)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
