//! User identity established at authentication time

/// Identity carried by a verified token, attached to a session for its
/// whole lifetime. Not mutable mid-session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque numeric identifier from the credential service
    pub user_id: i64,
    /// Display name shown to other room members
    pub username: String,
}

impl Identity {
    pub fn new(user_id: i64, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.username)
    }
}
