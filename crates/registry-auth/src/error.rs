//! Error types for authentication operations

/// Errors from authentication operations.
///
/// `Clone` so a single refresh outcome can be delivered to every request
/// queued behind it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Terminal for the current request chain: no token could be obtained.
    /// Displays [`AUTH_REQUIRED_MESSAGE`](crate::constants::AUTH_REQUIRED_MESSAGE).
    #[error("Authentication required. Please log in again.")]
    AuthRequired,

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("login failed: {0}")]
    Login(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token store error: {0}")]
    Store(String),
}

impl Error {
    /// Whether the caller must sign in before anything else can succeed.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::AuthRequired)
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
