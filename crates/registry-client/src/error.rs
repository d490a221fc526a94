//! Error types for client operations

/// Errors from authenticated requests.
///
/// Non-401 responses are not errors: they come back as `Ok(Response)` with
/// whatever status the backend sent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] registry_auth::Error),

    /// Transport failure of the caller's own request, passed through as-is.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Whether the caller must sign in again.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(e) if e.is_auth_error())
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
