use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] registry_client::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl Error {
    /// Whether the session is gone and the user must sign in again.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Client(e) if e.is_auth_error())
    }

    /// Backend status for non-success responses.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Client(registry_client::Error::Transport(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = Error::Status {
            status: StatusCode::NOT_FOUND,
            body: r#"{"message":"pet not found"}"#.into(),
        };
        assert_eq!(
            err.to_string(),
            r#"backend returned 404 Not Found: {"message":"pet not found"}"#
        );
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(!err.is_auth_error());
    }

    #[test]
    fn auth_errors_are_recognized_through_client() {
        let err = Error::from(registry_client::Error::from(
            registry_auth::Error::AuthRequired,
        ));
        assert!(err.is_auth_error());
        assert_eq!(err.status(), None);
    }
}
