use thiserror::Error;

/// Failures talking to the mail service.
///
/// Every variant is handled the same way by the poll loop: log, drop the
/// cached session and wait for the next tick.
#[derive(Debug, Error)]
pub enum MailError {
    /// Credentials missing, expired or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network unreachable, DNS failure, connection reset.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// The provider answered with an error status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The provider answered but the payload was not what we expected.
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl MailError {
    pub fn is_auth(&self) -> bool {
        matches!(self, MailError::Auth(_))
    }
}

impl From<reqwest::Error> for MailError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MailError::Timeout(e.to_string())
        } else if e.is_decode() {
            MailError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            MailError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            MailError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for MailError {
    fn from(e: serde_json::Error) -> Self {
        MailError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_status() {
        let e = MailError::Api {
            status: 404,
            message: "Requested entity was not found.".into(),
        };
        assert_eq!(
            e.to_string(),
            "api error (404): Requested entity was not found."
        );
        assert!(!e.is_auth());
        assert!(MailError::Auth("expired".into()).is_auth());
    }
}
