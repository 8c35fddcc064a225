use std::path::PathBuf;

/// Local failure reading an image attachment. Callers continue text-only.
#[derive(thiserror::Error, Debug)]
#[error("Failed to read attachment {}: {source}", .path.display())]
pub struct AttachmentReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Failure talking to the completion provider.
///
/// Every pipeline operation catches this at its boundary and substitutes
/// its documented fallback value.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("No API key configured for the completion provider")]
    MissingCredential,

    #[error("Strict JSON output cannot be combined with tool capabilities")]
    IncompatibleOptions,

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Authentication rejected (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Rate limited or out of quota (retry after {retry_after_secs:?}s): {message}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        message: String,
    },

    #[error("Provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_attachment_read_error() {
        let err = AttachmentReadError {
            path: PathBuf::from("/tmp/invite.png"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to read attachment /tmp/invite.png: no such file"
        );
    }

    #[test]
    fn test_display_auth() {
        let err = ProviderError::Auth {
            status: 403,
            message: "API key not valid".into(),
        };
        assert_eq!(
            err.to_string(),
            "Authentication rejected (HTTP 403): API key not valid"
        );
    }

    #[test]
    fn test_display_rate_limited() {
        let err = ProviderError::RateLimited {
            retry_after_secs: Some(30),
            message: "quota".into(),
        };
        assert_eq!(
            err.to_string(),
            "Rate limited or out of quota (retry after Some(30)s): quota"
        );
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProviderError>();
        assert_send_sync::<AttachmentReadError>();
    }
}
