use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilltraceError>;

#[derive(Error, Debug)]
pub enum FilltraceError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    #[error("Invalid signature '{0}'")]
    InvalidSignature(String),

    #[error("Transaction {0} has no metadata")]
    MissingMetadata(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Layout table error: {0}")]
    Layout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FilltraceError {
    /// Classify a raw client error message, mapping rate-limit responses to
    /// [`FilltraceError::RateLimited`] and everything else to [`FilltraceError::Rpc`].
    pub fn from_rpc_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
        {
            Self::RateLimited(message)
        } else {
            Self::Rpc(message)
        }
    }

    /// Only rate-limit responses are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Short label used to bucket failures in the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate_limited",
            Self::Rpc(_) => "rpc",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::MissingMetadata(_) => "missing_metadata",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Layout(_) => "layout",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_messages_are_transient() {
        for msg in [
            "HTTP status client error (429 Too Many Requests)",
            "Rate limit exceeded",
            "too many requests for a specific RPC call",
        ] {
            let err = FilltraceError::from_rpc_message(msg);
            assert!(err.is_transient(), "{msg} should be transient");
            assert_eq!(err.kind(), "rate_limited");
        }
    }

    #[test]
    fn test_other_messages_are_not_transient() {
        let err = FilltraceError::from_rpc_message("Transaction version (0) is not supported");
        assert!(!err.is_transient());
        assert_eq!(err.kind(), "rpc");

        let exhausted = FilltraceError::RetryExhausted {
            attempts: 4,
            last_error: "429".to_string(),
        };
        assert!(!exhausted.is_transient());
    }
}
