//! Coordinator error types

use thiserror::Error;

use super::table::PeerId;

/// Errors raised synchronously to the caller of `register` or `configure`
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Invalid origin: {origin:?} (must be non-empty and contain a '.')")]
    InvalidOrigin { origin: String },

    #[error("Origin already registered: {origin}")]
    DuplicateOrigin { origin: String },

    #[error("Unknown dependency: {id}")]
    UnknownDependency { id: PeerId },

    #[error("Coordinator own origin not configured")]
    NotConfigured,

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Coordinator channel closed")]
    ChannelClosed,
}

/// Errors from the channel provider boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Peer channel closed")]
    Closed,

    #[error("Peer channel to {origin} is full")]
    Full { origin: String },

    #[error("Failed to open channel to {origin}: {reason}")]
    Open { origin: String, reason: String },
}

/// Protocol violations seen at the channel boundary
///
/// These never reach callers. They are logged, counted and the message is dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Message from untrusted origin: {origin}")]
    UntrustedOrigin { origin: String },
}

/// Check the origin shape accepted by the coordinator
pub fn validate_origin(origin: &str) -> Result<(), CoordinatorError> {
    if origin.trim().is_empty() || !origin.contains('.') {
        return Err(CoordinatorError::InvalidOrigin {
            origin: origin.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_origin() {
        assert!(validate_origin("https://auth.example.com").is_ok());
        assert!(validate_origin("example.org").is_ok());

        assert!(matches!(
            validate_origin(""),
            Err(CoordinatorError::InvalidOrigin { .. })
        ));
        assert!(matches!(
            validate_origin("localhost"),
            Err(CoordinatorError::InvalidOrigin { .. })
        ));
        assert!(validate_origin("   ").is_err());
    }

    #[test]
    fn test_unknown_dependency_message() {
        let err = CoordinatorError::UnknownDependency { id: PeerId::from_raw(42) };
        assert!(err.to_string().contains("peer-42"));
    }

    #[test]
    fn test_channel_error_converts() {
        let err: CoordinatorError = ChannelError::Open {
            origin: "https://a.example.com".to_string(),
            reason: "refused".to_string(),
        }
        .into();

        let msg = err.to_string();
        assert!(msg.contains("a.example.com"));
        assert!(msg.contains("refused"));
    }
}
