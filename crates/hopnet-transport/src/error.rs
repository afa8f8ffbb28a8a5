//! Transport error types.

use hopnet_core::{NodeId, WireError};

/// Errors surfaced to the caller from the public send path.
///
/// Everything that goes wrong inside `process` is recovered locally:
/// dropped frames are logged and counted, and repeated failures escalate
/// through the state machine rather than through return values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("transport not ready")]
    NotReady,

    #[error("parent search active")]
    ParentSearchActive,

    #[error("link-layer send to node {0} failed")]
    LinkFailed(NodeId),

    #[error("message signing failed")]
    SigningFailed,

    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SendError::NotReady.to_string(), "transport not ready");
        assert_eq!(
            SendError::LinkFailed(NodeId::new(3)).to_string(),
            "link-layer send to node 3 failed"
        );
    }

    #[test]
    fn test_from_wire_error() {
        let we = WireError::PayloadTooLong {
            max: 25,
            actual: 30,
        };
        let se: SendError = we.into();
        assert!(matches!(se, SendError::Wire(_)));
    }
}
