//! Init-time transport configuration.

use hopnet_core::NodeId;

use crate::constants::{TRANSMISSION_FAILURES, TRANSMISSION_FAILURES_REPEATER};

/// Fixed node role and identity configuration.
///
/// `None` for `node_id` means the ID is requested from the controller
/// during startup; `None` for `parent` means the parent is found by
/// broadcasting into the mesh.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct TransportConfig {
    /// Node operates as the gateway (address 0, no parent search, no ID
    /// acquisition).
    pub gateway: bool,
    /// Node relays frames for others and re-broadcasts controlled floods.
    pub repeater: bool,
    /// Statically configured node ID.
    pub node_id: Option<NodeId>,
    /// Statically configured parent.
    pub parent: Option<NodeId>,
}

impl TransportConfig {
    /// Configuration for a plain leaf node with dynamic ID and parent.
    pub fn leaf() -> Self {
        Self::default()
    }

    /// Configuration for the gateway.
    pub fn gateway() -> Self {
        Self {
            gateway: true,
            ..Self::default()
        }
    }

    /// Whether the parent is found dynamically.
    #[must_use]
    pub fn auto_find_parent(&self) -> bool {
        self.parent.is_none()
    }

    /// Failed uplink transmissions tolerated before leaving READY.
    #[must_use]
    pub fn transmission_failures(&self) -> u8 {
        if self.repeater {
            TRANSMISSION_FAILURES_REPEATER
        } else {
            TRANSMISSION_FAILURES
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeater_raises_failure_threshold() {
        assert_eq!(TransportConfig::leaf().transmission_failures(), 5);
        let repeater = TransportConfig {
            repeater: true,
            ..TransportConfig::default()
        };
        assert_eq!(repeater.transmission_failures(), 10);
    }

    #[test]
    fn test_static_parent_disables_search() {
        let mut config = TransportConfig::leaf();
        assert!(config.auto_find_parent());
        config.parent = Some(NodeId::new(12));
        assert!(!config.auto_find_parent());
    }
}
