//! TOML-based configuration for hopnet nodes.

use std::path::Path;

use serde::Deserialize;

use hopnet_core::NodeId;
use hopnet_transport::TransportConfig;

use crate::error::NodeError;
use crate::signer::HmacSigner;
use crate::storage::FileStore;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub signing: SigningSection,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }

    /// The transport-level configuration this file describes.
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            gateway: self.node.gateway,
            repeater: self.node.repeater,
            node_id: self.node.node_id.map(NodeId::new),
            parent: self.node.parent.map(NodeId::new),
        }
    }

    /// Open the persistent store this file points at.
    ///
    /// Falls back to the default path (`~/.hopnet/storage`) when the
    /// `[storage]` section gives none.
    pub fn build_store(&self) -> Result<FileStore, NodeError> {
        match &self.storage.path {
            Some(path) => Ok(FileStore::open(Path::new(path))?),
            None => Ok(FileStore::open_default()?),
        }
    }

    /// The signer this file describes, or `None` when no shared secret is
    /// configured and signing stays disabled.
    #[must_use]
    pub fn build_signer(&self) -> Option<HmacSigner> {
        self.signing.secret.as_ref().map(|secret| {
            HmacSigner::new(
                secret.as_bytes(),
                self.signing.peers.iter().copied().map(NodeId::new),
            )
        })
    }
}

/// The `[node]` section.
#[derive(Debug, Default, Deserialize)]
pub struct NodeSection {
    /// Operate as the gateway (address 0).
    #[serde(default)]
    pub gateway: bool,
    /// Relay frames for other nodes.
    #[serde(default)]
    pub repeater: bool,
    /// Static node ID; omit for a controller-assigned ID.
    pub node_id: Option<u8>,
    /// Static parent; omit for dynamic parent search.
    pub parent: Option<u8>,
}

/// The `[storage]` section.
#[derive(Debug, Default, Deserialize)]
pub struct StorageSection {
    /// Custom storage directory. Defaults to `~/.hopnet/storage`.
    pub path: Option<String>,
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON instead of human-readable lines.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// The `[signing]` section.
#[derive(Debug, Default, Deserialize)]
pub struct SigningSection {
    /// Shared secret; signing is disabled when absent.
    pub secret: Option<String>,
    /// Peers whose traffic must be signed.
    #[serde(default)]
    pub peers: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_defaults() {
        let config = NodeConfig::parse("").unwrap();
        assert!(!config.node.gateway);
        assert!(!config.node.repeater);
        assert_eq!(config.node.node_id, None);
        assert_eq!(config.logging.level, "info");
        assert!(config.signing.secret.is_none());

        let tc = config.transport_config();
        assert!(tc.auto_find_parent());
        assert_eq!(tc.node_id, None);
    }

    #[test]
    fn test_full_config() {
        let config = NodeConfig::parse(
            r#"
            [node]
            repeater = true
            node_id = 8
            parent = 0

            [storage]
            path = "/var/lib/hopnet"

            [logging]
            level = "debug"
            json = true

            [signing]
            secret = "shared secret"
            peers = [0]
            "#,
        )
        .unwrap();

        assert!(config.node.repeater);
        assert_eq!(config.storage.path.as_deref(), Some("/var/lib/hopnet"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.signing.peers, vec![0]);

        let tc = config.transport_config();
        assert!(tc.repeater);
        assert_eq!(tc.node_id, Some(NodeId::new(8)));
        assert_eq!(tc.parent, Some(NodeId::GATEWAY));
        assert_eq!(tc.transmission_failures(), 10);
    }

    #[test]
    fn test_gateway_config() {
        let config = NodeConfig::parse("[node]\ngateway = true\n").unwrap();
        assert!(config.transport_config().gateway);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let result = NodeConfig::parse("[node]\nnode_id = \"not a number\"\n");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn test_build_store_uses_configured_path() {
        use hopnet_transport::PersistentStore;

        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::parse(&format!(
            "[storage]\npath = \"{}\"\n",
            dir.path().display()
        ))
        .unwrap();

        let mut store = config.build_store().unwrap();
        store.store_node_id(NodeId::new(7)).unwrap();
        assert!(dir.path().join("transport_state").exists());
    }

    #[test]
    fn test_build_signer_requires_a_secret() {
        let config = NodeConfig::parse("").unwrap();
        assert!(config.build_signer().is_none());
    }

    #[test]
    fn test_build_signer_covers_configured_peers() {
        use hopnet_transport::Signer;

        let config = NodeConfig::parse(
            "[signing]\nsecret = \"shared secret\"\npeers = [0, 3]\n",
        )
        .unwrap();

        let signer = config.build_signer().expect("secret is configured");
        assert!(signer.required(NodeId::GATEWAY));
        assert!(signer.required(NodeId::new(3)));
        assert!(!signer.required(NodeId::new(9)));
    }
}
