//! File-backed persistent store.
//!
//! Persists the node's identity, parent, and learned routes in a single
//! `postcard`-encoded snapshot. Writes go to a `.tmp` file and are
//! renamed into place, so a crash mid-write never corrupts the stored
//! state. Every mutating port operation persists before returning, which
//! gives the transport the durable-on-return guarantee it expects.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hopnet_core::constants::DISTANCE_INVALID;
use hopnet_core::NodeId;
use hopnet_transport::PersistentStore;

/// File name of the state snapshot.
const STATE_FILE: &str = "transport_state";

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("failed to determine storage directory: {0}")]
    Directory(String),
}

/// On-disk representation of the stored state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredState {
    node_id: Option<u8>,
    parent: Option<(u8, u8)>,
    routes: Vec<(u8, u8)>,
}

/// Persistent store keeping everything in one snapshot file.
pub struct FileStore {
    path: PathBuf,
    state: StoredState,
}

impl FileStore {
    /// Open (or create) a store under `dir`.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(STATE_FILE);
        let state = match fs::read(&path) {
            Ok(bytes) => postcard::from_bytes(&bytes)
                .map_err(|e| StorageError::Deserialize(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredState::default(),
            Err(e) => return Err(StorageError::Io(e)),
        };
        Ok(Self { path, state })
    }

    /// Open the store at the default path (`~/.hopnet/storage`).
    pub fn open_default() -> Result<Self, StorageError> {
        let home = dirs::home_dir()
            .ok_or_else(|| StorageError::Directory("could not determine home directory".into()))?;
        Self::open(&home.join(".hopnet").join("storage"))
    }

    fn persist(&self) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(&self.state)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.atomic_write(&bytes)
    }

    /// Write data atomically: write to a `.tmp` file then rename.
    fn atomic_write(&self, data: &[u8]) -> Result<(), StorageError> {
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl PersistentStore for FileStore {
    type Error = StorageError;

    fn load_node_id(&mut self) -> Result<NodeId, StorageError> {
        Ok(self.state.node_id.map_or(NodeId::AUTO, NodeId::new))
    }

    fn store_node_id(&mut self, id: NodeId) -> Result<(), StorageError> {
        self.state.node_id = Some(id.raw());
        self.persist()
    }

    fn load_parent(&mut self) -> Result<(NodeId, u8), StorageError> {
        Ok(self
            .state
            .parent
            .map_or((NodeId::AUTO, DISTANCE_INVALID), |(parent, distance)| {
                (NodeId::new(parent), distance)
            }))
    }

    fn store_parent(&mut self, parent: NodeId, distance: u8) -> Result<(), StorageError> {
        self.state.parent = Some((parent.raw(), distance));
        self.persist()
    }

    fn load_route(&mut self, destination: NodeId) -> Result<Option<NodeId>, StorageError> {
        Ok(self
            .state
            .routes
            .iter()
            .find(|(dest, _)| *dest == destination.raw())
            .map(|(_, hop)| NodeId::new(*hop)))
    }

    fn store_route(&mut self, destination: NodeId, next_hop: NodeId) -> Result<(), StorageError> {
        match self
            .state
            .routes
            .iter_mut()
            .find(|(dest, _)| *dest == destination.raw())
        {
            Some(entry) => entry.1 = next_hop.raw(),
            None => self.state.routes.push((destination.raw(), next_hop.raw())),
        }
        self.persist()
    }

    fn clear_routes(&mut self) -> Result<(), StorageError> {
        self.state.routes.clear();
        self.persist()
    }
}
