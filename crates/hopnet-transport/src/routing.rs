//! Learned next-hop routing table with write-through persistence.
//!
//! The table maps final destinations to the neighbor a frame should be
//! handed to. Entries are learned opportunistically from observed traffic
//! and written through to the persistent store so the topology survives a
//! restart; the store itself is keyed per destination, so entries are
//! pulled in lazily on first lookup. Entries are never expired, only
//! overwritten.

use std::collections::HashMap;

use hopnet_core::NodeId;

use crate::traits::PersistentStore;

/// Destination → next-hop table.
#[derive(Debug, Default)]
#[must_use]
pub struct RoutingTable {
    entries: HashMap<NodeId, NodeId>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The stored next hop for `destination`, if one is known.
    ///
    /// Consults the in-memory map first and falls back to the store,
    /// caching whatever it finds.
    pub fn stored<S: PersistentStore>(
        &mut self,
        store: &mut S,
        destination: NodeId,
    ) -> Option<NodeId> {
        if let Some(&hop) = self.entries.get(&destination) {
            return Some(hop);
        }
        match store.load_route(destination) {
            Ok(Some(hop)) => {
                self.entries.insert(destination, hop);
                Some(hop)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%destination, error = %e, "route load failed");
                None
            }
        }
    }

    /// Next hop for `destination`, or `parent` when no route is known.
    pub fn lookup<S: PersistentStore>(
        &mut self,
        store: &mut S,
        destination: NodeId,
        parent: NodeId,
    ) -> NodeId {
        self.stored(store, destination).unwrap_or(parent)
    }

    /// Record that frames from `sender` arrive via `last_hop`.
    ///
    /// Broadcast addresses and the node's own traffic are never recorded.
    /// Re-learning an unchanged entry skips the store write.
    pub fn learn<S: PersistentStore>(
        &mut self,
        store: &mut S,
        sender: NodeId,
        last_hop: NodeId,
        self_id: NodeId,
    ) {
        if sender.is_broadcast() || last_hop.is_broadcast() || sender == self_id {
            return;
        }
        if self.entries.get(&sender) == Some(&last_hop) {
            return;
        }
        tracing::debug!(%sender, %last_hop, "route learned");
        self.entries.insert(sender, last_hop);
        if let Err(e) = store.store_route(sender, last_hop) {
            tracing::warn!(%sender, error = %e, "route store failed");
        }
    }

    /// Drop all entries, in memory and in the store.
    pub fn clear<S: PersistentStore>(&mut self, store: &mut S) {
        self.entries.clear();
        if let Err(e) = store.clear_routes() {
            tracing::warn!(error = %e, "clearing stored routes failed");
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    const SELF_ID: NodeId = NodeId::new(10);
    const PARENT: NodeId = NodeId::new(1);

    #[test]
    fn test_lookup_falls_back_to_parent() {
        let mut store = MemoryStore::new();
        let mut table = RoutingTable::new();
        assert_eq!(table.lookup(&mut store, NodeId::new(42), PARENT), PARENT);
    }

    #[test]
    fn test_learn_then_lookup() {
        let mut store = MemoryStore::new();
        let mut table = RoutingTable::new();
        table.learn(&mut store, NodeId::new(42), NodeId::new(7), SELF_ID);
        assert_eq!(
            table.lookup(&mut store, NodeId::new(42), PARENT),
            NodeId::new(7)
        );
    }

    #[test]
    fn test_learn_overwrites() {
        let mut store = MemoryStore::new();
        let mut table = RoutingTable::new();
        table.learn(&mut store, NodeId::new(42), NodeId::new(7), SELF_ID);
        table.learn(&mut store, NodeId::new(42), NodeId::new(8), SELF_ID);
        assert_eq!(table.stored(&mut store, NodeId::new(42)), Some(NodeId::new(8)));
        assert_eq!(store.routes.get(&NodeId::new(42)), Some(&NodeId::new(8)));
    }

    #[test]
    fn test_never_stores_broadcast() {
        let mut store = MemoryStore::new();
        let mut table = RoutingTable::new();
        table.learn(&mut store, NodeId::BROADCAST, NodeId::new(7), SELF_ID);
        table.learn(&mut store, NodeId::new(42), NodeId::BROADCAST, SELF_ID);
        assert!(table.is_empty());
        assert!(store.routes.is_empty());
    }

    #[test]
    fn test_own_traffic_not_recorded() {
        let mut store = MemoryStore::new();
        let mut table = RoutingTable::new();
        table.learn(&mut store, SELF_ID, NodeId::new(7), SELF_ID);
        assert!(table.is_empty());
    }

    #[test]
    fn test_lazy_load_from_store() {
        let mut store = MemoryStore::new();
        store.routes.insert(NodeId::new(42), NodeId::new(9));
        let mut table = RoutingTable::new();
        assert_eq!(table.stored(&mut store, NodeId::new(42)), Some(NodeId::new(9)));
        // now cached
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unchanged_entry_skips_store_write() {
        let mut store = MemoryStore::new();
        let mut table = RoutingTable::new();
        table.learn(&mut store, NodeId::new(42), NodeId::new(7), SELF_ID);
        let writes_before = store.route_writes;
        table.learn(&mut store, NodeId::new(42), NodeId::new(7), SELF_ID);
        assert_eq!(store.route_writes, writes_before);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut store = MemoryStore::new();
        let mut table = RoutingTable::new();
        table.learn(&mut store, NodeId::new(42), NodeId::new(7), SELF_ID);
        table.clear(&mut store);
        assert!(table.is_empty());
        assert!(store.routes.is_empty());
        assert_eq!(table.lookup(&mut store, NodeId::new(42), PARENT), PARENT);
    }
}
