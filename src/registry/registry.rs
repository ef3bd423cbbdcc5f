use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::session::Identity;

use super::ConnectionHandle;

/// Tracks all live connections and the room (connection set) of each identity.
///
/// Bidirectional map: `connections` is the source of truth, `rooms` is an
/// index. Every room read resolves ids back through `connections`, so a
/// lookup can never observe a connection that has already been torn down.
/// Constructed once at server start and injected; never a global.
pub struct ConnectionRegistry {
    /// connection_id -> handle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    /// identity -> set of connection ids (multiple tabs/devices per user)
    rooms: DashMap<Identity, HashSet<Uuid>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Bind a connection to its identity.
    ///
    /// Idempotent for the same (connection, identity) pair. Re-registering a
    /// connection id under a different identity replaces the binding; that
    /// should not happen mid-life and is logged as anomalous, but it must not
    /// corrupt the maps.
    pub fn register(&self, handle: Arc<ConnectionHandle>) {
        let connection_id = handle.id;

        if let Some(previous) = self.connections.insert(connection_id, handle.clone()) {
            if previous.identity == handle.identity {
                tracing::debug!(connection_id = %connection_id, "Connection already registered");
                return;
            }

            tracing::warn!(
                connection_id = %connection_id,
                old_identity = %previous.identity,
                new_identity = %handle.identity,
                "Connection re-registered under a different identity; replacing binding"
            );
            self.remove_from_room(&previous.identity, connection_id);
        }

        self.rooms
            .entry(handle.identity.clone())
            .or_default()
            .insert(connection_id);

        // A concurrent unregister may have raced between the connections
        // insert and the room update; its room cleanup would have found
        // nothing to remove, so re-check and back out the room entry here.
        if !self.connections.contains_key(&connection_id) {
            self.remove_from_room(&handle.identity, connection_id);
            tracing::debug!(
                connection_id = %connection_id,
                "Connection unregistered while registering"
            );
            return;
        }

        tracing::info!(
            connection_id = %connection_id,
            identity = %handle.identity,
            "Connection registered"
        );
    }

    /// Remove a connection unconditionally. A no-op for unknown or already
    /// removed connections; disconnect races are expected.
    pub fn unregister(&self, connection_id: Uuid) {
        let Some((_, handle)) = self.connections.remove(&connection_id) else {
            tracing::debug!(connection_id = %connection_id, "Unregister for unknown connection");
            return;
        };

        self.remove_from_room(&handle.identity, connection_id);

        tracing::info!(
            connection_id = %connection_id,
            identity = %handle.identity,
            "Connection unregistered"
        );
    }

    /// Current room for an identity: empty (not an error) when offline.
    pub fn connections_for(&self, identity: &Identity) -> Vec<Arc<ConnectionHandle>> {
        self.rooms
            .get(identity)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.connections.get(id).map(|h| h.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn identity_for(&self, connection_id: Uuid) -> Option<Identity> {
        self.connections
            .get(&connection_id)
            .map(|handle| handle.identity.clone())
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_connections: self.connections.len(),
            unique_identities: self.rooms.len(),
        }
    }

    fn remove_from_room(&self, identity: &Identity, connection_id: Uuid) {
        if let Some(mut room) = self.rooms.get_mut(identity) {
            room.remove(&connection_id);
        }
        // Atomic drop of the room entry the moment it empties; a concurrent
        // register for the same identity keeps the entry alive.
        self.rooms.remove_if(identity, |_, room| room.is_empty());
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistryStats {
    pub total_connections: usize,
    pub unique_identities: usize,
}
