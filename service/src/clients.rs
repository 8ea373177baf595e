//! Registry of active downstream clients.
//!
//! A client is "active" while its last poll is within the TTL. Expired
//! entries are pruned lazily whenever the active set is snapshotted;
//! there is no background sweep. The registry is not internally
//! synchronized — the orchestrator owns it under its state lock.

use std::collections::HashMap;
use std::time::Duration;

use remconf_protocol::Client;
use tokio::time::Instant;

struct TrackedClient {
    client: Client,
    last_seen: Instant,
}

pub struct ClientRegistry {
    ttl: Duration,
    clients: HashMap<String, TrackedClient>,
}

impl ClientRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            clients: HashMap::new(),
        }
    }

    /// Upsert a client record with `last_seen = now`. Always succeeds.
    pub fn seen(&mut self, client: &Client) {
        self.clients.insert(
            client.id.clone(),
            TrackedClient {
                client: client.clone(),
                last_seen: Instant::now(),
            },
        );
    }

    /// Whether a record exists with `last_seen` within the TTL.
    pub fn is_active(&self, client_id: &str) -> bool {
        self.clients
            .get(client_id)
            .is_some_and(|tracked| tracked.last_seen.elapsed() <= self.ttl)
    }

    /// Snapshot of all non-expired clients, pruning expired entries.
    pub fn active_clients(&mut self) -> Vec<Client> {
        let ttl = self.ttl;
        self.clients
            .retain(|_, tracked| tracked.last_seen.elapsed() <= ttl);
        self.clients
            .values()
            .map(|tracked| tracked.client.clone())
            .collect()
    }
}
