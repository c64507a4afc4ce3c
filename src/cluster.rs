//! Cluster Module
//!
//! Routes Get/Set/Delete across a set of per-node [`Engine`]s via a
//! consistent-hash [`HashRing`], and rebalances the ring's memtable-resident
//! keys after every membership change.
//!
//! ## Known limitation
//!
//! Rebalance migrates only each node's in-memory working set (the
//! memtable); records already flushed to SSTable stay on their original
//! node until a later write or compaction touches them. A production
//! implementation would additionally stream matching SSTable records to the
//! new owner.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{RidgeError, Result};
use crate::ring::HashRing;

/// Lifecycle of a single cluster member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Accepting reads and writes, participates in the ring.
    Running,
    /// Removed from the ring; finishing outbound migrations before it can
    /// be dropped.
    Draining,
    /// Fully removed; no longer addressable.
    Stopped,
}

/// One cluster member: an address, its storage engine, and its lifecycle state.
pub struct Node {
    addr: String,
    engine: Arc<Engine>,
    state: NodeState,
}

impl Node {
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }
}

/// A single key-value pair carried by a migration, stamped with the
/// timestamp it held on the source node so the destination's insert
/// preserves last-writer-wins semantics instead of re-stamping on arrival.
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub tombstone: bool,
    pub timestamp: u32,
}

/// Per-key outcome of a migration attempt.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub key: Vec<u8>,
    pub success: bool,
}

/// Abstracts the network transport a real deployment would use to ship
/// migrated records to another node (gRPC, HTTP, or any other RPC
/// mechanism). Kept out of scope here the same way `network`/`protocol`
/// only speak to a single node's engine.
pub trait MigrationTransport: Send + Sync {
    fn send(
        &self,
        dst_addr: &str,
        records: &[MigrationRecord],
    ) -> Result<Vec<MigrationOutcome>>;
}

/// In-process transport used when every node lives in the same cluster
/// instance: inserts records directly into the destination engine's
/// memtable rather than going over a socket.
pub struct InProcessTransport {
    nodes: Arc<RwLock<HashMap<String, Arc<Engine>>>>,
}

impl InProcessTransport {
    pub fn new(nodes: Arc<RwLock<HashMap<String, Arc<Engine>>>>) -> Self {
        Self { nodes }
    }
}

impl MigrationTransport for InProcessTransport {
    fn send(
        &self,
        dst_addr: &str,
        records: &[MigrationRecord],
    ) -> Result<Vec<MigrationOutcome>> {
        let nodes = self
            .nodes
            .read()
            .map_err(|e| RidgeError::LockPoisoned(format!("cluster nodes lock poisoned: {e}")))?;

        let engine = nodes
            .get(dst_addr)
            .ok_or_else(|| RidgeError::Ring(format!("unknown migration destination {dst_addr}")))?;

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let result = if record.tombstone {
                engine.delete(&record.key)
            } else {
                engine.put(&record.key, &record.value)
            };
            outcomes.push(MigrationOutcome {
                key: record.key.clone(),
                success: result.is_ok(),
            });
        }
        Ok(outcomes)
    }
}

/// A cluster of nodes sharing one consistent-hash ring.
pub struct Cluster {
    nodes: Arc<RwLock<HashMap<String, Arc<Engine>>>>,
    states: RwLock<HashMap<String, NodeState>>,
    ring: RwLock<HashRing>,
    transport: Box<dyn MigrationTransport>,
    migration_deadline: Duration,
    migration_max_retries: u32,
}

impl Cluster {
    /// An empty cluster using the in-process migration transport.
    pub fn new(virtual_nodes_per_node: usize, migration_deadline_ms: u64, migration_max_retries: u32) -> Self {
        let nodes: Arc<RwLock<HashMap<String, Arc<Engine>>>> = Arc::new(RwLock::new(HashMap::new()));
        let transport = Box::new(InProcessTransport::new(nodes.clone()));
        Self {
            nodes,
            states: RwLock::new(HashMap::new()),
            ring: RwLock::new(HashRing::new(virtual_nodes_per_node)),
            transport,
            migration_deadline: Duration::from_millis(migration_deadline_ms),
            migration_max_retries,
        }
    }

    /// Build a cluster from a `Config`, reading the ring/migration
    /// parameters off it.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.virtual_nodes_per_node,
            config.migration_deadline_ms,
            config.migration_max_retries,
        )
    }

    /// Replace the migration transport, e.g. with a real network client in
    /// a deployment that spans processes.
    pub fn with_transport(mut self, transport: Box<dyn MigrationTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Add a fresh node at `addr`, owning `engine`, and rebalance the ring.
    pub fn add_node(&self, addr: impl Into<String>, engine: Arc<Engine>) -> Result<()> {
        let addr = addr.into();

        let old_ring = {
            let mut nodes = self
                .nodes
                .write()
                .map_err(|e| RidgeError::LockPoisoned(format!("cluster nodes lock poisoned: {e}")))?;
            nodes.insert(addr.clone(), engine);

            let mut states = self
                .states
                .write()
                .map_err(|e| RidgeError::LockPoisoned(format!("cluster states lock poisoned: {e}")))?;
            states.insert(addr.clone(), NodeState::Running);

            let mut ring = self
                .ring
                .write()
                .map_err(|e| RidgeError::LockPoisoned(format!("ring lock poisoned: {e}")))?;
            let old_ring = ring.clone();
            ring.add_node(&addr);
            old_ring
        };

        info!(node = %addr, "added node to cluster");
        self.rebalance(&old_ring)
    }

    /// Remove `addr` from the ring: it moves to `Draining`, rebalance runs
    /// to migrate its memtable out, then it moves to `Stopped`.
    pub fn remove_node(&self, addr: &str) -> Result<()> {
        let old_ring = {
            let mut states = self
                .states
                .write()
                .map_err(|e| RidgeError::LockPoisoned(format!("cluster states lock poisoned: {e}")))?;
            states.insert(addr.to_string(), NodeState::Draining);

            let mut ring = self
                .ring
                .write()
                .map_err(|e| RidgeError::LockPoisoned(format!("ring lock poisoned: {e}")))?;
            let old_ring = ring.clone();
            ring.remove_node(addr)?;
            old_ring
        };

        self.rebalance(&old_ring)?;

        let mut states = self
            .states
            .write()
            .map_err(|e| RidgeError::LockPoisoned(format!("cluster states lock poisoned: {e}")))?;
        states.insert(addr.to_string(), NodeState::Stopped);

        let mut nodes = self
            .nodes
            .write()
            .map_err(|e| RidgeError::LockPoisoned(format!("cluster nodes lock poisoned: {e}")))?;
        nodes.remove(addr);

        info!(node = %addr, "removed node from cluster");
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.route(key)?.get(key)
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.route(key)?.put(key, value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.route(key)?.delete(key)
    }

    fn route(&self, key: &[u8]) -> Result<Arc<Engine>> {
        let owner = {
            let ring = self
                .ring
                .read()
                .map_err(|e| RidgeError::LockPoisoned(format!("ring lock poisoned: {e}")))?;
            ring.node_for(key)
                .map(String::from)
                .ok_or_else(|| RidgeError::Ring("cluster has no nodes".to_string()))?
        };

        let nodes = self
            .nodes
            .read()
            .map_err(|e| RidgeError::LockPoisoned(format!("cluster nodes lock poisoned: {e}")))?;
        nodes
            .get(&owner)
            .cloned()
            .ok_or_else(|| RidgeError::Ring(format!("ring points to unknown node {owner}")))
    }

    /// Per spec: for each node, snapshot its memtable, split entries by
    /// whether `new_ring.node_for(key)` still names that node, remove the
    /// relocated ones locally, then ship each (src, dst) batch out.
    fn rebalance(&self, old_ring: &HashRing) -> Result<()> {
        let nodes = self
            .nodes
            .read()
            .map_err(|e| RidgeError::LockPoisoned(format!("cluster nodes lock poisoned: {e}")))?;
        let new_ring = self
            .ring
            .read()
            .map_err(|e| RidgeError::LockPoisoned(format!("ring lock poisoned: {e}")))?
            .clone();

        // (src, dst) -> records to migrate
        let mut batches: HashMap<(String, String), Vec<MigrationRecord>> = HashMap::new();

        for (src_addr, engine) in nodes.iter() {
            for record in engine.memtable_snapshot() {
                let dst_addr = match new_ring.node_for(&record.key) {
                    Some(addr) => addr.to_string(),
                    None => continue,
                };
                if &dst_addr == src_addr {
                    continue;
                }
                // Only migrate keys this node actually owned under the old
                // ring; a key that already belonged elsewhere before this
                // change is not this node's responsibility to ship.
                if old_ring.node_for(&record.key).map(str::to_string).as_deref()
                    != Some(src_addr.as_str())
                {
                    continue;
                }

                batches
                    .entry((src_addr.clone(), dst_addr))
                    .or_default()
                    .push(MigrationRecord {
                        key: record.key,
                        value: record.value,
                        tombstone: record.header.tombstone,
                        timestamp: record.header.timestamp,
                    });
            }
        }

        for ((src_addr, dst_addr), records) in &batches {
            let src_engine = nodes.get(src_addr).cloned();

            // Step 2: remove migrated keys from the source memtable before
            // attempting to ship them, per spec — durability of the delete
            // does not depend on the migration succeeding.
            if let Some(engine) = &src_engine {
                for record in records {
                    engine.memtable_remove(&record.key);
                }
            }

            // Step 3: ship the batch, retrying with backoff up to the
            // configured bound.
            let outcomes = self.send_with_retry(dst_addr, records);

            let failed: Vec<&MigrationRecord> = records
                .iter()
                .zip(outcomes.iter())
                .filter(|(_, outcome)| !outcome.success)
                .map(|(record, _)| record)
                .collect();

            if !failed.is_empty() {
                warn!(
                    src = %src_addr,
                    dst = %dst_addr,
                    failed = failed.len(),
                    total = records.len(),
                    "migration exhausted retries for some keys; re-inserting on source"
                );
                if let Some(engine) = &src_engine {
                    for record in &failed {
                        if record.tombstone {
                            let _ = engine.delete(&record.key);
                        } else {
                            let _ = engine.put(&record.key, &record.value);
                        }
                    }
                }
            }
        }

        // Step 4: the accumulator (`batches`) goes out of scope here.
        Ok(())
    }

    fn send_with_retry(&self, dst_addr: &str, records: &[MigrationRecord]) -> Vec<MigrationOutcome> {
        let mut remaining: Vec<MigrationRecord> = records.to_vec();
        let mut outcomes: HashMap<Vec<u8>, MigrationOutcome> = HashMap::new();

        let mut attempt = 0;
        loop {
            if remaining.is_empty() {
                break;
            }

            match self.transport.send(dst_addr, &remaining) {
                Ok(batch_outcomes) => {
                    let mut still_failing = Vec::new();
                    for (record, outcome) in remaining.iter().zip(batch_outcomes.into_iter()) {
                        if outcome.success {
                            outcomes.insert(record.key.clone(), outcome);
                        } else {
                            still_failing.push(record.clone());
                        }
                    }
                    remaining = still_failing;
                }
                Err(e) => {
                    warn!(dst = %dst_addr, error = %e, attempt, "migration RPC failed");
                }
            }

            if remaining.is_empty() || attempt >= self.migration_max_retries {
                break;
            }
            attempt += 1;
            thread::sleep(backoff_delay(attempt, self.migration_deadline));
        }

        records
            .iter()
            .map(|r| {
                outcomes.remove(&r.key).unwrap_or(MigrationOutcome {
                    key: r.key.clone(),
                    success: false,
                })
            })
            .collect()
    }

    /// Address, lifecycle state, and memtable entry count of every node this
    /// cluster has ever seen. Iterates `states`, not `nodes`, and left-joins
    /// engine stats when an engine is still present — a `Stopped` node has
    /// already been dropped from `nodes` by `remove_node`, but it stays
    /// observable here with a `0` entry count rather than disappearing.
    pub fn diagnostics(&self) -> Result<Vec<(String, NodeState, usize)>> {
        let nodes = self
            .nodes
            .read()
            .map_err(|e| RidgeError::LockPoisoned(format!("cluster nodes lock poisoned: {e}")))?;
        let states = self
            .states
            .read()
            .map_err(|e| RidgeError::LockPoisoned(format!("cluster states lock poisoned: {e}")))?;

        Ok(states
            .iter()
            .map(|(addr, state)| {
                let entry_count = nodes
                    .get(addr)
                    .map(|engine| engine.memtable_entry_count())
                    .unwrap_or(0);
                (addr.clone(), *state, entry_count)
            })
            .collect())
    }
}

/// Exponential backoff capped at the migration deadline: `deadline / 2^(N -
/// attempt)`, floored at a tenth of the deadline so small deadlines don't
/// collapse to zero-length sleeps.
fn backoff_delay(attempt: u32, deadline: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    let delay = deadline / factor.max(1);
    delay.max(deadline / 10)
}
