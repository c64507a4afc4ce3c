//! Consistent-hash ring
//!
//! An ordered collection of `(hash, node)` points, `virtual_nodes_per_node`
//! per real node (default 160). `node_for(key)` hashes the key and returns
//! the owner of the first point at-or-after that hash, wrapping around to
//! the smallest point if the hash is past the last one.

use std::collections::BTreeMap;

use crate::error::{RidgeError, Result};

/// Consistent-hash ring over node addresses.
#[derive(Debug, Clone)]
pub struct HashRing {
    points: BTreeMap<u64, String>,
    virtual_nodes_per_node: usize,
}

impl HashRing {
    /// An empty ring with no nodes.
    pub fn new(virtual_nodes_per_node: usize) -> Self {
        Self {
            points: BTreeMap::new(),
            virtual_nodes_per_node: virtual_nodes_per_node.max(1),
        }
    }

    /// Build a ring already populated with `nodes`.
    pub fn with_nodes(virtual_nodes_per_node: usize, nodes: &[String]) -> Self {
        let mut ring = Self::new(virtual_nodes_per_node);
        for node in nodes {
            ring.add_node(node);
        }
        ring
    }

    /// Place `virtual_nodes_per_node` points for `addr` onto the ring.
    /// Adding a node already present replaces its existing points.
    pub fn add_node(&mut self, addr: &str) {
        self.remove_points(addr);
        for v in 0..self.virtual_nodes_per_node {
            self.points.insert(virtual_point_hash(addr, v), addr.to_string());
        }
    }

    /// Remove every point belonging to `addr`. Errors if this would empty
    /// the ring entirely.
    pub fn remove_node(&mut self, addr: &str) -> Result<()> {
        if self.nodes().len() <= 1 && self.points.values().any(|n| n == addr) {
            return Err(RidgeError::Ring(format!(
                "cannot remove {addr}: it is the last node on the ring"
            )));
        }
        self.remove_points(addr);
        Ok(())
    }

    fn remove_points(&mut self, addr: &str) {
        self.points.retain(|_, n| n != addr);
    }

    /// The node address owning `key`, or `None` if the ring has no nodes.
    pub fn node_for(&self, key: &[u8]) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }
        let hash = hash_key(key);
        let owner = self
            .points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, addr)| addr.as_str());
        owner
    }

    /// Distinct node addresses currently on the ring, in no particular order.
    pub fn nodes(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for addr in self.points.values() {
            if !seen.iter().any(|a| a == addr) {
                seen.push(addr.clone());
            }
        }
        seen
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Hash for a real lookup key.
fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key);
    hasher.finalize() as u64
}

/// Hash for the `v`-th virtual point of `addr`, seeded so distinct virtual
/// indices of the same node land at unrelated ring positions.
fn virtual_point_hash(addr: &str, v: usize) -> u64 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(addr.as_bytes());
    hasher.update(&v.to_le_bytes());
    let lo = hasher.finalize() as u64;

    // A second pass with the bytes reversed spreads points that would
    // otherwise collide across the 32-bit CRC space into the full u64 range.
    let mut hasher2 = crc32fast::Hasher::new();
    hasher2.update(&v.to_le_bytes());
    hasher2.update(addr.as_bytes());
    let hi = hasher2.finalize() as u64;

    (hi << 32) | lo
}
