use std::collections::HashMap;

use shared_types::NodeId;

/// Weighted set of validators, used for the beacon list.
///
/// Beacons are admitted by a session even when the network would refuse
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorSet {
    weights: HashMap<NodeId, u64>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` to `node_id`, inserting it if absent.
    pub fn add_weight(&mut self, node_id: NodeId, weight: u64) {
        let entry = self.weights.entry(node_id).or_insert(0);
        *entry = entry.saturating_add(weight);
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.weights.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
