//! Static Bridge Registry Adapter
//!
//! Implements `BridgeRegistry` over a map built once at startup.

use crate::domain::ChainId;
use crate::ports::outbound::{Bridge, BridgeRegistry};
use std::collections::HashMap;
use std::sync::Arc;

/// Chain id → bridge map.
#[derive(Default)]
pub struct StaticBridgeRegistry {
    bridges: HashMap<ChainId, Arc<dyn Bridge>>,
}

impl StaticBridgeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bridge` for `chain_id`, replacing any previous one.
    pub fn with_bridge(mut self, chain_id: ChainId, bridge: Arc<dyn Bridge>) -> Self {
        self.bridges.insert(chain_id, bridge);
        self
    }

    /// Register `bridge` for `chain_id` in place.
    pub fn insert(&mut self, chain_id: ChainId, bridge: Arc<dyn Bridge>) {
        self.bridges.insert(chain_id, bridge);
    }

    /// Registered chain ids.
    pub fn chain_ids(&self) -> impl Iterator<Item = &ChainId> {
        self.bridges.keys()
    }
}

impl BridgeRegistry for StaticBridgeRegistry {
    fn bridge(&self, chain_id: &ChainId) -> Option<Arc<dyn Bridge>> {
        self.bridges.get(chain_id).cloned()
    }
}
