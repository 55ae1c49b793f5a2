//! The master list of zone configurations.

use crate::config::{ServerBlock, ZoneConfig};
use crate::error::{Result, TopologyError};
use crate::zone::normalize;
use std::collections::HashMap;

/// Every [`ZoneConfig`] declared across all server blocks, in declaration order,
/// with a lookup by canonical key (`zone:port`).
///
/// A zone appears in at most one configuration, whatever its port.
#[derive(Debug, Default)]
pub struct Registry {
    by_key: HashMap<String, usize>,
    configs: Vec<ZoneConfig>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `config` under `key`.
    ///
    /// Does not check for duplicate zones; [`inspect`](Self::inspect) does that
    /// before calling this. `key` must not already be registered.
    pub(crate) fn register(&mut self, key: impl Into<String>, config: ZoneConfig) {
        let key = key.into();
        debug_assert!(
            !self.by_key.contains_key(&key),
            "key {key} already registered"
        );
        self.by_key.insert(key, self.configs.len());
        self.configs.push(config);
    }

    /// Normalizes every key of every block, rejects duplicate zones, and registers one
    /// configuration per key carrying its block's directives.
    ///
    /// Keys are rewritten in place to their canonical form. Nothing is registered
    /// unless every block passes.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::InvalidZone`] for a malformed key, or
    /// [`TopologyError::DuplicateZone`] when a zone is claimed twice, either within
    /// `blocks` or by an earlier pass.
    pub fn inspect(&mut self, mut blocks: Vec<ServerBlock>) -> Result<Vec<ServerBlock>> {
        let mut claimed: HashMap<String, String> = self
            .by_key
            .iter()
            .map(|(key, &i)| (self.configs[i].zone.clone(), key.clone()))
            .collect();
        let mut pending = Vec::new();

        for (block, s) in blocks.iter_mut().enumerate() {
            for key in &mut s.keys {
                let za = normalize(key)?;
                let canonical = za.to_string();
                *key = canonical.clone();

                if let Some(existing) = claimed.get(&za.zone) {
                    tracing::warn!(zone = %za.zone, key = %canonical, existing = %existing, "Duplicate zone");
                    return Err(TopologyError::DuplicateZone {
                        key: canonical,
                        existing: existing.clone(),
                    });
                }
                claimed.insert(za.zone.clone(), canonical.clone());
                pending.push((block, canonical, ZoneConfig::new(za.zone, za.port)));
            }
        }

        for (block, key, mut config) in pending {
            config.middleware.clone_from(&blocks[block].directives);
            tracing::debug!(key = %key, middleware = config.middleware.len(), "Registered zone");
            self.register(key, config);
        }
        Ok(blocks)
    }

    /// Looks up a configuration by canonical key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ZoneConfig> {
        self.by_key.get(key).map(|&i| &self.configs[i])
    }

    /// Looks up a configuration by canonical key for the directive layer to fill in.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ZoneConfig> {
        self.by_key.get(key).map(|&i| &mut self.configs[i])
    }

    /// Returns `true` if some configuration serves `zone`.
    #[must_use]
    pub fn contains_zone(&self, zone: &str) -> bool {
        self.configs.iter().any(|c| c.zone == zone)
    }

    /// All configurations in declaration order.
    #[must_use]
    pub fn configs(&self) -> &[ZoneConfig] {
        &self.configs
    }

    pub(crate) fn configs_mut(&mut self) -> &mut [ZoneConfig] {
        &mut self.configs
    }

    /// Number of registered configurations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}
