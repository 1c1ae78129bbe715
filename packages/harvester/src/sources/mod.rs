//! Harvesting sources and the registry that builds them from configuration.

pub mod bhl;
pub mod bibdigital;
pub mod zobodat;

use std::collections::BTreeMap;

use crate::config::HarvesterConfig;
use crate::error::{HarvesterError, Result};
use crate::harvester::Strategy;

/// Builds a strategy from its configuration.
pub type StrategyConstructor = fn(&HarvesterConfig) -> Result<Box<dyn Strategy>>;

/// Registry mapping source identifiers to strategy constructors.
///
/// Identifiers are matched case-insensitively.
pub struct SourceRegistry {
    constructors: BTreeMap<String, StrategyConstructor>,
}

impl SourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Register a constructor under `source`, replacing any previous one.
    pub fn register(&mut self, source: impl Into<String>, constructor: StrategyConstructor) {
        self.constructors
            .insert(source.into().to_lowercase(), constructor);
    }

    /// Check if a constructor is registered for `source`.
    #[must_use]
    pub fn contains(&self, source: &str) -> bool {
        self.constructors.contains_key(&source.to_lowercase())
    }

    /// Build the strategy named by `config.source`.
    ///
    /// # Errors
    /// [`HarvesterError::UnknownSource`] when nothing is registered under
    /// the identifier, otherwise whatever the constructor reports.
    pub fn create(&self, config: &HarvesterConfig) -> Result<Box<dyn Strategy>> {
        let constructor = self
            .constructors
            .get(&config.source.to_lowercase())
            .ok_or_else(|| HarvesterError::UnknownSource(config.source.clone()))?;
        constructor(config)
    }

    /// Registered identifiers in sorted order.
    #[must_use]
    pub fn registered_sources(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl Default for SourceRegistry {
    /// Registry with every built-in source.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(bhl::SOURCE_ID, bhl::create);
        registry.register(bibdigital::SOURCE_ID, bibdigital::create);
        registry.register(bibdigital::LEGACY_SOURCE_ID, bibdigital::create);
        registry.register(zobodat::SOURCE_ID, zobodat::create);
        registry
    }
}
