pub mod hash;
pub mod loader;

use std::collections::HashSet;
use shared::types::ServiceDefinition;

/// The currently loaded set of service definitions.
/// Replaced wholesale on every reload, never patched.
#[derive(Debug, Clone)]
pub struct Catalog {
    services: Vec<ServiceDefinition>,
    hash: String,
}

impl Catalog {
    /// Build a catalog, keeping the first definition of each type
    pub fn new(definitions: Vec<ServiceDefinition>) -> Self {
        let mut seen = HashSet::new();
        let mut services = Vec::with_capacity(definitions.len());

        for def in definitions {
            if seen.insert(def.service_type.clone()) {
                services.push(def);
            } else {
                tracing::warn!("Ignoring duplicate catalog entry for type {}", def.service_type);
            }
        }

        let hash = hash::compute_hash(&services);
        Self { services, hash }
    }

    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    pub fn get(&self, service_type: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|def| def.service_type == service_type)
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
