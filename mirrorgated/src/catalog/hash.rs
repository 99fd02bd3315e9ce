use sha2::{Sha256, Digest};
use shared::types::ServiceDefinition;

/// Computes a SHA-256 hash of the catalog.
/// Only fields that affect probing and routing are hashed; `fallback` is
/// informational and is left out. Definitions are sorted by type so the
/// hash does not depend on document order.
pub fn compute_hash(services: &[ServiceDefinition]) -> String {
    let mut sorted: Vec<&ServiceDefinition> = services.iter().collect();
    sorted.sort_by(|a, b| a.service_type.cmp(&b.service_type));

    let mut hasher = Sha256::new();
    for def in sorted {
        update_field(&mut hasher, &def.service_type);
        update_field(&mut hasher, &def.test_path);
        hasher.update((def.instance_groups.len() as u64).to_be_bytes());
        for group in &def.instance_groups {
            update_field(&mut hasher, &group.identifier());
        }
    }

    hex::encode(hasher.finalize())
}

/// Length-prefixed so adjacent fields cannot run into each other
fn update_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}
