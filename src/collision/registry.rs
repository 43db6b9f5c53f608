//! Platform identifier to generator mapping

use std::collections::BTreeMap;
use std::sync::Arc;

use super::generator::CollisionGenerator;
use super::model::HashModel;
use crate::error::RegistryError;

/// Read-only table of collision generators, keyed by platform identifier
///
/// Built once at startup and shared behind an `Arc`; there is no way to
/// mutate it after construction.
#[derive(Debug, Clone)]
pub struct GeneratorRegistry {
    entries: BTreeMap<String, CollisionGenerator>,
}

impl GeneratorRegistry {
    /// Start from an empty registry and add models before sharing
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            entries: BTreeMap::new(),
            max_block_len: super::generator::DEFAULT_MAX_BLOCK_LEN,
        }
    }

    /// Look up a generator by identifier (case-insensitive)
    pub fn get(&self, id: &str) -> Result<&CollisionGenerator, RegistryError> {
        self.entries
            .get(&normalize(id))
            .ok_or_else(|| RegistryError::UnknownAlgorithm(id.trim().to_string()))
    }

    /// Registered identifiers in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }
}

#[cfg(test)]
impl GeneratorRegistry {
    /// Registry with the built-in models only
    pub(crate) fn builtin() -> Self {
        Self::builder()
            .with_builtins()
            .expect("built-in identifiers are unique")
            .build()
    }
}

/// Collects models before the registry is frozen
pub struct RegistryBuilder {
    entries: BTreeMap<String, CollisionGenerator>,
    max_block_len: usize,
}

impl RegistryBuilder {
    /// Block width limit applied to every generator registered afterwards
    pub fn max_block_len(mut self, max_block_len: usize) -> Self {
        self.max_block_len = max_block_len;
        self
    }

    /// Add a model; identifiers must be unique
    pub fn register(mut self, model: HashModel) -> Result<Self, RegistryError> {
        let key = normalize(model.id());
        if self.entries.contains_key(&key) {
            return Err(RegistryError::DuplicateAlgorithm(model.id().to_string()));
        }

        let generator =
            CollisionGenerator::new(Arc::new(model)).with_max_block_len(self.max_block_len);
        self.entries.insert(key, generator);
        Ok(self)
    }

    /// Add the built-in models
    pub fn with_builtins(self) -> Result<Self, RegistryError> {
        self.register(HashModel::v8())?
            .register(HashModel::java())?
            .register(HashModel::php())
    }

    pub fn build(self) -> GeneratorRegistry {
        GeneratorRegistry {
            entries: self.entries,
        }
    }
}

fn normalize(id: &str) -> String {
    id.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::model::{Direction, ALPHANUMERIC};

    #[test]
    fn test_builtin_ids() {
        let registry = GeneratorRegistry::builtin();
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(ids, vec!["java", "php", "v8"]);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = GeneratorRegistry::builtin();
        assert_eq!(registry.get("V8").unwrap().model().id(), "v8");
        assert_eq!(registry.get("  Java ").unwrap().model().multiplier(), 31);
    }

    #[test]
    fn test_unknown_algorithm() {
        let registry = GeneratorRegistry::builtin();
        assert_eq!(
            registry.get("perl").unwrap_err(),
            RegistryError::UnknownAlgorithm("perl".into())
        );
    }

    #[test]
    fn test_custom_model_registration() {
        let custom = HashModel::new("djb-rtl", 32, 33, Direction::Backward, ALPHANUMERIC).unwrap();
        let registry = GeneratorRegistry::builder()
            .with_builtins()
            .unwrap()
            .register(custom)
            .unwrap()
            .build();

        assert_eq!(registry.ids().count(), 4);
        let gen = registry.get("DJB-RTL").unwrap();
        let keys = gen.generate_collisions("hashprobehashprobe", 20).unwrap();
        let target = gen.model().evaluate("hashprobehashprobe");
        assert!(keys.iter().all(|k| gen.model().evaluate(k) == target));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let result = GeneratorRegistry::builder()
            .with_builtins()
            .unwrap()
            .register(HashModel::java());
        assert!(matches!(result, Err(RegistryError::DuplicateAlgorithm(id)) if id == "java"));
    }

    #[test]
    fn test_registry_is_shareable_across_threads() {
        let registry = Arc::new(GeneratorRegistry::builtin());
        let handles: Vec<_> = ["v8", "java", "php"]
            .into_iter()
            .map(|id| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let gen = registry.get(id).unwrap();
                    gen.generate_collisions("hashprobehashprobehashprobe", 100).unwrap().len()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 100);
        }
    }
}
