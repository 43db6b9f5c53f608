//! Verified collision sets

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::model::HashModel;
use crate::error::GenerationError;

/// Distinct keys sharing the seed's hash under one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionSet {
    /// Seed the keys were derived from
    pub seed: String,
    /// Model the keys collide under
    pub model_id: String,
    /// `evaluate(seed)`
    pub target_hash: u64,
    /// Generated keys, in generation order
    pub keys: Vec<String>,
}

impl CollisionSet {
    /// Build a set after re-checking every key against the model
    pub fn verified(
        model: &HashModel,
        seed: &str,
        keys: Vec<String>,
    ) -> Result<Self, GenerationError> {
        let target_hash = model.evaluate(seed);
        let mut seen: HashSet<&str> = HashSet::with_capacity(keys.len());

        for key in &keys {
            let actual = model.evaluate(key);
            if actual != target_hash {
                return Err(GenerationError::HashMismatch {
                    key: key.clone(),
                    expected: target_hash,
                    actual,
                });
            }
            if key == seed || !seen.insert(key.as_str()) {
                return Err(GenerationError::DuplicateKey(key.clone()));
            }
        }

        Ok(Self {
            seed: seed.to_string(),
            model_id: model.id().to_string(),
            target_hash,
            keys,
        })
    }

    pub fn size(&self) -> usize {
        self.keys.len()
    }

    /// Write the keys to a file, one per line
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut contents = self.keys.join("\n");
        contents.push('\n');

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write keys to {:?}", path))?;

        tracing::info!(keys = self.size(), path = ?path, "Saved collision keys");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_verified_accepts_real_collisions() {
        let model = HashModel::java();
        let set = CollisionSet::verified(&model, "Aa", vec!["BB".to_string()]).unwrap();
        assert_eq!(set.size(), 1);
        assert_eq!(set.target_hash, 2112);
        assert_eq!(set.model_id, "java");
    }

    #[test]
    fn test_verified_rejects_hash_mismatch() {
        let model = HashModel::java();
        let err = CollisionSet::verified(&model, "Aa", vec!["BC".to_string()]).unwrap_err();
        assert!(matches!(err, GenerationError::HashMismatch { .. }));
    }

    #[test]
    fn test_verified_rejects_duplicates_and_seed() {
        let model = HashModel::java();
        let err = CollisionSet::verified(&model, "Aa", vec!["BB".into(), "BB".into()]).unwrap_err();
        assert_eq!(err, GenerationError::DuplicateKey("BB".into()));

        let err = CollisionSet::verified(&model, "Aa", vec!["Aa".into()]).unwrap_err();
        assert_eq!(err, GenerationError::DuplicateKey("Aa".into()));
    }

    #[test]
    fn test_save_writes_one_key_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys/java.txt");

        let set = CollisionSet::verified(&HashModel::java(), "Aa", vec!["BB".into()]).unwrap();
        set.save(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "BB\n");
    }
}
