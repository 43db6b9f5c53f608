//! Collision generator
//!
//! Builds many distinct strings that hash like a seed by treating every
//! hash-preserving substitution as an independent digit and counting through
//! the combinations. The search widens in stages until the requested count
//! is reachable:
//!
//! 1. single free positions, first substitute only (a plain bitmask)
//! 2. single free positions, every substitute (mixed radix)
//! 3. multi-character blocks over the remaining positions, width 2 upward
//!
//! Output depends only on the model, the seed and the count.

use std::sync::Arc;

use super::model::HashModel;
use super::search::{scan_free_positions, search_block, Slot};
use super::set::CollisionSet;
use crate::error::GenerationError;

/// Default widest block the search will try
pub const DEFAULT_MAX_BLOCK_LEN: usize = 4;

/// Search stage that produced a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    Binary,
    Widened,
    Blocks(usize),
}

/// Slots chosen for one seed, ordered by position
#[derive(Debug, Clone)]
pub struct CollisionPlan {
    slots: Vec<Slot>,
    stage: SearchStage,
}

impl CollisionPlan {
    /// Number of distinct non-seed strings reachable
    pub fn capacity(&self) -> u128 {
        capacity(&self.slots)
    }

    pub fn stage(&self) -> SearchStage {
        self.stage
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Apply the mixed-radix digits of `counter` to the seed
    fn key_for(&self, seed: &[char], counter: u128) -> String {
        let mut chars = seed.to_vec();
        let mut rest = counter;

        for slot in &self.slots {
            let radix = slot.radix() as u128;
            let digit = (rest % radix) as usize;
            rest /= radix;

            if digit != 0 {
                chars[slot.positions()].copy_from_slice(&slot.alternatives[digit]);
            }
        }

        chars.into_iter().collect()
    }
}

fn capacity(slots: &[Slot]) -> u128 {
    slots
        .iter()
        .fold(1u128, |acc, slot| acc.saturating_mul(slot.radix() as u128))
        - 1
}

/// Collision generator for one hash model
#[derive(Debug, Clone)]
pub struct CollisionGenerator {
    model: Arc<HashModel>,
    max_block_len: usize,
}

impl CollisionGenerator {
    pub fn new(model: Arc<HashModel>) -> Self {
        Self {
            model,
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
        }
    }

    /// Limit the block stage to blocks of at most `max_block_len` characters
    pub fn with_max_block_len(mut self, max_block_len: usize) -> Self {
        self.max_block_len = max_block_len.max(1);
        self
    }

    pub fn model(&self) -> &HashModel {
        &self.model
    }


    /// Generate `n` distinct strings hashing like `seed`
    pub fn generate_collisions(&self, seed: &str, n: usize) -> Result<Vec<String>, GenerationError> {
        let seed_chars: Vec<char> = seed.chars().collect();
        let plan = self.plan(&seed_chars, n)?;

        tracing::debug!(
            model = self.model.id(),
            seed,
            n,
            stage = ?plan.stage(),
            slots = plan.slot_count(),
            capacity = %plan.capacity(),
            "Generating collisions"
        );

        Ok((1..=n as u128)
            .map(|counter| plan.key_for(&seed_chars, counter))
            .collect())
    }

    /// Generate and independently verify a collision set
    pub fn collision_set(&self, seed: &str, n: usize) -> Result<CollisionSet, GenerationError> {
        let keys = self.generate_collisions(seed, n)?;
        CollisionSet::verified(&self.model, seed, keys)
    }

    /// Largest number of collisions reachable from `seed`
    pub fn capacity(&self, seed: &str) -> Result<u128, GenerationError> {
        let seed_chars: Vec<char> = seed.chars().collect();
        match self.plan(&seed_chars, usize::MAX) {
            Ok(plan) => Ok(plan.capacity()),
            Err(GenerationError::Exhausted { capacity, .. }) => Ok(capacity),
            Err(e) => Err(e),
        }
    }

    /// Choose slots until at least `n` non-seed combinations exist
    pub fn plan(&self, seed: &[char], n: usize) -> Result<CollisionPlan, GenerationError> {
        if n == 0 {
            return Err(GenerationError::InvalidCount(n));
        }
        if seed.is_empty() {
            return Err(GenerationError::EmptySeed);
        }

        let wanted = n as u128;
        let free = scan_free_positions(&self.model, seed);

        let slots: Vec<Slot> = free.iter().map(|f| f.binary_slot()).collect();
        if capacity(&slots) >= wanted {
            return Ok(CollisionPlan {
                slots,
                stage: SearchStage::Binary,
            });
        }

        let mut slots: Vec<Slot> = free.iter().map(|f| f.full_slot()).collect();
        if capacity(&slots) >= wanted {
            return Ok(CollisionPlan {
                slots,
                stage: SearchStage::Widened,
            });
        }

        let mut assigned = vec![false; seed.len()];
        for slot in &slots {
            assigned[slot.positions()].iter_mut().for_each(|a| *a = true);
        }

        for width in 2..=self.max_block_len {
            let mut start = 0;
            while start + width <= seed.len() {
                if assigned[start..start + width].iter().any(|a| *a) {
                    start += 1;
                    continue;
                }

                let alternatives = search_block(&self.model, seed, start, width);
                if alternatives.is_empty() {
                    start += 1;
                    continue;
                }

                let mut slot_alternatives = Vec::with_capacity(alternatives.len() + 1);
                slot_alternatives.push(seed[start..start + width].to_vec());
                slot_alternatives.extend(alternatives);

                slots.push(Slot {
                    start,
                    alternatives: slot_alternatives,
                });
                assigned[start..start + width].iter_mut().for_each(|a| *a = true);
                start += width;
            }

            slots.sort_by_key(|slot| slot.start);

            if capacity(&slots) >= wanted {
                return Ok(CollisionPlan {
                    slots,
                    stage: SearchStage::Blocks(width),
                });
            }
        }

        Err(GenerationError::Exhausted {
            requested: n,
            capacity: capacity(&slots),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::model::{Direction, ALPHANUMERIC};
    use std::collections::HashSet;

    fn generator(model: HashModel) -> CollisionGenerator {
        CollisionGenerator::new(Arc::new(model))
    }

    fn assert_collisions(gen: &CollisionGenerator, seed: &str, keys: &[String], n: usize) {
        assert_eq!(keys.len(), n);
        let distinct: HashSet<&String> = keys.iter().collect();
        assert_eq!(distinct.len(), n, "duplicate keys");

        let target = gen.model().evaluate(seed);
        for key in keys {
            assert_eq!(gen.model().evaluate(key), target, "key {} does not collide", key);
            assert_eq!(key.chars().count(), seed.chars().count());
        }
    }

    #[test]
    fn test_v8_hashes_thousand_keys() {
        let gen = generator(HashModel::v8());
        let keys = gen.generate_collisions("hashes", 1000).unwrap();
        assert_collisions(&gen, "hashes", &keys, 1000);
        assert!(!keys.contains(&"hashes".to_string()));
    }

    #[test]
    fn test_binary_stage_counts_through_bitmask() {
        let gen = generator(HashModel::v8());
        let keys = gen.generate_collisions("hashes", 3).unwrap();
        assert_eq!(keys, vec!["0ashes", "h0shes", "00shes"]);

        let plan = gen.plan(&"hashes".chars().collect::<Vec<_>>(), 3).unwrap();
        assert_eq!(plan.stage(), SearchStage::Binary);
        assert_eq!(plan.capacity(), 7);
    }

    #[test]
    fn test_widened_stage_when_bitmask_is_short() {
        let gen = generator(HashModel::v8());
        let plan = gen.plan(&"hashes".chars().collect::<Vec<_>>(), 1000).unwrap();
        assert_eq!(plan.stage(), SearchStage::Widened);
        assert_eq!(plan.capacity(), 62 * 62 * 14 - 1);
    }

    #[test]
    fn test_backward_model() {
        let model = HashModel::new("rtl", 32, 1024, Direction::Backward, ALPHANUMERIC).unwrap();
        let gen = generator(model);
        let keys = gen.generate_collisions("hashes", 3).unwrap();
        assert_eq!(keys, vec!["has0es", "hash0s", "has00s"]);
        assert_collisions(&gen, "hashes", &keys, 3);
    }

    #[test]
    fn test_java_uses_block_substitutions() {
        let gen = generator(HashModel::java());
        let keys = gen.generate_collisions("hashes", 11).unwrap();
        assert_eq!(&keys[..3], &["iBshes", "hatIes", "iBtIes"]);
        assert_collisions(&gen, "hashes", &keys, 11);

        let err = gen.generate_collisions("hashes", 12).unwrap_err();
        assert_eq!(err, GenerationError::Exhausted { requested: 12, capacity: 11 });
    }

    #[test]
    fn test_php_collisions() {
        let gen = generator(HashModel::php());
        let keys = gen.generate_collisions("hashes", 5).unwrap();
        assert_eq!(keys, vec!["hbRhes", "hc1hes", "hasiDs", "hbRiDs", "hc1iDs"]);
        assert_collisions(&gen, "hashes", &keys, 5);
    }

    #[test]
    fn test_large_batches_for_every_builtin() {
        let seed = "hashprobehashprobehashprobehashprobe";
        for model in [HashModel::v8(), HashModel::java(), HashModel::php()] {
            let gen = generator(model);
            let keys = gen.generate_collisions(seed, 10_000).unwrap();
            assert_collisions(&gen, seed, &keys, 10_000);
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        for model in [HashModel::v8(), HashModel::java(), HashModel::php()] {
            let gen = generator(model);
            let first = gen.generate_collisions("deterministic", 50).unwrap();
            let second = gen.generate_collisions("deterministic", 50).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_same_stage_requests_share_prefix() {
        let gen = generator(HashModel::java());
        let seed = "hashprobehashprobe";
        let small = gen.generate_collisions(seed, 10).unwrap();
        let large = gen.generate_collisions(seed, 100).unwrap();
        assert_eq!(&large[..10], small.as_slice());
    }

    #[test]
    fn test_single_key_boundary() {
        let gen = generator(HashModel::java());
        assert_eq!(gen.generate_collisions("Aa", 1).unwrap(), vec!["BB"]);
        assert!(matches!(
            gen.generate_collisions("Aa", 2),
            Err(GenerationError::Exhausted { requested: 2, capacity: 1 })
        ));

        let gen = generator(HashModel::v8());
        assert_eq!(gen.generate_collisions("hashes", 1).unwrap(), vec!["0ashes"]);
    }

    #[test]
    fn test_invalid_requests() {
        let gen = generator(HashModel::v8());
        assert_eq!(gen.generate_collisions("hashes", 0), Err(GenerationError::InvalidCount(0)));
        assert_eq!(gen.generate_collisions("", 5), Err(GenerationError::EmptySeed));
    }

    #[test]
    fn test_no_free_slots_fails() {
        let gen = generator(HashModel::java()).with_max_block_len(1);
        assert_eq!(
            gen.generate_collisions("hashes", 1),
            Err(GenerationError::Exhausted { requested: 1, capacity: 0 })
        );
    }

    #[test]
    fn test_capacity_reports_full_search() {
        let gen = generator(HashModel::java());
        assert_eq!(gen.capacity("hashes").unwrap(), 11);
        assert_eq!(gen.capacity("Aa").unwrap(), 1);
    }

    #[test]
    fn test_collision_set_is_verified() {
        let gen = generator(HashModel::php());
        let set = gen.collision_set("hashprobehashprobe", 40).unwrap();
        assert_eq!(set.size(), 40);
        assert_eq!(set.target_hash, gen.model().evaluate("hashprobehashprobe"));
        assert_eq!(set.model_id, "php");
    }

    #[test]
    fn test_narrow_width_model() {
        let model = HashModel::new("tiny", 8, 2, Direction::Forward, "abcdefgh").unwrap();
        let gen = generator(model);
        let keys = gen.generate_collisions("abcdefghij", 5).unwrap();
        assert_collisions(&gen, "abcdefghij", &keys, 5);
    }
}
