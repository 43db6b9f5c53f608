//! Zero-contribution substitution search
//!
//! Two equal-length strings hash identically when the weighted differences
//! over the positions where they differ sum to zero modulo `2^bits`. This
//! module finds such substitutions: single characters whose weight has
//! enough factors of two to absorb the difference, and short blocks whose
//! alternatives are matched up with a meet-in-the-middle lookup.

use std::collections::HashMap;

use super::model::HashModel;

/// Largest half-block candidate space the block search will enumerate
const MAX_HALF_SPACE: usize = 1 << 20;

/// A disjoint run of seed positions with interchangeable contents
///
/// `alternatives[0]` is always the original seed substring, so the digit 0
/// leaves the slot untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slot {
    pub start: usize,
    pub alternatives: Vec<Vec<char>>,
}

impl Slot {
    pub fn radix(&self) -> usize {
        self.alternatives.len()
    }

    pub fn len(&self) -> usize {
        self.alternatives[0].len()
    }

    pub fn positions(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len()
    }
}

/// A seed position with at least one substitute character
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FreePosition {
    pub position: usize,
    pub original: char,
    /// Ascending code point order
    pub substitutes: Vec<char>,
}

impl FreePosition {
    /// Original plus first substitute only
    pub fn binary_slot(&self) -> Slot {
        Slot {
            start: self.position,
            alternatives: vec![vec![self.original], vec![self.substitutes[0]]],
        }
    }

    /// Original plus every substitute
    pub fn full_slot(&self) -> Slot {
        let mut alternatives = Vec::with_capacity(self.substitutes.len() + 1);
        alternatives.push(vec![self.original]);
        alternatives.extend(self.substitutes.iter().map(|c| vec![*c]));

        Slot {
            start: self.position,
            alternatives,
        }
    }
}

/// Largest 2-adic valuation of a difference between two alphabet characters
fn max_difference_valuation(alphabet: &[char]) -> u32 {
    let mut best = 0;

    for (i, a) in alphabet.iter().enumerate() {
        for b in &alphabet[i + 1..] {
            let diff = (*b as u32).abs_diff(*a as u32);
            best = best.max(diff.trailing_zeros());
        }
    }

    best
}

/// Smallest weight exponent at which a single-character substitution can
/// vanish modulo `2^bits`, or `None` when no position can ever qualify
pub(crate) fn free_exponent_threshold(model: &HashModel) -> Option<u64> {
    let bits = model.bit_width();
    let absorbed = max_difference_valuation(model.alphabet());

    if absorbed >= bits {
        return Some(0);
    }

    match model.multiplier() {
        0 => Some(1),
        m if m.trailing_zeros() == 0 => None,
        m => {
            let needed = u64::from(bits - absorbed);
            let per_power = u64::from(m.trailing_zeros());
            Some(needed.div_ceil(per_power))
        }
    }
}

/// Find every seed position that accepts a hash-preserving substitute
pub(crate) fn scan_free_positions(model: &HashModel, seed: &[char]) -> Vec<FreePosition> {
    let Some(threshold) = free_exponent_threshold(model) else {
        return Vec::new();
    };

    let len = seed.len();

    seed.iter()
        .enumerate()
        .filter(|(position, _)| model.exponent(*position, len) >= threshold)
        .filter_map(|(position, original)| {
            let target = model.contribution(*original, position, len);
            let substitutes: Vec<char> = model
                .alphabet()
                .iter()
                .copied()
                .filter(|c| c != original && model.contribution(*c, position, len) == target)
                .collect();

            (!substitutes.is_empty()).then(|| FreePosition {
                position,
                original: *original,
                substitutes,
            })
        })
        .collect()
}

/// All strings of `width` alphabet characters, lexicographic order
fn enumerate_strings(alphabet: &[char], width: usize) -> Vec<Vec<char>> {
    let mut out: Vec<Vec<char>> = vec![Vec::new()];

    for _ in 0..width {
        out = out
            .iter()
            .flat_map(|prefix| {
                alphabet.iter().map(move |c| {
                    let mut next = prefix.clone();
                    next.push(*c);
                    next
                })
            })
            .collect();
    }

    out
}

fn sum_contributions(model: &HashModel, chars: &[char], start: usize, len: usize) -> u64 {
    chars
        .iter()
        .enumerate()
        .fold(0u64, |acc, (offset, c)| {
            acc.wrapping_add(model.contribution(*c, start + offset, len))
        })
        & model.mask()
}

/// Meet-in-the-middle search for substrings that can replace
/// `seed[start..start + width]` without changing the hash
///
/// The right half's contributions are bucketed first; every left half then
/// looks up the residue it still needs. Results come back in lexicographic
/// order, excluding the original substring.
pub(crate) fn search_block(
    model: &HashModel,
    seed: &[char],
    start: usize,
    width: usize,
) -> Vec<Vec<char>> {
    let len = seed.len();
    if width < 2 || start + width > len {
        return Vec::new();
    }

    let left_width = width / 2;
    let right_width = width - left_width;
    let alphabet = model.alphabet();

    let half_space = alphabet.len().checked_pow(right_width as u32);
    if half_space.map_or(true, |space| space > MAX_HALF_SPACE) {
        tracing::debug!(width, "Block search space too large, skipping");
        return Vec::new();
    }

    let original = &seed[start..start + width];
    let target = sum_contributions(model, original, start, len);

    let mut right_buckets: HashMap<u64, Vec<Vec<char>>> = HashMap::new();
    for right in enumerate_strings(alphabet, right_width) {
        let sum = sum_contributions(model, &right, start + left_width, len);
        right_buckets.entry(sum).or_default().push(right);
    }

    let mut alternatives = Vec::new();
    for left in enumerate_strings(alphabet, left_width) {
        let sum = sum_contributions(model, &left, start, len);
        let needed = target.wrapping_sub(sum) & model.mask();

        if let Some(rights) = right_buckets.get(&needed) {
            for right in rights {
                let mut candidate = left.clone();
                candidate.extend_from_slice(right);
                if candidate.as_slice() != original {
                    alternatives.push(candidate);
                }
            }
        }
    }

    alternatives
}
