//! Collision generation
//!
//! Hash models for server-side string hashes and the generator that turns a
//! seed into many distinct keys with the same hash.

mod generator;
mod model;
mod registry;
mod search;
mod set;

pub use generator::{CollisionGenerator, DEFAULT_MAX_BLOCK_LEN};
pub use model::{Direction, HashModel, ALPHANUMERIC};
pub use registry::GeneratorRegistry;
pub use set::CollisionSet;
