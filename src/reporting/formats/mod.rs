//! Report output formats

pub mod csv;
pub mod json;
pub mod markdown;
pub mod text;
