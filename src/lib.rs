//! Paperdex: semantic nearest-neighbor retrieval over paper abstracts.

pub mod config;
pub mod embedding;
pub mod error;
pub mod vector;

pub use error::{Error, Result};
