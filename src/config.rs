//! Configuration loader and schema types.
//!
//! This module exposes the settings the engine is constructed with and
//! helpers to load them from disk and environment.

mod load;
mod schema;

pub use schema::*;
