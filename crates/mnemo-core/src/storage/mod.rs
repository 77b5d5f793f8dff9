//! Storage Module
//!
//! Schema migrations and the SQLite-backed chunk store.

pub mod migrations;
mod sqlite;

pub use sqlite::{ChunkStore, Result, StoreError};
