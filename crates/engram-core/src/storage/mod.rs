//! Storage layer
//!
//! Durable state behind the engine: memory rows, access history, Hebbian
//! links, entity indexes, and the FTS5 lexical index, all in one SQLite
//! file.

pub mod migrations;
mod sqlite;

pub use sqlite::Store;
