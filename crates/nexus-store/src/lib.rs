//! `nexus-store`: the key/value half of the Config Store contract.
//!
//! Two backings implement [`KvStore`]: [`SqliteKv`] for durable storage and
//! [`MemoryKv`] for ephemeral use. Relational service rows live in
//! `nexus-services`.

pub mod db;
pub mod error;
pub mod kv;

pub use error::{Result, StoreError};
pub use kv::{KvStore, MemoryKv, SqliteKv};
