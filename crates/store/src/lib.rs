//! Client-side persistence for the Lime-Frog job client.
//!
//! Provides the [`KeyValueStore`](kv::KeyValueStore) abstraction with a
//! volatile in-memory backend and a durable JSON-file backend, the
//! session identity provider, and form-draft persistence. Malformed
//! stored data is always degraded to defaults, never surfaced as a
//! fatal error.

pub mod draft;
pub mod error;
pub mod file;
pub mod identity;
pub mod kv;
pub mod memory;

pub use error::StoreError;
pub use file::FileStore;
pub use kv::KeyValueStore;
pub use memory::MemoryStore;
