//! QuoteCore - core of a small quote collection.
//!
//! This library provides:
//! - Data models (Quote, Conflict)
//! - Persistence over a key-value port (in-memory or SQLite)
//! - Random display and category filtering
//! - JSON import and export
//! - Sync with a remote quote source, with conflict tracking and resolution
//! - Periodic resync
//! - Configuration management
//!
//! The library never installs a tracing subscriber; hosts decide where logs go.
//!
//! # Feature Flags
//!
//! - `desktop`: Resolve a default config directory from the platform.

pub mod config;
pub mod conflicts;
pub mod error;
pub mod kv;
pub mod lookup_key;
pub mod merge;
pub mod models;
pub mod scheduler;
pub mod store;
pub mod sync_client;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use conflicts::{ConflictManager, ResolutionChoice};
pub use error::{QuoteError, QuoteResult};
pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
pub use models::{Conflict, Quote, QuoteSource};
pub use scheduler::ResyncTask;
pub use store::{PickOutcome, QuoteStore};
pub use sync_client::{HttpQuoteSource, RemoteQuoteSource, SyncClient, SyncResult};
