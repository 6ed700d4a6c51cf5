//! Persistence for quotas, video files and utterances.
//!
//! Two backends implement the same store traits:
//! - [`PgStore`]: Postgres via sqlx, with embedded migrations
//! - [`MemoryStore`]: process-local, for tests and local development
//!
//! [`QuotaLedger`] enforces the per-user rolling request budget on top of
//! either backend.

pub mod config;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod pg;
pub mod store;

pub use config::{run_migrations, DbConfig};
pub use error::{DbError, DbResult};
pub use ledger::QuotaLedger;
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use store::{DispatchClaim, QuotaStore, VideoStore};

#[cfg(any(test, feature = "mock"))]
pub use store::{MockQuotaStore, MockVideoStore};
