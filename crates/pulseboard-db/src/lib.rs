//! Pulseboard Database Layer
//!
//! Read-only access to the issue tracker's SQLite database, plus the
//! change source that reports when the database file is mutated.
//! All writes happen through the external tracker CLI; this crate
//! never executes a mutating statement.

pub mod pool;
pub mod queries;
pub mod watch;

pub use pool::{DbError, DbPool, DbResult};
pub use watch::{change_channel, ChangeEvent, ChangeOrigin, ChangeTx, DbWatcher};
