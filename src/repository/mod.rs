//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM over SQLite. Document text lives in
//! files next to the database; [`records`] keeps the two in step.

pub mod call_log;
pub mod context;
pub mod index;
pub mod models;
pub mod pool;
pub mod records;
pub mod util;

pub use call_log::CallLogRepository;
pub use context::DbContext;
pub use index::{IndexRepository, TagMatch, TagSummary, MAX_TAG_RESULTS};
pub use models::RelationEntry;
pub use pool::{DbError, SqliteConn, SqlitePool};
pub use records::{IndexEntries, Record, RecordRepository};
