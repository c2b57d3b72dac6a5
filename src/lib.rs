//! AniDB mirror - a caching front for the rate-limited AniDB HTTP API.
//!
//! Anime documents are served from a local cache as soon as they exist, even
//! when stale; stale or missing ids are queued and refreshed in the background
//! by a single throttled worker that never exceeds the daily call ceiling.
//! Every stored document is indexed into tag and relation tables for search.
//!
//! ```text
//!   HTTP ──▶ MirrorService ──▶ RecordStore (files + SQLite) ◀── RefreshWorker
//!                 │                                               ▲     │
//!                 └──────────▶ RefreshQueue ──────────────────────┘     ▼
//!                                                     RateGovernor ─▶ AniDB
//! ```

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod import;
pub mod rate_limit;
pub mod refresh;
pub mod repository;
pub mod schema;
pub mod server;
pub mod service;
pub mod storage;
pub mod upstream;

pub use config::Settings;
pub use error::{MirrorError, MirrorResult};
pub use service::{Lookup, MirrorService};
