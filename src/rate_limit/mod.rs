//! Upstream call budgeting.
//!
//! The governor enforces two limits on calls to AniDB: a ceiling on calls in
//! any trailing 24-hour window (persisted in the call log, so it survives
//! restarts) and a minimum delay between consecutive calls.

mod governor;

pub use governor::{RateGovernor, CALL_WINDOW_HOURS};
