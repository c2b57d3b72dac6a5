//! Append-only log of upstream calls.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::NewCallLog;
use super::pool::{DbError, SqlitePool};
use super::util::format_timestamp;
use crate::schema::api_logs;

#[derive(Clone, Debug)]
pub struct CallLogRepository {
    pool: SqlitePool,
}

impl CallLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one call.
    pub async fn insert(
        &self,
        aid: Option<i64>,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;
        let timestamp = format_timestamp(at);
        diesel::insert_into(api_logs::table)
            .values(&NewCallLog {
                timestamp: &timestamp,
                aid,
                success,
            })
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Calls logged strictly after `since`, successful or not.
    pub async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, DbError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        let cutoff = format_timestamp(since);
        let count: i64 = api_logs::table
            .filter(api_logs::timestamp.gt(&cutoff))
            .select(count_star())
            .get_result(&mut conn)
            .await?;
        Ok(count as u64)
    }
}
