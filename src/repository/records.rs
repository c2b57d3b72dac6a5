//! Record store: document files plus their freshness rows and index rows.
//!
//! A `put` stages the document file, replaces the record row and rewrites the
//! tag and relation rows in one transaction, and only after COMMIT moves the
//! staged file into place. Readers never see a document whose index rows
//! belong to a different version.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::models::{NewAnime, NewRelation, NewTag};
use super::pool::{DbError, SqliteConn, SqlitePool};
use super::util::{format_timestamp, parse_timestamp};
use crate::document::{AnimeDocument, ParsedRelation, ParsedTag};
use crate::error::{MirrorError, MirrorResult};
use crate::schema::{anime, relations, tags};
use crate::storage::DocumentStore;

/// A cached document with its refresh time.
///
/// `last_refreshed` is `None` when a document file exists without a record
/// row, which happens for seed files that have not been indexed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub aid: i64,
    pub document: String,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl Record {
    /// Whole days since the last refresh.
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_refreshed
            .map(|refreshed| (now - refreshed).num_days().max(0))
    }

    /// True when the record was refreshed less than `threshold_days` ago.
    pub fn is_fresh(&self, now: DateTime<Utc>, threshold_days: i64) -> bool {
        self.age_days(now)
            .is_some_and(|age| age < threshold_days)
    }
}

/// Tag and relation rows extracted from one document.
#[derive(Debug, Clone, Default)]
pub struct IndexEntries {
    pub tags: Vec<ParsedTag>,
    pub relations: Vec<ParsedRelation>,
}

impl IndexEntries {
    /// Parse `document` for `aid`. Any parse failure is a malformed document.
    pub fn extract(aid: i64, document: &str) -> MirrorResult<Self> {
        let doc = AnimeDocument::parse(document).map_err(|e| MirrorError::malformed(aid, e))?;
        Ok(Self {
            tags: doc.tags().map_err(|e| MirrorError::malformed(aid, e))?,
            relations: doc.relations().map_err(|e| MirrorError::malformed(aid, e))?,
        })
    }
}

/// Record repository.
#[derive(Clone, Debug)]
pub struct RecordRepository {
    pool: SqlitePool,
    documents: DocumentStore,
}

impl RecordRepository {
    pub fn new(pool: SqlitePool, documents: DocumentStore) -> Self {
        Self { pool, documents }
    }

    /// Local lookup. Never touches the network.
    pub async fn get(&self, aid: i64) -> MirrorResult<Option<Record>> {
        let Some(document) = self.documents.read(aid)? else {
            return Ok(None);
        };
        let last_refreshed = self.last_refreshed(aid).await?;
        Ok(Some(Record {
            aid,
            document,
            last_refreshed,
        }))
    }

    /// Refresh time from the record row, if there is one.
    pub async fn last_refreshed(&self, aid: i64) -> Result<Option<DateTime<Utc>>, DbError> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> = anime::table
            .find(aid)
            .select(anime::last_updated)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(raw.as_deref().and_then(parse_timestamp))
    }

    /// Number of record rows.
    pub async fn count(&self) -> Result<u64, DbError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        let count: i64 = anime::table
            .select(count_star())
            .get_result(&mut conn)
            .await?;
        Ok(count as u64)
    }

    /// Store a freshly fetched document, stamped now.
    pub async fn put(&self, aid: i64, document: &str) -> MirrorResult<Record> {
        self.put_at(aid, document, Utc::now()).await
    }

    /// Store a document with an explicit refresh time.
    ///
    /// A malformed document fails before anything is written.
    pub async fn put_at(
        &self,
        aid: i64,
        document: &str,
        refreshed: DateTime<Utc>,
    ) -> MirrorResult<Record> {
        let entries = IndexEntries::extract(aid, document)?;
        let stamp = format_timestamp(refreshed);
        let tmp = self.documents.write_temp(aid, document)?;

        if let Err(e) = self.write_through(aid, &stamp, &entries).await {
            self.documents.discard(&tmp);
            return Err(e.into());
        }
        if let Err(e) = self.documents.commit(&tmp, aid) {
            tracing::error!("Failed to move staged document for AID {}: {}", aid, e);
            self.documents.discard(&tmp);
            return Err(e.into());
        }

        Ok(Record {
            aid,
            document: document.to_string(),
            last_refreshed: Some(refreshed),
        })
    }

    /// Index a document that is already in the cache directory.
    ///
    /// Used by the bulk import; the file itself is left untouched.
    pub async fn index_cached(&self, aid: i64, document: &str) -> MirrorResult<usize> {
        let entries = IndexEntries::extract(aid, document)?;
        let stamp = format_timestamp(Utc::now());
        self.write_through(aid, &stamp, &entries).await?;
        Ok(entries.tags.len())
    }

    async fn write_through(
        &self,
        aid: i64,
        stamp: &str,
        entries: &IndexEntries,
    ) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;
        conn.transaction(|conn| {
            Box::pin(async move {
                reindex(conn, aid, entries).await?;

                diesel::replace_into(anime::table)
                    .values(&NewAnime {
                        aid,
                        last_updated: stamp,
                    })
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .await
    }
}

/// Replace the index rows for `aid`: delete the old set, insert the new one.
async fn reindex(conn: &mut SqliteConn, aid: i64, entries: &IndexEntries) -> Result<(), DbError> {
    diesel::delete(tags::table.filter(tags::aid.eq(aid)))
        .execute(conn)
        .await?;
    diesel::delete(relations::table.filter(relations::aid.eq(aid)))
        .execute(conn)
        .await?;

    // One statement per row: the async SQLite wrapper has no batch insert.
    for tag in &entries.tags {
        diesel::insert_into(tags::table)
            .values(&NewTag {
                aid,
                name: &tag.name,
                weight: tag.weight,
            })
            .execute(conn)
            .await?;
    }

    for rel in &entries.relations {
        diesel::insert_into(relations::table)
            .values(&NewRelation {
                aid,
                related_aid: rel.related_aid,
                relation_type: &rel.relation_type,
            })
            .execute(conn)
            .await?;
    }

    tracing::debug!(
        "Indexed AID {}: {} tags, {} relations",
        aid,
        entries.tags.len(),
        entries.relations.len()
    );
    Ok(())
}
