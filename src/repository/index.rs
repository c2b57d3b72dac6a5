//! Secondary index queries over tag and relation rows.
//!
//! Rows are written only by [`RecordRepository`](super::records::RecordRepository);
//! this repository is read-only.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Serialize;

use super::models::RelationEntry;
use super::pool::{DbError, SqlitePool};
use crate::schema::{relations, tags};

/// Upper bound on tag search results.
pub const MAX_TAG_RESULTS: i64 = 100;

diesel::define_sql_function!(fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text);

/// One tag search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagMatch {
    pub aid: i64,
    pub tag_matches: i64,
}

/// Usage summary for one tag name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagSummary {
    pub name: String,
    pub anime_count: i64,
    pub avg_weight: i64,
}

#[derive(diesel::QueryableByName)]
struct TagSummaryRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    name: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    anime_count: i64,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Double>)]
    avg_weight: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct IndexRepository {
    pool: SqlitePool,
}

impl IndexRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Records carrying any of `names` (case-insensitive) with at least
    /// `min_weight`, best match first.
    pub async fn query_by_tags(
        &self,
        names: &[String],
        min_weight: i32,
    ) -> Result<Vec<TagMatch>, DbError> {
        use diesel::dsl::count_star;

        let lowered: Vec<String> = names
            .iter()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        if lowered.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.pool.get().await?;
        let rows: Vec<(i64, i64)> = tags::table
            .filter(lower(tags::name).eq_any(&lowered))
            .filter(tags::weight.ge(min_weight))
            .group_by(tags::aid)
            .select((tags::aid, count_star()))
            .order((count_star().desc(), tags::aid.asc()))
            .limit(MAX_TAG_RESULTS)
            .load(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(aid, tag_matches)| TagMatch { aid, tag_matches })
            .collect())
    }

    /// Every tag name with the number of records using it and its mean weight.
    pub async fn list_tags(&self) -> Result<Vec<TagSummary>, DbError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<TagSummaryRow> = diesel::sql_query(
            "SELECT name, COUNT(DISTINCT aid) AS anime_count, AVG(weight) AS avg_weight \
             FROM tags GROUP BY LOWER(name) \
             ORDER BY anime_count DESC, avg_weight DESC, LOWER(name) ASC",
        )
        .load(&mut conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TagSummary {
                name: row.name,
                anime_count: row.anime_count,
                avg_weight: row.avg_weight.unwrap_or(0.0) as i64,
            })
            .collect())
    }

    /// Relations recorded for one record, in document order.
    pub async fn relations(&self, aid: i64) -> Result<Vec<RelationEntry>, DbError> {
        let mut conn = self.pool.get().await?;
        relations::table
            .filter(relations::aid.eq(aid))
            .order(relations::rowid.asc())
            .select(RelationEntry::as_select())
            .load(&mut conn)
            .await
    }
}
