//! Diesel models for the mirror tables.

use diesel::prelude::*;

use crate::schema;

/// New or replacement record row.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::anime)]
pub struct NewAnime<'a> {
    pub aid: i64,
    pub last_updated: &'a str,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::tags)]
pub struct NewTag<'a> {
    pub aid: i64,
    pub name: &'a str,
    pub weight: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::relations)]
pub struct NewRelation<'a> {
    pub aid: i64,
    pub related_aid: i64,
    pub relation_type: &'a str,
}

/// Relation row for one record.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[diesel(table_name = schema::relations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RelationEntry {
    pub related_aid: i64,
    pub relation_type: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::api_logs)]
pub struct NewCallLog<'a> {
    pub timestamp: &'a str,
    pub aid: Option<i64>,
    pub success: bool,
}
