// Written by hand to match the tables created in `DbContext::init_schema`.
//
// `tags`, `relations` and `api_logs` have no declared key, so they are keyed
// on SQLite's implicit `rowid`.

diesel::table! {
    anime (aid) {
        aid -> BigInt,
        last_updated -> Text,
    }
}

diesel::table! {
    tags (rowid) {
        rowid -> BigInt,
        aid -> BigInt,
        name -> Text,
        weight -> Integer,
    }
}

diesel::table! {
    relations (rowid) {
        rowid -> BigInt,
        aid -> BigInt,
        related_aid -> BigInt,
        #[sql_name = "type"]
        relation_type -> Text,
    }
}

diesel::table! {
    api_logs (rowid) {
        rowid -> BigInt,
        timestamp -> Text,
        aid -> Nullable<BigInt>,
        success -> Bool,
    }
}

diesel::allow_tables_to_appear_in_same_query!(anime, tags, relations, api_logs);
