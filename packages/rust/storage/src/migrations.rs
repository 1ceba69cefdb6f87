//! Schema definitions for the docset search index.
//!
//! The documentation browser reads `searchIndex` directly, so the schema is
//! fixed and no bookkeeping table is added. The applied version is tracked
//! in `PRAGMA user_version` instead.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "searchIndex table and unique anchor index",
        sql: r#"
CREATE TABLE searchIndex(id INTEGER PRIMARY KEY, name TEXT, type TEXT, path TEXT);
CREATE UNIQUE INDEX anchor ON searchIndex (name, type, path);
PRAGMA user_version = 1;
"#,
    }]
}
