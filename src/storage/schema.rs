//! Schema and migration scaffold for the vector store's `SQLite` backing.

/// Current schema version. Bump and add a migration entry when the schema
/// changes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Schema for a fresh database: version table, one `collections` row per
/// opened collection (fixing its dimension for the life of the database
/// file), and a `vectors` table carrying one row per embedded chunk.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_info (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS vectors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_name TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    file_name TEXT NOT NULL,
    file_position INTEGER NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vectors_collection ON vectors(collection_name);
CREATE INDEX IF NOT EXISTS idx_vectors_collection_file ON vectors(collection_name, file_name);
";

/// Query to check whether `schema_info` already carries a version row.
pub const GET_VERSION_SQL: &str = "SELECT version FROM schema_info WHERE id = 1";

/// Upsert of the schema version row.
pub const SET_VERSION_SQL: &str =
    "INSERT INTO schema_info (id, version) VALUES (1, ?1) ON CONFLICT(id) DO UPDATE SET version = ?1";

/// One schema migration step.
pub struct Migration {
    /// Version this migration applies from.
    pub from_version: u32,
    /// Version this migration leaves the database at.
    pub to_version: u32,
    /// SQL to run.
    pub sql: &'static str,
}

/// Ordered migrations. Empty for now; the schema has had one version so
/// far. Add an entry here (and bump `CURRENT_SCHEMA_VERSION`) the first
/// time the `vectors`/`collections` shape needs to change.
pub const MIGRATIONS: &[Migration] = &[];

/// Returns the migrations needed to bring a database from `current_version`
/// up to [`CURRENT_SCHEMA_VERSION`], in order.
#[must_use]
pub fn get_migrations_from(current_version: u32) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.from_version >= current_version)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pending_migrations_at_current_version() {
        assert!(get_migrations_from(CURRENT_SCHEMA_VERSION).is_empty());
    }
}
