mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use schema::INITIAL_SCHEMA;

/// Owns the SQLite connection behind the graph store.
///
/// Every constructor applies the schema and seeds the subprompt table, so a
/// fresh file and an existing one look the same to callers.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a private in-memory database, mostly for tests.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Opens or creates the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(INITIAL_SCHEMA)
            .context("Failed to initialize schema")?;
        crate::subprompts::seed(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprompts::SEED_SUBPROMPTS;
    use tempfile::tempdir;

    fn schema_objects(db: &Database, kind: &str) -> Vec<String> {
        let mut stmt = db
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
            .unwrap();
        stmt.query_map([kind], |row| row.get(0))
            .unwrap()
            .map(|name| name.unwrap())
            .collect()
    }

    fn count(db: &Database, table: &str) -> usize {
        let n: i64 = db
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap();
        n as usize
    }

    fn insert_node(db: &Database, path: &str) -> rusqlite::Result<usize> {
        db.connection().execute(
            "INSERT INTO obsidian_nodes (title, path, created_at, updated_at) VALUES (?1, ?1, 0, 0)",
            [path],
        )
    }

    #[test]
    fn graph_tables_and_indexes_exist() {
        let db = Database::in_memory().unwrap();

        let tables = schema_objects(&db, "table");
        for table in ["import_logs", "obsidian_links", "obsidian_nodes", "subprompts"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }

        let indexes = schema_objects(&db, "index");
        for index in [
            "idx_obsidian_links_source",
            "idx_obsidian_links_target",
            "idx_obsidian_links_type",
        ] {
            assert!(indexes.iter().any(|i| i == index), "missing index {index}");
        }
    }

    #[test]
    fn node_path_is_unique() {
        let db = Database::in_memory().unwrap();

        insert_node(&db, "a.md").unwrap();

        assert!(insert_node(&db, "a.md").is_err());
    }

    #[test]
    fn deleting_a_node_cascades_to_its_links() {
        let db = Database::in_memory().unwrap();
        insert_node(&db, "a.md").unwrap();
        insert_node(&db, "b.md").unwrap();
        db.connection()
            .execute(
                "INSERT INTO obsidian_links (source_id, target_id, type, created_at) VALUES (1, 2, 'wiki', 0)",
                [],
            )
            .unwrap();

        db.connection()
            .execute("DELETE FROM obsidian_nodes WHERE path = 'b.md'", [])
            .unwrap();

        assert_eq!(count(&db, "obsidian_links"), 0);
    }

    #[test]
    fn link_strength_defaults_to_one() {
        let db = Database::in_memory().unwrap();
        insert_node(&db, "a.md").unwrap();
        insert_node(&db, "b.md").unwrap();
        db.connection()
            .execute(
                "INSERT INTO obsidian_links (source_id, target_id, type, created_at) VALUES (1, 2, 'wiki', 0)",
                [],
            )
            .unwrap();

        let strength: f64 = db
            .connection()
            .query_row("SELECT strength FROM obsidian_links", [], |row| row.get(0))
            .unwrap();
        assert_eq!(strength, 1.0);
    }

    #[test]
    fn subprompts_seeded_on_open() {
        let db = Database::in_memory().unwrap();
        assert_eq!(count(&db, "subprompts"), SEED_SUBPROMPTS.len());
    }

    #[test]
    fn reopening_file_keeps_rows_and_does_not_reseed() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("graph.db");

        {
            let db = Database::open(&db_path).unwrap();
            insert_node(&db, "kept.md").unwrap();
        }
        assert!(db_path.exists());

        let reopened = Database::open(&db_path).unwrap();
        assert_eq!(count(&reopened, "obsidian_nodes"), 1);
        assert_eq!(count(&reopened, "subprompts"), SEED_SUBPROMPTS.len());
    }
}
