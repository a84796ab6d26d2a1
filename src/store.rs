use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
    Database, ImportLog, ImportLogDraft, LinkId, LinkType, NodeBuilder, NodeDraft, NodeId,
    ObsidianLink, ObsidianNode,
};

const NODE_COLUMNS: &str = "id, title, content, path, tags, source_type, is_imported, metadata, created_at, updated_at";
const LINK_COLUMNS: &str = "id, source_id, target_id, type, strength, metadata, created_at";

/// Persistence layer for nodes, links and import logs.
///
/// GraphStore owns the Database and is the only component that writes to the
/// graph tables. Node writes are keyed by path: writing an existing path
/// updates the row in place. Link writes check for an existing link of the
/// same type between the same two nodes (in either direction) before
/// inserting.
///
/// # Examples
///
/// ```
/// use mindtree::{Database, GraphStore, NodeDraft, SourceType};
///
/// # fn main() -> anyhow::Result<()> {
/// let store = GraphStore::new(Database::in_memory()?);
///
/// let draft = NodeDraft::new("Alpha", "# Alpha", "Alpha.md", SourceType::Obsidian);
/// let (first, created) = store.upsert_node(&draft)?;
/// let (second, created_again) = store.upsert_node(&draft)?;
///
/// assert!(created);
/// assert!(!created_again);
/// assert_eq!(first, second);
/// # Ok(())
/// # }
/// ```
pub struct GraphStore {
    db: Database,
}

/// Result of a bulk node upsert.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpsertSummary {
    /// Number of paths that were inserted.
    pub created: usize,
    /// Number of paths that already existed and were updated.
    pub updated: usize,
    /// Database id for every path in the batch.
    pub ids: HashMap<String, NodeId>,
}

struct NodeRow {
    id: i64,
    title: String,
    content: String,
    path: String,
    tags: String,
    source_type: String,
    is_imported: bool,
    metadata: String,
    created_at: i64,
    updated_at: i64,
}

impl NodeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            path: row.get(3)?,
            tags: row.get(4)?,
            source_type: row.get(5)?,
            is_imported: row.get(6)?,
            metadata: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_node(self) -> Result<ObsidianNode> {
        let tags: Vec<String> = serde_json::from_str(&self.tags)
            .with_context(|| format!("Invalid tags JSON for node {}", self.id))?;
        let metadata: Value = serde_json::from_str(&self.metadata)
            .with_context(|| format!("Invalid metadata JSON for node {}", self.id))?;

        Ok(NodeBuilder::new()
            .id(NodeId::new(self.id))
            .title(self.title)
            .content(self.content)
            .path(self.path)
            .tags(tags)
            .source_type(self.source_type.parse()?)
            .is_imported(self.is_imported)
            .metadata(metadata)
            .created_at(OffsetDateTime::from_unix_timestamp(self.created_at)?)
            .updated_at(OffsetDateTime::from_unix_timestamp(self.updated_at)?)
            .build())
    }
}

struct LinkRow {
    id: i64,
    source_id: i64,
    target_id: i64,
    link_type: String,
    strength: f64,
    metadata: String,
    created_at: i64,
}

impl LinkRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_id: row.get(1)?,
            target_id: row.get(2)?,
            link_type: row.get(3)?,
            strength: row.get(4)?,
            metadata: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_link(self) -> Result<ObsidianLink> {
        Ok(ObsidianLink {
            id: LinkId::new(self.id),
            source_id: NodeId::new(self.source_id),
            target_id: NodeId::new(self.target_id),
            link_type: self.link_type.parse()?,
            strength: self.strength,
            metadata: serde_json::from_str(&self.metadata)
                .with_context(|| format!("Invalid metadata JSON for link {}", self.id))?,
            created_at: OffsetDateTime::from_unix_timestamp(self.created_at)?,
        })
    }
}

impl GraphStore {
    /// Creates a new GraphStore with the given database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Inserts a node or updates the existing node with the same path.
    ///
    /// Returns the node id and `true` if a new row was inserted.
    pub fn upsert_node(&self, draft: &NodeDraft) -> Result<(NodeId, bool)> {
        let conn = self.db.connection();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let tags = serde_json::to_string(&draft.tags)?;
        let metadata = serde_json::to_string(&draft.metadata)?;

        if let Some(existing) = self.node_id_by_path(&draft.path)? {
            conn.execute(
                "UPDATE obsidian_nodes
                 SET title = ?1, content = ?2, tags = ?3, source_type = ?4,
                     metadata = ?5, is_imported = 1, updated_at = ?6
                 WHERE id = ?7",
                rusqlite::params![
                    draft.title,
                    draft.content,
                    tags,
                    draft.source_type.as_str(),
                    metadata,
                    now,
                    existing.get(),
                ],
            )?;
            return Ok((existing, false));
        }

        conn.execute(
            "INSERT INTO obsidian_nodes
             (title, content, path, tags, source_type, is_imported, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?7)",
            rusqlite::params![
                draft.title,
                draft.content,
                draft.path,
                tags,
                draft.source_type.as_str(),
                metadata,
                now,
            ],
        )?;

        Ok((NodeId::new(conn.last_insert_rowid()), true))
    }

    /// Upserts every draft in order, stopping at the first database failure.
    ///
    /// Rows written before a failure stay in place; re-running the import
    /// converges because writes are keyed by path.
    pub fn upsert_nodes(&self, drafts: &[NodeDraft]) -> Result<UpsertSummary> {
        let mut summary = UpsertSummary::default();

        for draft in drafts {
            let (id, created) = self.upsert_node(draft).map_err(|e| {
                tracing::error!(path = %draft.path, error = %e, "node upsert failed");
                e
            })?;

            if created {
                summary.created += 1;
            } else {
                summary.updated += 1;
            }
            summary.ids.insert(draft.path.clone(), id);
        }

        Ok(summary)
    }

    /// Looks up a node id by its unique path.
    pub fn node_id_by_path(&self, path: &str) -> Result<Option<NodeId>> {
        let id: Option<i64> = self
            .db
            .connection()
            .query_row(
                "SELECT id FROM obsidian_nodes WHERE path = ?1",
                [path],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id.map(NodeId::new))
    }

    /// Retrieves a node by id. Returns `None` if it does not exist.
    pub fn get_node(&self, id: NodeId) -> Result<Option<ObsidianNode>> {
        let query = format!("SELECT {NODE_COLUMNS} FROM obsidian_nodes WHERE id = ?1");
        let row = self
            .db
            .connection()
            .query_row(&query, [id.get()], NodeRow::from_row)
            .optional()?;

        row.map(NodeRow::into_node).transpose()
    }

    /// Retrieves a node by its path. Returns `None` if it does not exist.
    pub fn get_node_by_path(&self, path: &str) -> Result<Option<ObsidianNode>> {
        let query = format!("SELECT {NODE_COLUMNS} FROM obsidian_nodes WHERE path = ?1");
        let row = self
            .db
            .connection()
            .query_row(&query, [path], NodeRow::from_row)
            .optional()?;

        row.map(NodeRow::into_node).transpose()
    }

    /// Lists every node ordered by id.
    pub fn list_nodes(&self) -> Result<Vec<ObsidianNode>> {
        let query = format!("SELECT {NODE_COLUMNS} FROM obsidian_nodes ORDER BY id");
        let mut stmt = self.db.connection().prepare(&query)?;
        let rows = stmt.query_map([], NodeRow::from_row)?;

        let mut nodes = Vec::new();
        for row_result in rows {
            nodes.push(row_result?.into_node()?);
        }

        Ok(nodes)
    }

    /// Returns the number of stored nodes.
    pub fn count_nodes(&self) -> Result<usize> {
        let count: i64 =
            self.db
                .connection()
                .query_row("SELECT COUNT(*) FROM obsidian_nodes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Returns `true` if a link of this type already joins the two nodes in
    /// either direction.
    pub fn link_exists(&self, a: NodeId, b: NodeId, link_type: LinkType) -> Result<bool> {
        let exists: bool = self.db.connection().query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM obsidian_links
                 WHERE type = ?3
                   AND ((source_id = ?1 AND target_id = ?2) OR (source_id = ?2 AND target_id = ?1))
             )",
            rusqlite::params![a.get(), b.get(), link_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Creates a link unless it would be a self-loop or a duplicate pair.
    ///
    /// Returns `None` when the link was skipped.
    pub fn create_link(
        &self,
        source: NodeId,
        target: NodeId,
        link_type: LinkType,
        strength: f64,
        metadata: &Value,
    ) -> Result<Option<LinkId>> {
        if source == target || self.link_exists(source, target, link_type)? {
            return Ok(None);
        }

        let conn = self.db.connection();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        conn.execute(
            "INSERT INTO obsidian_links (source_id, target_id, type, strength, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                source.get(),
                target.get(),
                link_type.as_str(),
                strength,
                serde_json::to_string(metadata)?,
                now,
            ],
        )?;

        Ok(Some(LinkId::new(conn.last_insert_rowid())))
    }

    /// Lists links where the node is either source or target.
    pub fn links_for_node(&self, id: NodeId) -> Result<Vec<ObsidianLink>> {
        let query = format!(
            "SELECT {LINK_COLUMNS} FROM obsidian_links
             WHERE source_id = ?1 OR target_id = ?1
             ORDER BY id"
        );
        let mut stmt = self.db.connection().prepare(&query)?;
        let rows = stmt.query_map([id.get()], LinkRow::from_row)?;

        let mut links = Vec::new();
        for row_result in rows {
            links.push(row_result?.into_link()?);
        }

        Ok(links)
    }

    /// Lists every link ordered by id.
    pub fn list_links(&self) -> Result<Vec<ObsidianLink>> {
        let query = format!("SELECT {LINK_COLUMNS} FROM obsidian_links ORDER BY id");
        let mut stmt = self.db.connection().prepare(&query)?;
        let rows = stmt.query_map([], LinkRow::from_row)?;

        let mut links = Vec::new();
        for row_result in rows {
            links.push(row_result?.into_link()?);
        }

        Ok(links)
    }

    /// Returns the number of stored links.
    pub fn count_links(&self) -> Result<usize> {
        let count: i64 =
            self.db
                .connection()
                .query_row("SELECT COUNT(*) FROM obsidian_links", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Deletes every link. Returns the number of rows removed.
    pub fn clear_links(&self) -> Result<usize> {
        let removed = self.db.connection().execute("DELETE FROM obsidian_links", [])?;
        Ok(removed)
    }

    /// Writes an import log row and returns its id.
    pub fn record_import(&self, draft: &ImportLogDraft) -> Result<i64> {
        let conn = self.db.connection();
        let now = OffsetDateTime::now_utc().unix_timestamp();

        conn.execute(
            "INSERT INTO import_logs
             (import_source, nodes_count, links_count, success, error, metadata, imported_at, imported_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                draft.import_source,
                draft.nodes_count as i64,
                draft.links_count as i64,
                draft.success,
                draft.error,
                serde_json::to_string(&draft.metadata)?,
                now,
                draft.imported_by,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Lists import logs, newest first.
    pub fn list_import_logs(&self, limit: Option<usize>) -> Result<Vec<ImportLog>> {
        let limit_clause = limit.map(|l| format!(" LIMIT {l}")).unwrap_or_default();
        let query = format!(
            "SELECT id, import_source, nodes_count, links_count, success, error, metadata, imported_at, imported_by
             FROM import_logs ORDER BY imported_at DESC, id DESC{limit_clause}"
        );

        let mut stmt = self.db.connection().prepare(&query)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?;

        let mut logs = Vec::new();
        for row_result in rows {
            let (
                id,
                import_source,
                nodes_count,
                links_count,
                success,
                error,
                metadata,
                imported_at,
                imported_by,
            ) = row_result?;

            logs.push(ImportLog {
                id,
                import_source,
                nodes_count: nodes_count as usize,
                links_count: links_count as usize,
                success,
                error,
                metadata: serde_json::from_str(&metadata)?,
                imported_at: OffsetDateTime::from_unix_timestamp(imported_at)?,
                imported_by,
            });
        }

        Ok(logs)
    }
}
