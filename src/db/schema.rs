/// Complete database schema for the note graph.
///
/// Uses CREATE TABLE/INDEX IF NOT EXISTS for idempotent execution.
/// Tags and metadata are stored as JSON text.
pub const INITIAL_SCHEMA: &str = r#"
-- Nodes: one imported document or canvas element, keyed by path
CREATE TABLE IF NOT EXISTS obsidian_nodes (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    path TEXT NOT NULL UNIQUE,
    tags TEXT NOT NULL DEFAULT '[]',
    source_type TEXT NOT NULL DEFAULT 'obsidian',
    is_imported INTEGER NOT NULL DEFAULT 1,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Links: directed typed edges between nodes
CREATE TABLE IF NOT EXISTS obsidian_links (
    id INTEGER PRIMARY KEY,
    source_id INTEGER NOT NULL,
    target_id INTEGER NOT NULL,
    type TEXT NOT NULL,
    strength REAL NOT NULL DEFAULT 1.0,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    FOREIGN KEY (source_id) REFERENCES obsidian_nodes(id) ON DELETE CASCADE,
    FOREIGN KEY (target_id) REFERENCES obsidian_nodes(id) ON DELETE CASCADE
);

-- Import logs: one audit row per import call
CREATE TABLE IF NOT EXISTS import_logs (
    id INTEGER PRIMARY KEY,
    import_source TEXT NOT NULL,
    nodes_count INTEGER NOT NULL DEFAULT 0,
    links_count INTEGER NOT NULL DEFAULT 0,
    success INTEGER NOT NULL,
    error TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    imported_at INTEGER NOT NULL,
    imported_by TEXT
);

-- Subprompts: assistant instruction fragments, seeded at initialization
CREATE TABLE IF NOT EXISTS subprompts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL,
    keywords TEXT NOT NULL DEFAULT '[]',
    content TEXT NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_obsidian_links_source ON obsidian_links(source_id);
CREATE INDEX IF NOT EXISTS idx_obsidian_links_target ON obsidian_links(target_id);
CREATE INDEX IF NOT EXISTS idx_obsidian_links_type ON obsidian_links(type);
CREATE INDEX IF NOT EXISTS idx_import_logs_imported ON import_logs(imported_at);
"#;
