//! Knowledge graph built from imported Obsidian vaults.
//!
//! Markdown notes, JSON canvases and Canvas2Document files become nodes;
//! wiki-links, canvas edges, shared tags and similar titles become links.
//!
//! ```
//! use mindtree::{Database, ObsidianService, SourceFile};
//!
//! let service = ObsidianService::new(Database::in_memory().unwrap());
//! let summary = service
//!     .import_from_files(
//!         &[
//!             SourceFile::new("A.md", "# Alpha\nSee [[B]]. #project"),
//!             SourceFile::new("B.md", "# Beta\n#project"),
//!         ],
//!         None,
//!     )
//!     .unwrap();
//! assert_eq!(summary.nodes_created, 2);
//! ```

pub mod config;
pub mod db;
pub mod importer;
pub mod linker;
pub mod llm;
pub mod logging;
pub mod models;
pub mod rag;
pub mod service;
pub mod store;
pub mod subprompts;

pub use config::Config;
pub use db::Database;
pub use importer::{ImportBatch, SourceFile};
pub use linker::LinkRebuildReport;
pub use models::{
    ImportLog, ImportLogDraft, LinkDraft, LinkId, LinkType, NodeBuilder, NodeDraft, NodeId,
    ObsidianLink, ObsidianNode, SourceType,
};
pub use rag::{Answer, Assistant, ContextCache};
pub use service::{
    GraphLink, GraphNode, ImportSummary, NetworkData, ObsidianService, ScoredNode,
    ScoringWeights,
};
pub use store::{GraphStore, UpsertSummary};
