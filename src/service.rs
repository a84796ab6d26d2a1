use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::json;

use crate::importer::inference::{category_from_tags, infer_domains};
use crate::importer::markdown::split_front_matter;
use crate::importer::{self, FileFailure, SourceFile};
use crate::{
    Database, GraphStore, ImportLogDraft, LinkDraft, LinkType, NodeId, ObsidianNode, SourceType,
};

mod fetch;

pub use fetch::{DocumentFetcher, FetchError, HttpFetcher, file_name_from_url};

/// Most nodes listed per category in the context digest.
pub const CONTEXT_NODES_PER_CATEGORY: usize = 5;

/// Content characters excerpted per category in the context digest.
pub const CONTEXT_CHARS_PER_CATEGORY: usize = 600;

/// Group assigned to nodes without category or tags.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Service layer for importing vault files and reading the resulting graph.
///
/// ObsidianService owns the graph store. It is UI-independent and is used by
/// the CLI and the assistant alike.
///
/// # Examples
///
/// ```
/// use mindtree::{Database, ObsidianService, SourceFile};
///
/// # fn main() -> anyhow::Result<()> {
/// let service = ObsidianService::new(Database::in_memory()?);
/// let summary = service.import_from_files(
///     &[
///         SourceFile::new("A.md", "# Alpha\nSee [[B]]"),
///         SourceFile::new("B.md", "# Beta"),
///     ],
///     None,
/// )?;
///
/// assert_eq!(summary.nodes_created, 2);
/// assert_eq!(summary.links_created, 1);
/// # Ok(())
/// # }
/// ```
pub struct ObsidianService {
    store: GraphStore,
}

/// Outcome of one import call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub import_source: String,
    pub log_id: i64,
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub links_created: usize,
    /// Links that already existed for the same pair and type.
    pub links_skipped: usize,
    pub unresolved_links: usize,
    #[serde(skip)]
    pub failures: Vec<FileFailure>,
    pub skipped_files: Vec<String>,
}

impl ImportSummary {
    /// Nodes written by the import, new or updated.
    pub fn nodes_total(&self) -> usize {
        self.nodes_created + self.nodes_updated
    }
}

/// A node as drawn by the force-directed graph view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    pub title: String,
    pub path: String,
    pub group: String,
    pub domains: Vec<String>,
    pub tags: Vec<String>,
    pub source_type: SourceType,
}

/// An edge in the graph view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphLink {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub strength: f64,
}

/// Nodes and explicit links for visualization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkData {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

/// Field weights for [`ObsidianService::rank_nodes`].
///
/// Every query term adds `title`, `tag` and `path` once when the field
/// contains it, and `content` once per occurrence up to `content_cap`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub title: f64,
    pub tag: f64,
    pub content: f64,
    pub path: f64,
    pub content_cap: usize,
}

impl ScoringWeights {
    /// Keyword-count ranking used when gathering assistant context.
    pub const KEYWORD: Self = Self {
        title: 2.0,
        tag: 2.0,
        content: 1.0,
        path: 0.0,
        content_cap: 10,
    };

    /// Field-weighted ranking used by interactive search.
    pub const SEARCH: Self = Self {
        title: 10.0,
        tag: 5.0,
        content: 1.0,
        path: 3.0,
        content_cap: 1,
    };
}

/// A node with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredNode {
    pub node: ObsidianNode,
    pub score: f64,
}

/// Returns the visualization group of a node.
///
/// Prefers the stored category, then the first tag from the category
/// vocabulary, then the first tag, else [`UNCATEGORIZED`].
pub fn node_group(node: &ObsidianNode) -> String {
    node.category()
        .or_else(|| category_from_tags(node.tags()))
        .or_else(|| node.tags().first().map(String::as_str))
        .map(str::to_lowercase)
        .unwrap_or_else(|| UNCATEGORIZED.to_string())
}

/// Returns the stored domains, re-inferring them when absent.
pub fn node_domains(node: &ObsidianNode) -> Vec<String> {
    node.stored_domains().unwrap_or_else(|| {
        infer_domains(&format!("{} {}", node.title(), node.content()))
            .into_iter()
            .map(String::from)
            .collect()
    })
}

/// Splits a search query into lower-cased terms of two or more characters.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query
        .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 2)
    {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Scores one node against lower-cased terms.
pub fn score_node(node: &ObsidianNode, terms: &[String], weights: &ScoringWeights) -> f64 {
    let title = node.title().to_lowercase();
    let content = node.content().to_lowercase();
    let path = node.path().to_lowercase();
    let tags: Vec<String> = node.tags().iter().map(|t| t.to_lowercase()).collect();

    terms
        .iter()
        .map(|term| {
            let mut score = 0.0;
            if title.contains(term.as_str()) {
                score += weights.title;
            }
            if tags.iter().any(|t| t.contains(term.as_str())) {
                score += weights.tag;
            }
            if path.contains(term.as_str()) {
                score += weights.path;
            }
            let hits = content.matches(term.as_str()).take(weights.content_cap).count();
            score + weights.content * hits as f64
        })
        .sum()
}

impl ObsidianService {
    /// Creates a new ObsidianService with the given database.
    pub fn new(db: Database) -> Self {
        Self {
            store: GraphStore::new(db),
        }
    }

    /// Returns the underlying graph store.
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Imports a set of files and records an import log.
    ///
    /// Nodes are upserted by path, so importing the same files again updates
    /// them in place and creates no duplicate links.
    ///
    /// # Errors
    ///
    /// Fails when nothing could be parsed or when a database write fails. A
    /// failed import log is written in both cases.
    pub fn import_from_files(
        &self,
        files: &[SourceFile],
        imported_by: Option<&str>,
    ) -> Result<ImportSummary> {
        let source = match files {
            [single] => single.path.clone(),
            _ => format!("{} files", files.len()),
        };
        self.import_batch(&source, files, imported_by)
    }

    /// Imports every supported file under `dir`.
    pub fn import_from_directory(
        &self,
        dir: &Path,
        imported_by: Option<&str>,
    ) -> Result<ImportSummary> {
        let files = importer::collect_directory(dir)?;
        self.import_batch(&dir.display().to_string(), &files, imported_by)
    }

    /// Downloads one document and imports it.
    pub fn import_from_url(
        &self,
        url: &str,
        fetcher: &dyn DocumentFetcher,
        imported_by: Option<&str>,
    ) -> Result<ImportSummary> {
        let downloaded = file_name_from_url(url).and_then(|name| Ok((name, fetcher.fetch(url)?)));

        let (name, content) = match downloaded {
            Ok(pair) => pair,
            Err(e) => {
                self.record_failure(url, &e.to_string(), imported_by);
                return Err(anyhow::Error::new(e).context(format!("Failed to download {url}")));
            }
        };

        self.import_batch(url, &[SourceFile::new(name, content)], imported_by)
    }

    fn import_batch(
        &self,
        source: &str,
        files: &[SourceFile],
        imported_by: Option<&str>,
    ) -> Result<ImportSummary> {
        let batch = importer::parse_obsidian_data(files);

        if batch.nodes.is_empty() && !batch.failures.is_empty() {
            let errors: Vec<String> = batch
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.path, f.error))
                .collect();
            let message = errors.join("; ");
            self.record_failure(source, &message, imported_by);
            return Err(anyhow!("No nodes imported: {message}"));
        }

        let upserted = match self.store.upsert_nodes(&batch.nodes) {
            Ok(summary) => summary,
            Err(e) => {
                self.record_failure(source, &format!("{e:#}"), imported_by);
                return Err(e.context("Failed to create nodes"));
            }
        };

        let (links_created, links_skipped) = match self.create_links(&batch.links, &upserted.ids) {
            Ok(counts) => counts,
            Err(e) => {
                self.record_failure(source, &format!("{e:#}"), imported_by);
                return Err(e.context("Failed to create links"));
            }
        };

        let metadata = json!({
            "files": files.len(),
            "nodesCreated": upserted.created,
            "nodesUpdated": upserted.updated,
            "linksSkipped": links_skipped,
            "unresolvedLinks": batch.unresolved_links,
            "skippedFiles": batch.skipped,
            "failures": batch
                .failures
                .iter()
                .map(|f| json!({ "path": f.path, "error": f.error }))
                .collect::<Vec<_>>(),
        });
        let log = ImportLogDraft::succeeded(
            source,
            upserted.created + upserted.updated,
            links_created,
            metadata,
            imported_by,
        );
        let log_id = self
            .store
            .record_import(&log)
            .context("Failed to record import")?;

        tracing::info!(
            source,
            nodes_created = upserted.created,
            nodes_updated = upserted.updated,
            links_created,
            links_skipped,
            failures = batch.failures.len(),
            "import finished"
        );

        Ok(ImportSummary {
            import_source: source.to_string(),
            log_id,
            nodes_created: upserted.created,
            nodes_updated: upserted.updated,
            links_created,
            links_skipped,
            unresolved_links: batch.unresolved_links,
            failures: batch.failures,
            skipped_files: batch.skipped,
        })
    }

    fn create_links(
        &self,
        links: &[LinkDraft],
        ids: &HashMap<String, NodeId>,
    ) -> Result<(usize, usize)> {
        let mut created = 0;
        let mut skipped = 0;

        for link in links {
            let (Some(&source), Some(&target)) =
                (ids.get(&link.source_path), ids.get(&link.target_path))
            else {
                tracing::warn!(
                    source = %link.source_path,
                    target = %link.target_path,
                    "link endpoint was not stored"
                );
                skipped += 1;
                continue;
            };

            let result = self
                .store
                .create_link(source, target, link.link_type, link.strength, &link.metadata)
                .map_err(|e| {
                    tracing::error!(
                        source = %link.source_path,
                        target = %link.target_path,
                        error = %e,
                        "link insert failed"
                    );
                    e
                })?;

            match result {
                Some(_) => {
                    tracing::debug!(
                        link_type = %link.link_type,
                        "{} -> {}",
                        link.source_path,
                        link.target_path
                    );
                    created += 1;
                }
                None => skipped += 1,
            }
        }

        Ok((created, skipped))
    }

    fn record_failure(&self, source: &str, error: &str, imported_by: Option<&str>) {
        tracing::warn!(source, error, "import failed");
        if let Err(e) = self
            .store
            .record_import(&ImportLogDraft::failed(source, error, imported_by))
        {
            tracing::error!(source, error = %e, "could not record failed import");
        }
    }

    /// Returns every node plus the explicit links between them.
    ///
    /// Only `wiki` and `canvas-edge` links are included, and a link joining
    /// the same two nodes with the same type appears once regardless of
    /// direction.
    pub fn get_network_data(&self) -> Result<NetworkData> {
        let nodes: Vec<GraphNode> = self
            .store
            .list_nodes()?
            .iter()
            .map(|node| GraphNode {
                id: node.id(),
                title: node.title().to_string(),
                path: node.path().to_string(),
                group: node_group(node),
                domains: node_domains(node),
                tags: node.tags().to_vec(),
                source_type: node.source_type(),
            })
            .collect();

        let mut seen: HashSet<(LinkType, NodeId, NodeId)> = HashSet::new();
        let links = self
            .store
            .list_links()?
            .into_iter()
            .filter(|link| link.link_type.is_explicit())
            .filter(|link| {
                let (a, b) = link.unordered_pair();
                seen.insert((link.link_type, a, b))
            })
            .map(|link| GraphLink {
                source: link.source_id,
                target: link.target_id,
                link_type: link.link_type,
                strength: link.strength,
            })
            .collect();

        Ok(NetworkData { nodes, links })
    }

    /// Ranks nodes against lower-cased terms, best first.
    ///
    /// Nodes scoring zero are left out. Ties are broken by title.
    pub fn rank_nodes(
        &self,
        terms: &[String],
        weights: &ScoringWeights,
        limit: usize,
    ) -> Result<Vec<ScoredNode>> {
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredNode> = self
            .store
            .list_nodes()?
            .into_iter()
            .filter_map(|node| {
                let score = score_node(&node, terms, weights);
                (score > 0.0).then_some(ScoredNode { node, score })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.node.title().cmp(b.node.title()))
        });
        scored.truncate(limit);

        Ok(scored)
    }

    /// Finds nodes mentioning any of the keywords, ranked by keyword counts.
    pub fn find_relevant_nodes(&self, keywords: &[&str], limit: usize) -> Result<Vec<ObsidianNode>> {
        let terms = query_terms(&keywords.join(" "));
        let ranked = self.rank_nodes(&terms, &ScoringWeights::KEYWORD, limit)?;
        Ok(ranked.into_iter().map(|scored| scored.node).collect())
    }

    /// Searches nodes with the field-weighted ranking.
    pub fn search_obsidian_nodes(&self, query: &str, limit: usize) -> Result<Vec<ScoredNode>> {
        self.rank_nodes(&query_terms(query), &ScoringWeights::SEARCH, limit)
    }

    /// Builds the text digest of the graph handed to the assistant.
    ///
    /// Nodes are grouped by [`node_group`]; each group lists at most
    /// [`CONTEXT_NODES_PER_CATEGORY`] nodes, most recently updated first, and
    /// excerpts at most [`CONTEXT_CHARS_PER_CATEGORY`] characters of content.
    pub fn get_obsidian_context(&self) -> Result<String> {
        let nodes = self.store.list_nodes()?;
        if nodes.is_empty() {
            return Ok("No Obsidian notes have been imported yet.".to_string());
        }
        let link_count = self.store.count_links()?;

        let mut groups: BTreeMap<String, Vec<&ObsidianNode>> = BTreeMap::new();
        for node in &nodes {
            groups.entry(node_group(node)).or_default().push(node);
        }

        let mut ordered: Vec<(String, Vec<&ObsidianNode>)> = groups.into_iter().collect();
        ordered.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));

        let mut out = format!(
            "Obsidian knowledge base: {} notes, {} links.\n",
            nodes.len(),
            link_count
        );

        for (group, mut members) in ordered {
            members.sort_by(|a, b| {
                b.updated_at()
                    .cmp(&a.updated_at())
                    .then_with(|| a.id().cmp(&b.id()))
            });

            out.push_str(&format!("\n## {group} ({})\n", members.len()));
            let mut budget = CONTEXT_CHARS_PER_CATEGORY;

            for node in members.iter().take(CONTEXT_NODES_PER_CATEGORY) {
                out.push_str(&format!("- {}", node.title()));
                if !node.tags().is_empty() {
                    out.push_str(&format!(" [{}]", node.tags().join(", ")));
                }

                let excerpt = excerpt(node.content(), budget);
                budget -= excerpt.chars().count().min(budget);
                if !excerpt.is_empty() {
                    out.push_str(": ");
                    out.push_str(&excerpt);
                }
                out.push('\n');
            }
        }

        Ok(out)
    }
}

/// Collapses whitespace and cuts the text to at most `max_chars` characters.
fn excerpt(content: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let (_, body) = split_front_matter(content);
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}
