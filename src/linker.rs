//! Batch rebuilds of the link table.
//!
//! Both entry points delete every stored link first and then recreate links
//! from the stored nodes. [`extract_explicit_links`] keeps to links written by
//! the author; [`generate_links`] adds inferred tag and title links.

use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};

use crate::importer::canvas::EdgeDraft;
use crate::importer::markdown::{extract_wiki_links, file_stem, normalize_link_target};
use crate::{GraphStore, LinkType, ObsidianNode};

/// Titles shorter than this never take part in containment matching.
pub const MIN_TITLE_LEN: usize = 3;

/// Counts produced by a link rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRebuildReport {
    pub removed: usize,
    pub wiki: usize,
    pub canvas_edge: usize,
    pub tag: usize,
    pub title_similarity: usize,
    /// Wiki-links and canvas edges whose target node is not stored.
    pub unresolved: usize,
}

impl LinkRebuildReport {
    /// Total number of links created.
    pub fn total(&self) -> usize {
        self.wiki + self.canvas_edge + self.tag + self.title_similarity
    }

    fn record(&mut self, link_type: LinkType) {
        match link_type {
            LinkType::Wiki => self.wiki += 1,
            LinkType::CanvasEdge => self.canvas_edge += 1,
            LinkType::Tag => self.tag += 1,
            LinkType::TitleSimilarity => self.title_similarity += 1,
            LinkType::Canvas | LinkType::CanvasAdjacent => {}
        }
    }
}

/// Strength of a tag link for the given number of shared tags.
///
/// # Examples
///
/// ```
/// use mindtree::linker::tag_overlap_strength;
///
/// assert_eq!(tag_overlap_strength(1), 0.3);
/// assert_eq!(tag_overlap_strength(2), 0.4);
/// assert_eq!(tag_overlap_strength(12), 1.0);
/// ```
pub fn tag_overlap_strength(shared: usize) -> f64 {
    // Integer numerator keeps 0.3 and 0.4 exact.
    ((2 + shared) as f64 / 10.0).min(1.0)
}

/// Returns `true` when one title contains the other, ignoring case.
///
/// Titles shorter than [`MIN_TITLE_LEN`] characters never match.
pub fn titles_overlap(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.chars().count() < MIN_TITLE_LEN || b.chars().count() < MIN_TITLE_LEN {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Rebuilds only explicit links: wiki-links found in node content and the
/// canvas edges stored on canvas root nodes.
pub fn extract_explicit_links(store: &GraphStore) -> Result<LinkRebuildReport> {
    let mut report = LinkRebuildReport {
        removed: store.clear_links().context("Failed to clear links")?,
        ..Default::default()
    };
    let nodes = store.list_nodes()?;
    let lookup = NodeLookup::new(&nodes);

    create_wiki_links(store, &nodes, &lookup, &mut report)?;
    create_canvas_edge_links(store, &nodes, &lookup, &mut report)?;

    tracing::info!(
        removed = report.removed,
        wiki = report.wiki,
        canvas_edge = report.canvas_edge,
        unresolved = report.unresolved,
        "rebuilt explicit links"
    );
    Ok(report)
}

/// Rebuilds wiki-links plus inferred shared-tag and title-containment links.
pub fn generate_links(store: &GraphStore) -> Result<LinkRebuildReport> {
    let mut report = LinkRebuildReport {
        removed: store.clear_links().context("Failed to clear links")?,
        ..Default::default()
    };
    let nodes = store.list_nodes()?;
    let lookup = NodeLookup::new(&nodes);

    create_wiki_links(store, &nodes, &lookup, &mut report)?;
    create_tag_links(store, &nodes, &mut report)?;
    create_title_links(store, &nodes, &mut report)?;

    tracing::info!(
        removed = report.removed,
        wiki = report.wiki,
        tag = report.tag,
        title_similarity = report.title_similarity,
        unresolved = report.unresolved,
        "generated links"
    );
    Ok(report)
}

fn create(
    store: &GraphStore,
    report: &mut LinkRebuildReport,
    source: &ObsidianNode,
    target: &ObsidianNode,
    link_type: LinkType,
    strength: f64,
    metadata: Value,
) -> Result<()> {
    let created = store
        .create_link(source.id(), target.id(), link_type, strength, &metadata)
        .context("Failed to create links")?;

    if created.is_some() {
        tracing::info!(
            link_type = %link_type,
            strength,
            "{} -> {}",
            source.title(),
            target.title()
        );
        report.record(link_type);
    }
    Ok(())
}

fn create_wiki_links(
    store: &GraphStore,
    nodes: &[ObsidianNode],
    lookup: &NodeLookup<'_>,
    report: &mut LinkRebuildReport,
) -> Result<()> {
    for node in nodes {
        for wiki in extract_wiki_links(node.content()) {
            let Some(target) = lookup.resolve(&wiki.target) else {
                tracing::debug!(source = node.path(), target = %wiki.target, "unresolved wiki-link");
                report.unresolved += 1;
                continue;
            };
            let metadata = wiki
                .label
                .map(|label| json!({ "label": label }))
                .unwrap_or_else(|| json!({}));
            create(
                store,
                report,
                node,
                target,
                LinkType::Wiki,
                LinkType::Wiki.default_strength(),
                metadata,
            )?;
        }
    }
    Ok(())
}

fn create_canvas_edge_links(
    store: &GraphStore,
    nodes: &[ObsidianNode],
    lookup: &NodeLookup<'_>,
    report: &mut LinkRebuildReport,
) -> Result<()> {
    for node in nodes {
        let Some(raw_edges) = node.metadata().get("canvasEdges") else {
            continue;
        };
        let edges: Vec<EdgeDraft> = match serde_json::from_value(raw_edges.clone()) {
            Ok(edges) => edges,
            Err(e) => {
                tracing::warn!(path = node.path(), error = %e, "ignoring malformed canvasEdges");
                continue;
            }
        };

        for edge in edges {
            let (Some(source), Some(target)) = (
                lookup.by_path(&edge.source_path),
                lookup.by_path(&edge.target_path),
            ) else {
                report.unresolved += 1;
                continue;
            };
            create(
                store,
                report,
                source,
                target,
                LinkType::CanvasEdge,
                LinkType::CanvasEdge.default_strength(),
                json!({ "canvas": node.path(), "label": edge.label }),
            )?;
        }
    }
    Ok(())
}

fn create_tag_links(
    store: &GraphStore,
    nodes: &[ObsidianNode],
    report: &mut LinkRebuildReport,
) -> Result<()> {
    let tag_sets: Vec<BTreeSet<String>> = nodes
        .iter()
        .map(|n| n.tags().iter().map(|t| t.to_lowercase()).collect())
        .collect();

    for (i, a) in nodes.iter().enumerate() {
        for (j, b) in nodes.iter().enumerate().skip(i + 1) {
            let shared: Vec<&String> = tag_sets[i].intersection(&tag_sets[j]).collect();
            if shared.is_empty() {
                continue;
            }
            create(
                store,
                report,
                a,
                b,
                LinkType::Tag,
                tag_overlap_strength(shared.len()),
                json!({ "sharedTags": shared }),
            )?;
        }
    }
    Ok(())
}

fn create_title_links(
    store: &GraphStore,
    nodes: &[ObsidianNode],
    report: &mut LinkRebuildReport,
) -> Result<()> {
    for (i, a) in nodes.iter().enumerate() {
        for b in nodes.iter().skip(i + 1) {
            if !titles_overlap(a.title(), b.title()) {
                continue;
            }
            create(
                store,
                report,
                a,
                b,
                LinkType::TitleSimilarity,
                LinkType::TitleSimilarity.default_strength(),
                json!({ "titles": [a.title(), b.title()] }),
            )?;
        }
    }
    Ok(())
}

/// Resolves wiki-link targets against stored nodes.
struct NodeLookup<'a> {
    by_path: HashMap<&'a str, &'a ObsidianNode>,
    by_key: HashMap<String, &'a ObsidianNode>,
}

impl<'a> NodeLookup<'a> {
    fn new(nodes: &'a [ObsidianNode]) -> Self {
        let mut by_path = HashMap::new();
        let mut by_key = HashMap::new();

        for node in nodes {
            by_path.insert(node.path(), node);
            // Canvas elements are reachable by path only
            if node.path().contains('#') {
                continue;
            }
            for key in [
                node.path().to_lowercase(),
                node.file_name().to_lowercase(),
                file_stem(node.path()).to_lowercase(),
                node.title().to_lowercase(),
            ] {
                by_key.entry(key).or_insert(node);
            }
        }

        Self { by_path, by_key }
    }

    fn by_path(&self, path: &str) -> Option<&'a ObsidianNode> {
        self.by_path.get(path).copied()
    }

    /// Tries the exact path, then path, file name, stem and title ignoring case.
    fn resolve(&self, target: &str) -> Option<&'a ObsidianNode> {
        let normalized = normalize_link_target(target);
        if let Some(node) = self.by_path(&normalized) {
            return Some(node);
        }

        let name = normalized.rsplit('/').next().unwrap_or(&normalized);
        [
            normalized.to_lowercase(),
            name.to_lowercase(),
            target.trim().to_lowercase(),
        ]
        .iter()
        .find_map(|key| self.by_key.get(key).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, NodeDraft, SourceType};

    // Tags are given comma separated.
    fn store_with(notes: &[(&str, &str, &str)]) -> GraphStore {
        let store = GraphStore::new(Database::in_memory().unwrap());
        for &(path, content, tags) in notes {
            let title = crate::importer::markdown::extract_title(content, path);
            let tags = tags
                .split(',')
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
            let draft =
                NodeDraft::new(title, content, path, SourceType::Obsidian).with_tags(tags);
            store.upsert_node(&draft).unwrap();
        }
        store
    }

    #[test]
    fn tag_strength_grows_and_caps() {
        assert_eq!(tag_overlap_strength(1), 0.3);
        assert_eq!(tag_overlap_strength(2), 0.4);
        assert_eq!(tag_overlap_strength(8), 1.0);
        assert_eq!(tag_overlap_strength(9), 1.0);
        assert_eq!(tag_overlap_strength(40), 1.0);
    }

    #[test]
    fn title_overlap_ignores_short_titles() {
        assert!(titles_overlap("Garden", "Community Garden"));
        assert!(titles_overlap("community garden", "GARDEN"));
        assert!(!titles_overlap("AI", "AI Ethics"));
        assert!(!titles_overlap("Alpha", "Beta"));
    }

    #[test]
    fn explicit_links_only_create_wiki_and_canvas_edges() {
        let store = store_with(&[
            ("A.md", "# Alpha\nSee [[Beta]] #project", "project"),
            ("B.md", "# Beta\n#project", "project"),
        ]);

        let report = extract_explicit_links(&store).unwrap();

        assert_eq!(report.wiki, 1);
        assert_eq!(report.tag, 0);
        assert_eq!(report.total(), 1);
        let links = store.list_links().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::Wiki);
    }

    #[test]
    fn explicit_links_resolve_by_file_stem_ignoring_case() {
        let store = store_with(&[
            ("notes/A.md", "[[b]]", ""),
            ("notes/B.md", "# Something else", ""),
        ]);

        let report = extract_explicit_links(&store).unwrap();
        assert_eq!(report.wiki, 1);
        assert_eq!(report.unresolved, 0);
    }

    #[test]
    fn explicit_links_use_stored_canvas_edges() {
        let store = GraphStore::new(Database::in_memory().unwrap());
        let parsed = crate::importer::canvas::parse_canvas_file(
            r#"{"nodes": [{"id": "a", "type": "text", "text": "one"},
                          {"id": "b", "type": "text", "text": "two"}],
                "edges": [{"id": "e", "fromNode": "a", "toNode": "b"},
                          {"id": "f", "fromNode": "a", "toNode": "gone"}]}"#,
            "B.canvas",
        )
        .unwrap();
        store.upsert_nodes(&parsed.nodes).unwrap();

        let report = extract_explicit_links(&store).unwrap();

        assert_eq!(report.canvas_edge, 1);
        assert_eq!(report.unresolved, 1);
    }

    #[test]
    fn rebuild_replaces_existing_links() {
        let store = store_with(&[("A.md", "[[B]]", ""), ("B.md", "", "")]);

        extract_explicit_links(&store).unwrap();
        let report = extract_explicit_links(&store).unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(store.count_links().unwrap(), 1);
    }

    #[test]
    fn generate_links_adds_tag_links_with_shared_tags() {
        let store = store_with(&[
            ("A.md", "# First", "health,Education,x"),
            ("B.md", "# Second", "education,health"),
        ]);

        let report = generate_links(&store).unwrap();

        assert_eq!(report.tag, 1);
        let links = store.list_links().unwrap();
        assert_eq!(links[0].link_type, LinkType::Tag);
        assert_eq!(links[0].strength, 0.4);
        assert_eq!(links[0].metadata["sharedTags"], json!(["education", "health"]));
    }

    #[test]
    fn generate_links_adds_title_containment_links() {
        let store = store_with(&[
            ("Garden.md", "# Garden", ""),
            ("Plan.md", "# Community Garden Plan", ""),
            ("Other.md", "# Unrelated", ""),
        ]);

        let report = generate_links(&store).unwrap();

        assert_eq!(report.title_similarity, 1);
        let links = store.list_links().unwrap();
        assert_eq!(links[0].link_type, LinkType::TitleSimilarity);
        assert_eq!(links[0].strength, 0.2);
    }

    #[test]
    fn generate_links_counts_unresolved_wiki_links() {
        let store = store_with(&[("A.md", "[[Nowhere]]", "")]);

        let report = generate_links(&store).unwrap();
        assert_eq!(report.unresolved, 1);
        assert_eq!(report.total(), 0);
    }
}
