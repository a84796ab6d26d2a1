//! Canvas JSON and Canvas2Document parsing.
//!
//! Both parsers are pure functions of their input text. They return node
//! drafts keyed by `<file path>#<element id>` plus edges addressed by those
//! paths; database ids are assigned later by the store.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use super::inference::{Category, infer_categories_from_text, infer_domains};
use super::markdown::file_stem;
use crate::{NodeDraft, SourceType};

const SHORT_TITLE_MAX: usize = 50;
const TRUNCATED_TITLE_LEN: usize = 40;

/// Errors raised while parsing a single canvas document.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// The document is not valid JSON.
    #[error("Failed to parse canvas file {path}: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The top-level `nodes` field is missing or not an array.
    #[error("Invalid canvas file {path}: missing 'nodes' array")]
    MissingNodes { path: String },

    /// A node entry does not have the expected shape.
    #[error("Invalid canvas file {path}: node {index} is malformed: {source}")]
    InvalidNode {
        path: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    /// An edge entry does not have the expected shape.
    #[error("Invalid canvas file {path}: edge {index} is malformed: {source}")]
    InvalidEdge {
        path: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A Canvas2Document export without any card header.
    #[error("Invalid canvas document {path}: no card headers found")]
    NoCards { path: String },
}

/// Kind of a canvas element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanvasNodeType {
    Text,
    File,
    Link,
    Group,
    Other,
}

impl CanvasNodeType {
    fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("text") => Self::Text,
            Some("file") => Self::File,
            Some("link") => Self::Link,
            Some("group") => Self::Group,
            _ => Self::Other,
        }
    }

    /// Returns the lowercase name used in tags and metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
            Self::Link => "link",
            Self::Group => "group",
            Self::Other => "other",
        }
    }

    /// Tag used when no category could be inferred from the element text.
    pub fn fallback_tag(self) -> &'static str {
        match self {
            Self::Text => "note",
            Self::File => "resource",
            Self::Link => "reference",
            Self::Group => "project",
            Self::Other => "concept",
        }
    }
}

/// An edge between two parsed elements, addressed by node path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source_path: String,
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_side: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_side: Option<String>,
}

impl EdgeDraft {
    fn between(source_path: String, target_path: String, label: Option<String>) -> Self {
        Self {
            id: None,
            source_path,
            target_path,
            label,
            from_side: None,
            to_side: None,
        }
    }
}

/// Output of either canvas parser.
///
/// `nodes[0]` is always the root node representing the whole file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCanvas {
    pub nodes: Vec<NodeDraft>,
    pub edges: Vec<EdgeDraft>,
}

impl ParsedCanvas {
    /// Returns the root node path.
    pub fn root_path(&self) -> Option<&str> {
        self.nodes.first().map(|n| n.path.as_str())
    }

    /// Returns the element nodes, excluding the root.
    pub fn elements(&self) -> &[NodeDraft] {
        self.nodes.get(1..).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Position {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct CanvasNode {
    id: String,
    #[serde(rename = "type")]
    node_type: Option<String>,
    text: Option<String>,
    file: Option<String>,
    url: Option<String>,
    label: Option<String>,
    position: Option<Position>,
    x: Option<f64>,
    y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    color: Option<String>,
}

impl CanvasNode {
    fn position(&self) -> Option<(f64, f64)> {
        match (&self.position, self.x, self.y) {
            (Some(p), _, _) => Some((p.x, p.y)),
            (None, Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanvasEdge {
    id: Option<String>,
    from_node: String,
    from_side: Option<String>,
    to_node: String,
    to_side: Option<String>,
    label: Option<String>,
}

/// Builds the path of a canvas element from its file path and element id.
pub fn element_path(file_path: &str, element_id: &str) -> String {
    format!("{file_path}#{element_id}")
}

/// Derives a title for a text element.
///
/// A markdown heading on the first line wins, then a first line of at most
/// 50 characters, else the first line truncated to 40 characters with `...`.
///
/// # Examples
///
/// ```
/// use mindtree::importer::canvas::text_title;
///
/// assert_eq!(text_title("## Garden plan\nwater daily"), "Garden plan");
/// assert_eq!(text_title("Short line\nmore"), "Short line");
/// assert_eq!(
///     text_title("This first line is definitely longer than fifty characters in total"),
///     "This first line is definitely longer tha..."
/// );
/// ```
pub fn text_title(text: &str) -> String {
    let first_line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    if first_line.starts_with('#') {
        let heading = first_line.trim_start_matches('#').trim();
        if !heading.is_empty() {
            return heading.to_string();
        }
    }

    if first_line.is_empty() {
        return "Untitled".to_string();
    }

    if first_line.chars().count() <= SHORT_TITLE_MAX {
        return first_line.to_string();
    }

    let truncated: String = first_line.chars().take(TRUNCATED_TITLE_LEN).collect();
    format!("{truncated}...")
}

/// Builds the tag list for a canvas element.
///
/// Base tags come first, then inferred categories, deduplicated. Without any
/// inferred category the per-type fallback tag is appended.
fn element_tags(base: &[&str], categories: &[Category], fallback: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in base
        .iter()
        .copied()
        .chain(categories.iter().map(|c| c.as_str()))
    {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    if categories.is_empty() && !tags.iter().any(|t| t == fallback) {
        tags.push(fallback.to_string());
    }
    tags
}

fn title_and_content(node: &CanvasNode, node_type: CanvasNodeType) -> (String, String) {
    match node_type {
        CanvasNodeType::Text => {
            let text = node.text.clone().unwrap_or_default();
            (text_title(&text), text)
        }
        CanvasNodeType::File => {
            let file = node.file.clone().unwrap_or_default();
            let name = file.rsplit('/').next().unwrap_or(&file).to_string();
            let title = if name.is_empty() {
                format!("File {}", node.id)
            } else {
                name
            };
            (title, format!("File: {file}"))
        }
        CanvasNodeType::Link => {
            let url = node.url.clone().unwrap_or_default();
            let title = node
                .label
                .clone()
                .or_else(|| node.text.clone())
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| url.clone());
            (title, format!("Link: {url}"))
        }
        CanvasNodeType::Group => {
            let title = node
                .label
                .clone()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| format!("Group {}", node.id));
            (title.clone(), format!("Group: {title}"))
        }
        CanvasNodeType::Other => {
            let text = node.text.clone().unwrap_or_default();
            let title = if text.trim().is_empty() {
                format!("Node {}", node.id)
            } else {
                text_title(&text)
            };
            (title, text)
        }
    }
}

fn root_node(
    file_path: &str,
    source_type: SourceType,
    content: String,
    all_text: &str,
    edges: &[EdgeDraft],
    element_count: usize,
) -> NodeDraft {
    let title = file_stem(file_path);
    let domains = infer_domains(&format!("{title} {all_text}"));

    NodeDraft::new(title, content, file_path, source_type)
        .with_tags(vec!["canvas-file".to_string(), "project".to_string()])
        .with_metadata(json!({
            "category": "project",
            "domains": domains,
            "isCanvasRoot": true,
            "nodeCount": element_count,
            "edgeCount": edges.len(),
            "canvasEdges": edges,
        }))
}

/// Parses an Obsidian Canvas JSON document.
///
/// Fails when `nodes` is missing or not an array. A missing `edges` field is
/// tolerated and yields no edges.
///
/// # Examples
///
/// ```
/// use mindtree::importer::canvas::parse_canvas_file;
///
/// let canvas = r#"{"nodes": [{"id": "a", "type": "text", "text": "Hello"}]}"#;
/// let parsed = parse_canvas_file(canvas, "board.canvas").unwrap();
///
/// assert_eq!(parsed.nodes.len(), 2);
/// assert_eq!(parsed.nodes[1].path, "board.canvas#a");
/// assert!(parsed.edges.is_empty());
/// ```
pub fn parse_canvas_file(content: &str, file_path: &str) -> Result<ParsedCanvas, CanvasError> {
    let document: Value =
        serde_json::from_str(content).map_err(|source| CanvasError::InvalidJson {
            path: file_path.to_string(),
            source,
        })?;

    let raw_nodes = document
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| CanvasError::MissingNodes {
            path: file_path.to_string(),
        })?;

    let raw_edges = match document.get("edges").and_then(Value::as_array) {
        Some(edges) => edges.as_slice(),
        None => {
            tracing::warn!(path = file_path, "canvas has no edges array, using none");
            &[]
        }
    };

    let mut canvas_nodes = Vec::with_capacity(raw_nodes.len());
    for (index, raw) in raw_nodes.iter().enumerate() {
        let node: CanvasNode =
            serde_json::from_value(raw.clone()).map_err(|source| CanvasError::InvalidNode {
                path: file_path.to_string(),
                index,
                source,
            })?;
        canvas_nodes.push(node);
    }
    let mut seen_ids = HashSet::new();
    canvas_nodes.retain(|node| {
        let first = seen_ids.insert(node.id.clone());
        if !first {
            tracing::warn!(
                path = file_path,
                id = %node.id,
                "duplicate canvas node id, keeping the first"
            );
        }
        first
    });

    let mut edges = Vec::with_capacity(raw_edges.len());
    for (index, raw) in raw_edges.iter().enumerate() {
        let edge: CanvasEdge =
            serde_json::from_value(raw.clone()).map_err(|source| CanvasError::InvalidEdge {
                path: file_path.to_string(),
                index,
                source,
            })?;
        edges.push(EdgeDraft {
            id: edge.id,
            source_path: element_path(file_path, &edge.from_node),
            target_path: element_path(file_path, &edge.to_node),
            label: edge.label,
            from_side: edge.from_side,
            to_side: edge.to_side,
        });
    }

    let mut elements = Vec::with_capacity(canvas_nodes.len());
    let mut all_text = String::new();

    for node in &canvas_nodes {
        let node_type = CanvasNodeType::from_raw(node.node_type.as_deref());
        let (title, text) = title_and_content(node, node_type);
        let categories = infer_categories_from_text(&text);
        let domains = infer_domains(&format!("{title} {text}"));
        let type_tag = format!("canvas-{}", node_type.as_str());
        let tags = element_tags(
            &["canvas", type_tag.as_str()],
            &categories,
            node_type.fallback_tag(),
        );
        let primary = categories
            .first()
            .map(|c| c.as_str())
            .unwrap_or(node_type.fallback_tag());

        let position = node.position().map(|(x, y)| json!({"x": x, "y": y}));
        let metadata = json!({
            "category": primary,
            "categories": categories.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            "domains": domains,
            "canvasNodeType": node_type.as_str(),
            "canvasId": node.id,
            "position": position,
            "width": node.width,
            "height": node.height,
            "color": node.color,
            "parentCanvas": file_path,
        });

        all_text.push_str(&title);
        all_text.push(' ');
        all_text.push_str(&text);
        all_text.push('\n');

        elements.push(
            NodeDraft::new(
                title,
                text,
                element_path(file_path, &node.id),
                SourceType::Canvas,
            )
            .with_tags(tags)
            .with_metadata(metadata),
        );
    }

    tracing::debug!(
        path = file_path,
        nodes = elements.len(),
        edges = edges.len(),
        "parsed canvas"
    );

    let summary = format!(
        "Canvas {} with {} nodes and {} connections",
        file_stem(file_path),
        elements.len(),
        edges.len()
    );
    let mut nodes = vec![root_node(
        file_path,
        SourceType::Canvas,
        summary,
        &all_text,
        &edges,
        elements.len(),
    )];
    nodes.extend(elements);

    Ok(ParsedCanvas { nodes, edges })
}

static CARD_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#\s+_((?i:card|media))\b[ \t]*(.*)$").expect("static regex: card header")
});

static NODE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^node\s+\^([A-Za-z0-9_-]+)\s*$").expect("static regex: node id")
});

static LINK_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^>\s*(linking to|linked from)\s*:(.*)$").expect("static regex: link annotation")
});

static BLOCK_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[#\^([^|\]]+)(?:\|([^\]]*))?\]\]").expect("static regex: block reference")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

#[derive(Debug)]
struct CardReference {
    direction: Direction,
    target_id: String,
    label: Option<String>,
}

#[derive(Debug)]
struct Card {
    title: String,
    media: bool,
    id: Option<String>,
    body: Vec<String>,
    references: Vec<CardReference>,
}

/// Splits a Canvas2Document export into a preamble and cards in one pass.
fn tokenize_cards(content: &str) -> (String, Vec<Card>) {
    let mut preamble = Vec::new();
    let mut cards: Vec<Card> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim_end();

        if let Some(caps) = CARD_HEADER.captures(trimmed) {
            let media = caps[1].eq_ignore_ascii_case("media");
            cards.push(Card {
                title: caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
                media,
                id: None,
                body: Vec::new(),
                references: Vec::new(),
            });
            continue;
        }

        let Some(card) = cards.last_mut() else {
            preamble.push(trimmed.to_string());
            continue;
        };

        if card.id.is_none()
            && let Some(caps) = NODE_ID.captures(trimmed.trim_start())
        {
            card.id = caps.get(1).map(|m| m.as_str().to_string());
            continue;
        }

        if let Some(caps) = LINK_ANNOTATION.captures(trimmed.trim_start()) {
            let direction = if &caps[1] == "linking to" {
                Direction::Forward
            } else {
                Direction::Backward
            };
            let refs: Vec<CardReference> = BLOCK_REF
                .captures_iter(&caps[2])
                .map(|r| CardReference {
                    direction,
                    target_id: r[1].trim().to_string(),
                    label: r.get(2).map(|l| l.as_str().trim().to_string()),
                })
                .collect();
            card.references.extend(refs);
            continue;
        }

        card.body.push(trimmed.to_string());
    }

    (preamble.join("\n").trim().to_string(), cards)
}

/// Parses a Canvas2Document markdown export.
///
/// Cards start at `# _card <title>` or `# _Media <title>` headers and carry
/// their id on a following `node ^<id>` line. `> linking to:` annotations
/// become edges from the card; `> linked from:` annotations become edges into
/// the card unless the same pair was already recorded.
pub fn parse_canvas2document_file(
    content: &str,
    file_path: &str,
) -> Result<ParsedCanvas, CanvasError> {
    let (preamble, cards) = tokenize_cards(content);
    if cards.is_empty() {
        return Err(CanvasError::NoCards {
            path: file_path.to_string(),
        });
    }

    let mut seen_ids = HashSet::new();
    let cards: Vec<(&Card, String)> = cards
        .iter()
        .enumerate()
        .map(|(index, card)| {
            let id = card.id.clone().unwrap_or_else(|| format!("card-{}", index + 1));
            (card, id)
        })
        .filter(|(_, id)| {
            let first = seen_ids.insert(id.clone());
            if !first {
                tracing::warn!(path = file_path, id = %id, "duplicate card id, keeping the first");
            }
            first
        })
        .collect();
    let path_by_id: HashMap<&str, String> = cards
        .iter()
        .map(|(_, id)| (id.as_str(), element_path(file_path, id)))
        .collect();

    let mut elements = Vec::with_capacity(cards.len());
    let mut edges: Vec<EdgeDraft> = Vec::new();
    let mut recorded: HashSet<(String, String)> = HashSet::new();
    let mut all_text = String::new();
    let mut unresolved = 0usize;

    for (card, id) in &cards {
        let path = element_path(file_path, id);
        let body = card.body.join("\n").trim().to_string();
        let title = if card.title.is_empty() {
            text_title(&body)
        } else {
            card.title.clone()
        };
        let categories = infer_categories_from_text(&format!("{title}\n{body}"));
        let domains = infer_domains(&format!("{title} {body}"));
        let kind = if card.media { "media" } else { "card" };
        let fallback = if card.media { "resource" } else { "note" };
        let tags = element_tags(&["canvas2document", kind], &categories, fallback);
        let primary = categories.first().map(|c| c.as_str()).unwrap_or(fallback);

        all_text.push_str(&title);
        all_text.push(' ');
        all_text.push_str(&body);
        all_text.push('\n');

        for reference in &card.references {
            let Some(other) = path_by_id.get(reference.target_id.as_str()) else {
                unresolved += 1;
                continue;
            };
            let (source, target) = match reference.direction {
                Direction::Forward => (path.clone(), other.clone()),
                Direction::Backward => (other.clone(), path.clone()),
            };
            if source == target {
                continue;
            }
            if reference.direction == Direction::Backward
                && (recorded.contains(&(source.clone(), target.clone()))
                    || recorded.contains(&(target.clone(), source.clone())))
            {
                continue;
            }
            if recorded.insert((source.clone(), target.clone())) {
                edges.push(EdgeDraft::between(source, target, reference.label.clone()));
            }
        }

        elements.push(
            NodeDraft::new(title, body, path, SourceType::Canvas2Document)
                .with_tags(tags)
                .with_metadata(json!({
                    "category": primary,
                    "categories": categories.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
                    "domains": domains,
                    "canvasNodeType": kind,
                    "canvasId": id,
                    "parentCanvas": file_path,
                })),
        );
    }

    if unresolved > 0 {
        tracing::warn!(
            path = file_path,
            unresolved,
            "canvas document references unknown card ids"
        );
    }

    let root_content = if preamble.is_empty() {
        format!(
            "Canvas document {} with {} cards and {} connections",
            file_stem(file_path),
            elements.len(),
            edges.len()
        )
    } else {
        preamble
    };

    let mut nodes = vec![root_node(
        file_path,
        SourceType::Canvas2Document,
        root_content,
        &all_text,
        &edges,
        elements.len(),
    )];
    nodes.extend(elements);

    Ok(ParsedCanvas { nodes, edges })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = r##"{
        "nodes": [
            {"id": "n1", "type": "text", "text": "# Community garden\nA project for residents", "position": {"x": 0, "y": 0}, "width": 200, "height": 100, "color": "4"},
            {"id": "n2", "type": "file", "file": "docs/Budget.md", "x": 300, "y": 0, "width": 200, "height": 100},
            {"id": "n3", "type": "link", "url": "https://example.org"},
            {"id": "n4", "type": "group"},
            {"id": "n5", "type": "mystery"}
        ],
        "edges": [
            {"id": "e1", "fromNode": "n1", "fromSide": "right", "toNode": "n2", "toSide": "left", "label": "funds"}
        ]
    }"##;

    #[test]
    fn parses_root_plus_one_node_per_element() {
        let parsed = parse_canvas_file(BOARD, "boards/Garden.canvas").unwrap();

        assert_eq!(parsed.nodes.len(), 6);
        let root = &parsed.nodes[0];
        assert_eq!(root.path, "boards/Garden.canvas");
        assert_eq!(root.title, "Garden");
        assert_eq!(root.tags, vec!["canvas-file", "project"]);
        assert_eq!(root.metadata["category"], "project");
        assert_eq!(root.metadata["nodeCount"], 5);
        assert_eq!(root.metadata["edgeCount"], 1);
        assert_eq!(parsed.root_path(), Some("boards/Garden.canvas"));
        assert_eq!(parsed.elements().len(), 5);
    }

    #[test]
    fn element_titles_follow_node_type() {
        let parsed = parse_canvas_file(BOARD, "Garden.canvas").unwrap();
        let titles: Vec<&str> = parsed.elements().iter().map(|n| n.title.as_str()).collect();

        assert_eq!(
            titles,
            vec![
                "Community garden",
                "Budget.md",
                "https://example.org",
                "Group n4",
                "Node n5"
            ]
        );
    }

    #[test]
    fn element_tags_combine_base_categories_and_fallback() {
        let parsed = parse_canvas_file(BOARD, "Garden.canvas").unwrap();
        let elements = parsed.elements();

        // Text with "project" in it gets the inferred category
        assert_eq!(elements[0].tags, vec!["canvas", "canvas-text", "project"]);
        assert_eq!(elements[0].metadata["category"], "project");
        // Link with nothing inferable gets the per-type fallback
        assert_eq!(elements[2].tags, vec!["canvas", "canvas-link", "reference"]);
        assert_eq!(elements[3].tags, vec!["canvas", "canvas-group", "project"]);
        assert_eq!(elements[4].tags, vec!["canvas", "canvas-other", "concept"]);
    }

    #[test]
    fn element_metadata_carries_geometry_and_parent() {
        let parsed = parse_canvas_file(BOARD, "Garden.canvas").unwrap();
        let first = &parsed.elements()[0];
        let second = &parsed.elements()[1];

        assert_eq!(first.path, "Garden.canvas#n1");
        assert_eq!(first.metadata["position"]["x"], 0.0);
        assert_eq!(first.metadata["width"], 200.0);
        assert_eq!(first.metadata["color"], "4");
        assert_eq!(first.metadata["parentCanvas"], "Garden.canvas");
        assert!(
            first.metadata["domains"]
                .as_array()
                .unwrap()
                .contains(&json!("community"))
        );
        // Top-level x/y are accepted as position too
        assert_eq!(second.metadata["position"]["x"], 300.0);
    }

    #[test]
    fn edges_are_resolved_to_element_paths() {
        let parsed = parse_canvas_file(BOARD, "Garden.canvas").unwrap();

        assert_eq!(parsed.edges.len(), 1);
        let edge = &parsed.edges[0];
        assert_eq!(edge.source_path, "Garden.canvas#n1");
        assert_eq!(edge.target_path, "Garden.canvas#n2");
        assert_eq!(edge.label.as_deref(), Some("funds"));
        assert_eq!(
            parsed.nodes[0].metadata["canvasEdges"][0]["sourcePath"],
            "Garden.canvas#n1"
        );
    }

    #[test]
    fn missing_nodes_array_is_an_error() {
        let err = parse_canvas_file(r#"{"edges": []}"#, "bad.canvas").unwrap_err();
        assert!(matches!(err, CanvasError::MissingNodes { .. }));
        assert!(err.to_string().contains("bad.canvas"));

        let err = parse_canvas_file(r#"{"nodes": {}}"#, "bad.canvas").unwrap_err();
        assert!(matches!(err, CanvasError::MissingNodes { .. }));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = parse_canvas_file("{not json", "broken.canvas").unwrap_err();
        assert!(matches!(err, CanvasError::InvalidJson { .. }));
    }

    #[test]
    fn node_without_id_is_an_error() {
        let err = parse_canvas_file(r#"{"nodes": [{"type": "text"}]}"#, "x.canvas").unwrap_err();
        assert!(matches!(err, CanvasError::InvalidNode { index: 0, .. }));
    }

    #[test]
    fn missing_edges_yields_empty_edge_list() {
        let canvas = r#"{"nodes": [
            {"id": "a", "type": "text", "text": "one"},
            {"id": "b", "type": "text", "text": "two"}
        ]}"#;

        let parsed = parse_canvas_file(canvas, "x.canvas").unwrap();
        assert_eq!(parsed.nodes.len(), 3);
        assert!(parsed.edges.is_empty());
    }

    #[test]
    fn text_title_truncates_long_first_line() {
        let long = "a".repeat(60);
        let title = text_title(&long);
        assert_eq!(title.chars().count(), 43);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn text_title_handles_empty_text() {
        assert_eq!(text_title("   \n  "), "Untitled");
    }

    const DOCUMENT: &str = "# Canvas\nOverview of the board\n\n# _card First idea\nnode ^aaa\nAn idea about the garden\n> linking to: [[#^bbb|Second]]\n\n# _card Second\nnode ^bbb\nDetails here\n> linked from: [[#^aaa|First idea]]\n> linking to: [[#^ccc|Photo]]\n\n# _Media Photo\nnode ^ccc\n![[photo.png]]\n";

    #[test]
    fn canvas2document_emits_root_and_cards() {
        let parsed = parse_canvas2document_file(DOCUMENT, "Board.md").unwrap();

        assert_eq!(parsed.nodes.len(), 4);
        assert_eq!(parsed.nodes[0].path, "Board.md");
        assert_eq!(parsed.nodes[0].source_type, SourceType::Canvas2Document);
        assert!(parsed.nodes[0].content.contains("Overview of the board"));

        let titles: Vec<&str> = parsed.elements().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["First idea", "Second", "Photo"]);
        assert_eq!(parsed.elements()[0].path, "Board.md#aaa");
        assert_eq!(parsed.elements()[0].content, "An idea about the garden");
        assert!(parsed.elements()[2].tags.contains(&"media".to_string()));
    }

    #[test]
    fn canvas2document_deduplicates_reciprocal_links() {
        let parsed = parse_canvas2document_file(DOCUMENT, "Board.md").unwrap();

        let pairs: Vec<(&str, &str)> = parsed
            .edges
            .iter()
            .map(|e| (e.source_path.as_str(), e.target_path.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("Board.md#aaa", "Board.md#bbb"), ("Board.md#bbb", "Board.md#ccc")]
        );
    }

    #[test]
    fn canvas2document_backward_link_without_forward_is_kept() {
        let doc = "# Canvas\n# _card A\nnode ^a\n# _card B\nnode ^b\n> linked from: [[#^a|A]]\n";
        let parsed = parse_canvas2document_file(doc, "d.md").unwrap();

        assert_eq!(parsed.edges.len(), 1);
        assert_eq!(parsed.edges[0].source_path, "d.md#a");
        assert_eq!(parsed.edges[0].target_path, "d.md#b");
    }

    #[test]
    fn canvas2document_drops_unknown_targets() {
        let doc = "# Canvas\n# _card A\nnode ^a\n> linking to: [[#^zzz|Ghost]]\n";
        let parsed = parse_canvas2document_file(doc, "d.md").unwrap();
        assert!(parsed.edges.is_empty());
    }

    #[test]
    fn canvas2document_card_without_id_gets_generated_id() {
        let doc = "# Canvas\n# _card Lonely\nno id line\n";
        let parsed = parse_canvas2document_file(doc, "d.md").unwrap();
        assert_eq!(parsed.elements()[0].path, "d.md#card-1");
    }

    #[test]
    fn canvas2document_without_cards_is_an_error() {
        let err = parse_canvas2document_file("# Canvas\n# _draft\n", "d.md").unwrap_err();
        assert!(matches!(err, CanvasError::NoCards { .. }));
    }
}
