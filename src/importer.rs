//! Turns a set of vault files into node and link drafts.
//!
//! Parsing never touches the database. [`parse_obsidian_data`] collects one
//! [`ImportBatch`] for all files; the service upserts it afterwards.

pub mod canvas;
pub mod inference;
pub mod markdown;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value, json};
use walkdir::WalkDir;

use crate::{LinkDraft, LinkType, NodeDraft, SourceType};
use canvas::{CanvasError, ParsedCanvas, parse_canvas_file, parse_canvas2document_file};
use inference::{category_from_tags, infer_domains};
use markdown::{
    extract_tags, extract_title, extract_wiki_links, normalize_link_target, split_front_matter,
};

/// Largest gap in canvas units between two elements still treated as adjacent.
pub const ADJACENCY_GAP: f64 = 60.0;

/// How a file is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Markdown,
    Canvas,
    Canvas2Document,
    Text,
}

/// Classifies a file by extension, sniffing markdown for Canvas2Document
/// exports. Unsupported extensions return `None`.
///
/// # Examples
///
/// ```
/// use mindtree::importer::{FileKind, classify};
///
/// assert_eq!(classify("a.md", "# Hello"), Some(FileKind::Markdown));
/// assert_eq!(classify("b.md", "# Canvas\n# _card One"), Some(FileKind::Canvas2Document));
/// assert_eq!(classify("c.canvas", "{}"), Some(FileKind::Canvas));
/// assert_eq!(classify("d.png", ""), None);
/// ```
pub fn classify(path: &str, content: &str) -> Option<FileKind> {
    let extension = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())?;

    match extension.as_str() {
        "md" if content.contains("# Canvas") && content.contains("# _") => {
            Some(FileKind::Canvas2Document)
        }
        "md" => Some(FileKind::Markdown),
        "canvas" => Some(FileKind::Canvas),
        "txt" => Some(FileKind::Text),
        _ => None,
    }
}

/// A file handed to the importer: a vault-relative path and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A file that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// Everything parsed from one import call.
#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    pub nodes: Vec<NodeDraft>,
    pub links: Vec<LinkDraft>,
    pub failures: Vec<FileFailure>,
    /// Paths skipped because of an unsupported extension.
    pub skipped: Vec<String>,
    /// Wiki-links whose target is not part of the batch.
    pub unresolved_links: usize,
}

impl ImportBatch {
    /// Number of links per type, in first-seen order.
    pub fn link_counts(&self) -> Vec<(LinkType, usize)> {
        let mut counts: Vec<(LinkType, usize)> = Vec::new();
        for link in &self.links {
            match counts.iter_mut().find(|(t, _)| *t == link.link_type) {
                Some((_, n)) => *n += 1,
                None => counts.push((link.link_type, 1)),
            }
        }
        counts
    }
}

/// Reads every supported file under `root`.
///
/// Hidden directories such as `.obsidian`, `.git` and `.trash` are not
/// descended into. Paths are relative to `root` with forward slashes.
/// Unreadable files are logged and left out.
pub fn collect_directory(root: &Path) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if classify(&path, "").is_none() {
            tracing::debug!(path = %path, "skipping unsupported file");
            continue;
        }

        match fs::read_to_string(entry.path()) {
            Ok(content) => files.push(SourceFile::new(path, content)),
            Err(e) => tracing::warn!(path = %path, error = %e, "skipping unreadable file"),
        }
    }

    tracing::debug!(root = %root.display(), files = files.len(), "collected vault files");
    Ok(files)
}

/// Parses a batch of files into node and link drafts.
///
/// A file that fails to parse is recorded in [`ImportBatch::failures`] and the
/// rest of the batch continues. Wiki-links are kept only when their target is
/// part of the same batch.
pub fn parse_obsidian_data(files: &[SourceFile]) -> ImportBatch {
    let mut batch = ImportBatch::default();
    let mut notes: Vec<usize> = Vec::new();
    let mut canvases: Vec<(String, ParsedCanvas)> = Vec::new();

    for file in files {
        let Some(kind) = classify(&file.path, &file.content) else {
            tracing::debug!(path = %file.path, "unsupported file type");
            batch.skipped.push(file.path.clone());
            continue;
        };

        let parsed = match kind {
            FileKind::Markdown | FileKind::Text => {
                notes.push(batch.nodes.len());
                batch.nodes.push(note_node(file, kind));
                continue;
            }
            FileKind::Canvas => parse_canvas_file(&file.content, &file.path),
            FileKind::Canvas2Document => {
                match parse_canvas2document_file(&file.content, &file.path) {
                    Err(CanvasError::NoCards { .. }) => {
                        tracing::debug!(path = %file.path, "no cards found, importing as markdown");
                        notes.push(batch.nodes.len());
                        batch.nodes.push(note_node(file, FileKind::Markdown));
                        continue;
                    }
                    other => other,
                }
            }
        };

        match parsed {
            Ok(parsed) => {
                batch.nodes.extend(parsed.nodes.iter().cloned());
                canvases.push((file.path.clone(), parsed));
            }
            Err(e) => {
                tracing::warn!(path = %file.path, error = %e, "failed to parse file");
                batch.failures.push(FileFailure {
                    path: file.path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let index = PathIndex::new(&batch.nodes);
    let mut links = LinkSet::default();

    for &position in &notes {
        let node = &batch.nodes[position];
        batch.unresolved_links += collect_wiki_links(&node.path, &node.content, &index, &mut links);
    }

    for (file_path, parsed) in &canvases {
        batch.unresolved_links += collect_canvas_links(file_path, parsed, &index, &mut links);
    }

    if batch.unresolved_links > 0 {
        tracing::warn!(
            unresolved = batch.unresolved_links,
            "links point outside the imported files"
        );
    }

    batch.links = links.into_links();
    batch
}

fn note_node(file: &SourceFile, kind: FileKind) -> NodeDraft {
    let title = extract_title(&file.content, &file.path);
    let tags = extract_tags(&file.content);
    let domains = infer_domains(&format!("{title} {}", file.content));

    let mut metadata = Map::new();
    if let Some(category) = category_from_tags(&tags) {
        metadata.insert("category".into(), json!(category.to_lowercase()));
    }
    metadata.insert("domains".into(), json!(domains));
    metadata.insert(
        "fileType".into(),
        json!(if kind == FileKind::Text { "text" } else { "markdown" }),
    );
    if let Some(front_matter) = front_matter_json(&file.content) {
        metadata.insert("frontMatter".into(), front_matter);
    }

    NodeDraft::new(title, file.content.clone(), file.path.clone(), SourceType::Obsidian)
        .with_tags(tags)
        .with_metadata(Value::Object(metadata))
}

fn front_matter_json(content: &str) -> Option<Value> {
    let (front_matter, _) = split_front_matter(content);
    let yaml: serde_yaml::Value = serde_yaml::from_str(front_matter?).ok()?;
    serde_json::to_value(yaml).ok().filter(Value::is_object)
}

/// Lookup tables used to resolve wiki-link targets to node paths.
struct PathIndex {
    paths: HashSet<String>,
    by_file_name: HashMap<String, String>,
}

impl PathIndex {
    fn new(nodes: &[NodeDraft]) -> Self {
        let mut paths = HashSet::new();
        let mut by_file_name = HashMap::new();

        for node in nodes {
            paths.insert(node.path.clone());
            if node.path.contains('#') {
                continue;
            }
            let name = node.path.rsplit('/').next().unwrap_or(&node.path);
            by_file_name
                .entry(name.to_lowercase())
                .or_insert_with(|| node.path.clone());
        }

        Self {
            paths,
            by_file_name,
        }
    }

    /// Resolves a target relative to the linking file, then as a vault path,
    /// then by file name ignoring case.
    fn resolve(&self, target: &str, from_path: &str) -> Option<String> {
        let normalized = normalize_link_target(target);
        let from_file = from_path.split('#').next().unwrap_or(from_path);

        if let Some((dir, _)) = from_file.rsplit_once('/') {
            let relative = format!("{dir}/{normalized}");
            if self.paths.contains(&relative) {
                return Some(relative);
            }
        }

        if self.paths.contains(&normalized) {
            return Some(normalized);
        }

        let name = normalized.rsplit('/').next().unwrap_or(&normalized);
        self.by_file_name.get(&name.to_lowercase()).cloned()
    }
}

/// Link drafts deduplicated per type and unordered path pair.
#[derive(Default)]
struct LinkSet {
    seen: HashSet<(LinkType, String, String)>,
    links: Vec<LinkDraft>,
}

impl LinkSet {
    fn push(&mut self, link: LinkDraft) -> bool {
        if link.source_path == link.target_path {
            return false;
        }
        let (a, b) = if link.source_path <= link.target_path {
            (link.source_path.clone(), link.target_path.clone())
        } else {
            (link.target_path.clone(), link.source_path.clone())
        };
        if !self.seen.insert((link.link_type, a, b)) {
            return false;
        }
        self.links.push(link);
        true
    }

    fn into_links(self) -> Vec<LinkDraft> {
        self.links
    }
}

/// Adds resolved wiki-links from `content`; returns the unresolved count.
fn collect_wiki_links(
    source_path: &str,
    content: &str,
    index: &PathIndex,
    links: &mut LinkSet,
) -> usize {
    let mut unresolved = 0;

    for wiki in extract_wiki_links(content) {
        match index.resolve(&wiki.target, source_path) {
            Some(target_path) => {
                let mut draft = LinkDraft::new(source_path, target_path, LinkType::Wiki);
                if let Some(label) = wiki.label {
                    draft = draft.with_metadata(json!({ "label": label }));
                }
                links.push(draft);
            }
            None => {
                tracing::debug!(source = source_path, target = %wiki.target, "unresolved wiki-link");
                unresolved += 1;
            }
        }
    }

    unresolved
}

fn collect_canvas_links(
    file_path: &str,
    parsed: &ParsedCanvas,
    index: &PathIndex,
    links: &mut LinkSet,
) -> usize {
    let root = parsed.root_path().unwrap_or(file_path);

    if !parsed.edges.is_empty() {
        let mut unresolved = 0;
        for edge in &parsed.edges {
            if !index.paths.contains(&edge.source_path) || !index.paths.contains(&edge.target_path)
            {
                tracing::warn!(
                    canvas = file_path,
                    source = %edge.source_path,
                    target = %edge.target_path,
                    "canvas edge points to a missing element"
                );
                unresolved += 1;
                continue;
            }
            links.push(
                LinkDraft::new(&edge.source_path, &edge.target_path, LinkType::CanvasEdge)
                    .with_metadata(json!({
                        "canvas": file_path,
                        "canvasEdgeId": edge.id,
                        "label": edge.label,
                        "fromSide": edge.from_side,
                        "toSide": edge.to_side,
                    })),
            );
            links.push(
                LinkDraft::new(root, &edge.source_path, LinkType::Canvas)
                    .with_metadata(json!({ "canvas": file_path })),
            );
        }
        return unresolved;
    }

    let mut unresolved = 0;
    for element in parsed.elements() {
        unresolved += collect_wiki_links(&element.path, &element.content, index, links);
    }

    let boxes: Vec<(&str, Bounds)> = parsed
        .elements()
        .iter()
        .filter(|n| n.metadata["canvasNodeType"] != "group")
        .filter_map(|n| Bounds::from_metadata(&n.metadata).map(|b| (n.path.as_str(), b)))
        .collect();

    for (i, (a_path, a)) in boxes.iter().enumerate() {
        for (b_path, b) in &boxes[i + 1..] {
            let gap = a.gap(b);
            if gap <= ADJACENCY_GAP {
                links.push(
                    LinkDraft::new(*a_path, *b_path, LinkType::CanvasAdjacent)
                        .with_metadata(json!({ "canvas": file_path, "gap": gap })),
                );
            }
        }
    }

    unresolved
}

/// Axis-aligned box of a canvas element.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Bounds {
    fn from_metadata(metadata: &Value) -> Option<Self> {
        let position = metadata.get("position")?;
        Some(Self {
            x: position.get("x")?.as_f64()?,
            y: position.get("y")?.as_f64()?,
            width: metadata.get("width").and_then(Value::as_f64).unwrap_or(0.0),
            height: metadata.get("height").and_then(Value::as_f64).unwrap_or(0.0),
        })
    }

    /// Largest of the horizontal and vertical gaps; zero when overlapping.
    fn gap(&self, other: &Bounds) -> f64 {
        let dx = (other.x - (self.x + self.width)).max(self.x - (other.x + other.width));
        let dy = (other.y - (self.y + self.height)).max(self.y - (other.y + other.height));
        dx.max(dy).max(0.0)
    }
}
