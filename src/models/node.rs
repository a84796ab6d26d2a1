use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::{NodeId, SourceType};

/// One imported document or canvas element, the graph's vertex type.
///
/// `path` is the natural key: re-importing the same path updates the stored
/// row instead of inserting a new one. Canvas elements use
/// `<canvas path>#<element id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsidianNode {
    id: NodeId,
    title: String,
    content: String,
    path: String,
    tags: Vec<String>,
    source_type: SourceType,
    is_imported: bool,
    metadata: Value,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl ObsidianNode {
    /// Returns the node's unique identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the node title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the raw content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the unique path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the tags in stored order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the source format.
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    /// Returns whether the node came from an import rather than manual entry.
    pub fn is_imported(&self) -> bool {
        self.is_imported
    }

    /// Returns the open metadata bag.
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Returns the inferred category stored in metadata, if any.
    pub fn category(&self) -> Option<&str> {
        self.metadata.get("category").and_then(Value::as_str)
    }

    /// Returns the inferred domains stored in metadata, if any.
    pub fn stored_domains(&self) -> Option<Vec<String>> {
        self.metadata
            .get("domains")
            .and_then(Value::as_array)
            .map(|domains| {
                domains
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
    }

    /// Returns when this node was first inserted.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Returns when this node was last updated.
    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    /// Returns the file name part of the path, without any `#element` suffix.
    pub fn file_name(&self) -> &str {
        let base = self.path.split('#').next().unwrap_or(&self.path);
        base.rsplit('/').next().unwrap_or(base)
    }
}

/// Builder for constructing `ObsidianNode` instances.
///
/// # Examples
///
/// ```
/// use mindtree::{NodeBuilder, NodeId};
///
/// let node = NodeBuilder::new()
///     .id(NodeId::new(1))
///     .title("Alpha")
///     .path("notes/Alpha.md")
///     .build();
///
/// assert_eq!(node.title(), "Alpha");
/// assert_eq!(node.file_name(), "Alpha.md");
/// assert!(node.tags().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct NodeBuilder {
    id: Option<NodeId>,
    title: Option<String>,
    content: Option<String>,
    path: Option<String>,
    tags: Option<Vec<String>>,
    source_type: Option<SourceType>,
    is_imported: Option<bool>,
    metadata: Option<Value>,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
}

impl NodeBuilder {
    /// Creates a new `NodeBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the node ID.
    pub fn id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the unique path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the tags.
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Sets the source type.
    pub fn source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = Some(source_type);
        self
    }

    /// Sets the imported flag.
    pub fn is_imported(mut self, is_imported: bool) -> Self {
        self.is_imported = Some(is_imported);
        self
    }

    /// Sets the metadata bag.
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the created timestamp.
    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the updated timestamp.
    pub fn updated_at(mut self, updated_at: OffsetDateTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Builds the `ObsidianNode`, using defaults for optional fields.
    ///
    /// # Panics
    ///
    /// Panics if `id` or `path` have not been set.
    pub fn build(self) -> ObsidianNode {
        let now = OffsetDateTime::now_utc();
        ObsidianNode {
            id: self.id.expect("id is required"),
            path: self.path.expect("path is required"),
            title: self.title.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            source_type: self.source_type.unwrap_or(SourceType::Obsidian),
            is_imported: self.is_imported.unwrap_or(true),
            metadata: self
                .metadata
                .unwrap_or_else(|| Value::Object(Default::default())),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        }
    }
}

/// A node produced by the importer, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDraft {
    pub title: String,
    pub content: String,
    pub path: String,
    pub tags: Vec<String>,
    pub source_type: SourceType,
    pub metadata: Value,
}

impl NodeDraft {
    /// Creates a draft with empty tags and metadata.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        path: impl Into<String>,
        source_type: SourceType,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            path: path.into(),
            tags: Vec::new(),
            source_type,
            metadata: Value::Object(Default::default()),
        }
    }

    /// Sets the tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the metadata bag.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_defaults_to_imported_obsidian_node() {
        let node = NodeBuilder::new()
            .id(NodeId::new(3))
            .path("Beta.md")
            .build();

        assert_eq!(node.source_type(), SourceType::Obsidian);
        assert!(node.is_imported());
        assert!(node.metadata().is_object());
        assert_eq!(node.category(), None);
    }

    #[test]
    fn file_name_strips_directories_and_element_suffix() {
        let node = NodeBuilder::new()
            .id(NodeId::new(1))
            .path("boards/Plan.canvas#abc123")
            .build();

        assert_eq!(node.file_name(), "Plan.canvas");
    }

    #[test]
    fn metadata_accessors_read_category_and_domains() {
        let node = NodeBuilder::new()
            .id(NodeId::new(1))
            .path("x.md")
            .metadata(json!({"category": "idea", "domains": ["health", "community"]}))
            .build();

        assert_eq!(node.category(), Some("idea"));
        assert_eq!(
            node.stored_domains(),
            Some(vec!["health".to_string(), "community".to_string()])
        );
    }

    #[test]
    fn node_serializes_with_camel_case_fields() {
        let node = NodeBuilder::new()
            .id(NodeId::new(1))
            .path("x.md")
            .source_type(SourceType::Canvas)
            .build();

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["sourceType"], "canvas");
        assert_eq!(json["isImported"], true);
    }
}
