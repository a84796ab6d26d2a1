use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::{LinkId, LinkType, NodeId};

/// A directed, typed, weighted edge between two stored nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsidianLink {
    pub id: LinkId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub strength: f64,
    pub metadata: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ObsidianLink {
    /// Returns the node pair with the smaller id first.
    pub fn unordered_pair(&self) -> (NodeId, NodeId) {
        if self.source_id <= self.target_id {
            (self.source_id, self.target_id)
        } else {
            (self.target_id, self.source_id)
        }
    }
}

/// A link produced by the importer, addressed by node paths.
///
/// Paths are resolved to database ids once the nodes have been upserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDraft {
    pub source_path: String,
    pub target_path: String,
    pub link_type: LinkType,
    pub strength: f64,
    pub metadata: Value,
}

impl LinkDraft {
    /// Creates a draft using the link type's default strength.
    pub fn new(
        source_path: impl Into<String>,
        target_path: impl Into<String>,
        link_type: LinkType,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
            link_type,
            strength: link_type.default_strength(),
            metadata: Value::Object(Default::default()),
        }
    }

    /// Sets the metadata bag.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the strength.
    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    /// Returns `true` when `other` joins the same two paths with the same type,
    /// in either direction.
    pub fn same_pair(&self, other: &LinkDraft) -> bool {
        self.link_type == other.link_type
            && ((self.source_path == other.source_path && self.target_path == other.target_path)
                || (self.source_path == other.target_path
                    && self.target_path == other.source_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unordered_pair_is_direction_independent() {
        let now = OffsetDateTime::now_utc();
        let forward = ObsidianLink {
            id: LinkId::new(1),
            source_id: NodeId::new(5),
            target_id: NodeId::new(2),
            link_type: LinkType::Wiki,
            strength: 1.0,
            metadata: Value::Null,
            created_at: now,
        };
        let backward = ObsidianLink {
            source_id: NodeId::new(2),
            target_id: NodeId::new(5),
            ..forward.clone()
        };

        assert_eq!(forward.unordered_pair(), backward.unordered_pair());
    }

    #[test]
    fn draft_uses_default_strength_for_type() {
        let draft = LinkDraft::new("a.md", "b.md", LinkType::Canvas);
        assert_eq!(draft.strength, 0.5);
    }

    #[test]
    fn same_pair_ignores_direction_but_not_type() {
        let a = LinkDraft::new("a.md", "b.md", LinkType::Wiki);
        let b = LinkDraft::new("b.md", "a.md", LinkType::Wiki);
        let c = LinkDraft::new("a.md", "b.md", LinkType::Tag);

        assert!(a.same_pair(&b));
        assert!(!a.same_pair(&c));
    }

    #[test]
    fn link_serializes_type_field() {
        let link = ObsidianLink {
            id: LinkId::new(1),
            source_id: NodeId::new(1),
            target_id: NodeId::new(2),
            link_type: LinkType::CanvasEdge,
            strength: 1.0,
            metadata: Value::Null,
            created_at: OffsetDateTime::now_utc(),
        };

        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["type"], "canvas-edge");
        assert_eq!(json["sourceId"], 1);
    }
}
