use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Heuristic that produced a link.
///
/// `Wiki` and `CanvasEdge` are authored by the note writer; the remaining
/// variants are inferred and are treated as exploratory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkType {
    /// `[[wiki-link]]` reference in note content.
    Wiki,
    /// Edge drawn between two canvas elements.
    CanvasEdge,
    /// Connective link from a canvas root node to one of its elements.
    Canvas,
    /// Spatial neighbours on a canvas without explicit edges.
    CanvasAdjacent,
    /// Two nodes sharing one or more tags.
    Tag,
    /// One node title contained in another.
    TitleSimilarity,
}

impl LinkType {
    /// Returns the stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wiki => "wiki",
            Self::CanvasEdge => "canvas-edge",
            Self::Canvas => "canvas",
            Self::CanvasAdjacent => "canvas-adjacent",
            Self::Tag => "tag",
            Self::TitleSimilarity => "title-similarity",
        }
    }

    /// Returns `true` for links that were explicitly authored.
    ///
    /// Only explicit links are rendered in the graph view.
    pub fn is_explicit(self) -> bool {
        matches!(self, Self::Wiki | Self::CanvasEdge)
    }

    /// Default strength used when the producing heuristic has no score of its own.
    pub fn default_strength(self) -> f64 {
        match self {
            Self::Wiki | Self::CanvasEdge => 1.0,
            Self::Canvas => 0.5,
            Self::CanvasAdjacent => 0.3,
            Self::Tag | Self::TitleSimilarity => 0.2,
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wiki" => Ok(Self::Wiki),
            "canvas-edge" => Ok(Self::CanvasEdge),
            "canvas" => Ok(Self::Canvas),
            "canvas-adjacent" => Ok(Self::CanvasAdjacent),
            "tag" => Ok(Self::Tag),
            "title-similarity" => Ok(Self::TitleSimilarity),
            other => anyhow::bail!("Unknown link type: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_type_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&LinkType::TitleSimilarity).unwrap(),
            r#""title-similarity""#
        );
        assert_eq!(
            serde_json::to_string(&LinkType::CanvasEdge).unwrap(),
            r#""canvas-edge""#
        );
    }

    #[test]
    fn display_matches_serde_form() {
        for link_type in [
            LinkType::Wiki,
            LinkType::CanvasEdge,
            LinkType::Canvas,
            LinkType::CanvasAdjacent,
            LinkType::Tag,
            LinkType::TitleSimilarity,
        ] {
            let json = serde_json::to_string(&link_type).unwrap();
            assert_eq!(json, format!("\"{link_type}\""));
            assert_eq!(link_type.as_str().parse::<LinkType>().unwrap(), link_type);
        }
    }

    #[test]
    fn only_wiki_and_canvas_edges_are_explicit() {
        assert!(LinkType::Wiki.is_explicit());
        assert!(LinkType::CanvasEdge.is_explicit());
        assert!(!LinkType::Canvas.is_explicit());
        assert!(!LinkType::CanvasAdjacent.is_explicit());
        assert!(!LinkType::Tag.is_explicit());
        assert!(!LinkType::TitleSimilarity.is_explicit());
    }
}
