use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Origin format of an imported node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Plain Obsidian markdown or text note.
    Obsidian,
    /// Element of a Canvas JSON board.
    Canvas,
    /// Element of a Canvas2Document markdown export.
    Canvas2Document,
}

impl SourceType {
    /// Returns the stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Obsidian => "obsidian",
            Self::Canvas => "canvas",
            Self::Canvas2Document => "canvas2document",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "obsidian" => Ok(Self::Obsidian),
            "canvas" => Ok(Self::Canvas),
            "canvas2document" => Ok(Self::Canvas2Document),
            other => anyhow::bail!("Unknown source type: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_serializes_lowercase() {
        let json = serde_json::to_string(&SourceType::Canvas2Document).unwrap();
        assert_eq!(json, r#""canvas2document""#);
    }

    #[test]
    fn source_type_parses_stored_form() {
        for source in [
            SourceType::Obsidian,
            SourceType::Canvas,
            SourceType::Canvas2Document,
        ] {
            assert_eq!(source.as_str().parse::<SourceType>().unwrap(), source);
        }
    }

    #[test]
    fn source_type_rejects_unknown_value() {
        assert!("notion".parse::<SourceType>().is_err());
    }
}
