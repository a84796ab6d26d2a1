//! Title, tag and wiki-link extraction for markdown notes.
//!
//! Every scanner collects its matches up front with `captures_iter`, so no
//! regex cursor is shared between calls.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+(.+?)\s*$").expect("static regex: heading"));

static INLINE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s(,;])#([\p{L}\p{N}_][\p{L}\p{N}_/\-]*)").expect("static regex: inline tag")
});

static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]]+?)\]\]").expect("static regex: wiki link"));

/// A `[[target]]` or `[[target|label]]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    /// Link target with any `#heading` or `^block` suffix removed.
    pub target: String,
    /// Display text after the `|`, if any.
    pub label: Option<String>,
}

/// Returns the first `# heading` line, else the file name without extension.
pub fn extract_title(content: &str, file_path: &str) -> String {
    let (_, body) = split_front_matter(content);
    if let Some(heading) = HEADING.captures(body).and_then(|c| c.get(1)) {
        return heading.as_str().to_string();
    }
    file_stem(file_path)
}

/// Returns the file name of a path without its extension.
pub fn file_stem(file_path: &str) -> String {
    let without_fragment = file_path.split('#').next().unwrap_or(file_path);
    Path::new(without_fragment)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| without_fragment.to_string())
}

/// Splits a leading `---` delimited front matter block from the body.
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    for (offset, line) in line_offsets(rest) {
        if line.trim_end() == "---" {
            let front = &rest[..offset];
            let body_start = (offset + line.len()).min(rest.len());
            let body = rest[body_start..].trim_start_matches(['\r', '\n']);
            return (Some(front), body);
        }
    }

    (None, content)
}

fn line_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_inclusive('\n').scan(0usize, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line.trim_end_matches(['\r', '\n'])))
    })
}

/// Reads the `tags` entry from a YAML front matter block.
///
/// Accepts a sequence (`tags: [a, b]`) or a comma/space separated string.
/// Malformed YAML yields no tags.
pub fn front_matter_tags(front_matter: &str) -> Vec<String> {
    let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(front_matter) else {
        tracing::debug!("ignoring malformed front matter");
        return Vec::new();
    };

    match value.get("tags") {
        Some(serde_yaml::Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| match item {
                serde_yaml::Value::String(s) => Some(s.clone()),
                serde_yaml::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .map(|tag| tag.trim_start_matches('#').trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
        Some(serde_yaml::Value::String(s)) => s
            .split([',', ' '])
            .map(|tag| tag.trim_start_matches('#').trim())
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Extracts inline `#tag` tokens, skipping headings and purely numeric tags.
pub fn extract_inline_tags(body: &str) -> Vec<String> {
    INLINE_TAG
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(['/', '-']).to_string())
        .filter(|tag| !tag.is_empty() && !tag.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

/// Extracts front matter tags followed by inline tags, without duplicates.
///
/// # Examples
///
/// ```
/// use mindtree::importer::markdown::extract_tags;
///
/// let content = "---\ntags: [governance, idea]\n---\n# Title\nA #project about #idea";
/// assert_eq!(extract_tags(content), vec!["governance", "idea", "project"]);
/// ```
pub fn extract_tags(content: &str) -> Vec<String> {
    let (front_matter, body) = split_front_matter(content);
    let mut tags = front_matter.map(front_matter_tags).unwrap_or_default();

    for tag in extract_inline_tags(body) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    tags
}

/// Extracts wiki-links from content.
///
/// Same-note references such as `[[#heading]]` have an empty target and
/// are dropped.
pub fn extract_wiki_links(content: &str) -> Vec<WikiLink> {
    WIKI_LINK
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .filter_map(|inner| {
            let mut parts = inner.as_str().splitn(2, '|');
            let raw_target = parts.next().unwrap_or_default();
            let label = parts
                .next()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from);

            let target = raw_target
                .split(['#', '^'])
                .next()
                .unwrap_or_default()
                .trim();

            if target.is_empty() {
                None
            } else {
                Some(WikiLink {
                    target: target.to_string(),
                    label,
                })
            }
        })
        .collect()
}

/// Appends `.md` unless the target already ends in an importable extension.
///
/// Dots inside note names do not count as extensions.
///
/// # Examples
///
/// ```
/// use mindtree::importer::markdown::normalize_link_target;
///
/// assert_eq!(normalize_link_target("Other Note"), "Other Note.md");
/// assert_eq!(normalize_link_target("board.canvas"), "board.canvas");
/// assert_eq!(normalize_link_target("Dr. Smith"), "Dr. Smith.md");
/// ```
pub fn normalize_link_target(target: &str) -> String {
    let known = Path::new(target)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| LINKABLE_EXTENSIONS.iter().any(|k| ext.eq_ignore_ascii_case(k)));
    if known {
        target.to_string()
    } else {
        format!("{target}.md")
    }
}

const LINKABLE_EXTENSIONS: [&str; 3] = ["md", "canvas", "txt"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_from_first_heading() {
        assert_eq!(extract_title("intro\n# Alpha\n## Sub", "x/A.md"), "Alpha");
    }

    #[test]
    fn title_falls_back_to_file_stem() {
        assert_eq!(extract_title("no heading here", "notes/My Note.md"), "My Note");
    }

    #[test]
    fn title_ignores_second_level_headings() {
        assert_eq!(extract_title("## Sub only", "Sub.md"), "Sub");
    }

    #[test]
    fn title_skips_front_matter() {
        let content = "---\ntitle: ignored\n---\n# Real Title";
        assert_eq!(extract_title(content, "a.md"), "Real Title");
    }

    #[test]
    fn split_front_matter_returns_block_and_body() {
        let (front, body) = split_front_matter("---\ntags: [a]\n---\nbody text");
        assert_eq!(front, Some("tags: [a]\n"));
        assert_eq!(body, "body text");
    }

    #[test]
    fn split_front_matter_without_closing_delimiter_is_body() {
        let content = "---\ntags: [a]\nno close";
        let (front, body) = split_front_matter(content);
        assert_eq!(front, None);
        assert_eq!(body, content);
    }

    #[test]
    fn front_matter_tags_accepts_string_form() {
        assert_eq!(
            front_matter_tags("tags: health, education"),
            vec!["health", "education"]
        );
    }

    #[test]
    fn front_matter_tags_ignores_malformed_yaml() {
        assert!(front_matter_tags("tags: [unclosed").is_empty());
    }

    #[test]
    fn inline_tags_skip_headings_and_numbers() {
        let body = "# Heading\n#project and #123 plus (#idea) #nested/tag";
        assert_eq!(
            extract_inline_tags(body),
            vec!["project", "idea", "nested/tag"]
        );
    }

    #[test]
    fn inline_tags_ignore_anchor_fragments() {
        // The `#` inside a wiki link is not preceded by whitespace
        assert!(extract_inline_tags("see [[Note#Section]]").is_empty());
    }

    #[test]
    fn extract_tags_deduplicates_within_file() {
        assert_eq!(extract_tags("#project #project #idea"), vec!["project", "idea"]);
    }

    #[test]
    fn wiki_links_strip_labels_and_headings() {
        let links = extract_wiki_links("See [[B]], [[Other Note|the other]] and [[C#Part]].");

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].target, "B");
        assert_eq!(links[1].target, "Other Note");
        assert_eq!(links[1].label.as_deref(), Some("the other"));
        assert_eq!(links[2].target, "C");
    }

    #[test]
    fn wiki_links_drop_same_note_references() {
        assert!(extract_wiki_links("[[#^abc|card]] [[#Heading]]").is_empty());
    }

    #[test]
    fn repeated_scans_return_same_matches() {
        let content = "[[A]] [[B]]";
        assert_eq!(extract_wiki_links(content), extract_wiki_links(content));
    }

    #[test]
    fn file_stem_strips_fragment() {
        assert_eq!(file_stem("boards/Plan.canvas#n1"), "Plan");
    }
}
