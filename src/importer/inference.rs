//! Keyword heuristics for categories and IMT domains.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Category vocabulary recognised when grouping nodes.
///
/// Includes the inferred categories plus the canvas fallback tags.
pub const KNOWN_CATEGORIES: &[&str] = &[
    "project",
    "idea",
    "note",
    "concept",
    "person",
    "sphere",
    "finance",
    "resource",
    "reference",
];

/// Content category inferred from free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Project,
    Idea,
    Note,
    Concept,
    Person,
    Sphere,
    Finance,
}

impl Category {
    /// Returns the tag form of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Idea => "idea",
            Self::Note => "note",
            Self::Concept => "concept",
            Self::Person => "person",
            Self::Sphere => "sphere",
            Self::Finance => "finance",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Checked in this order; the first match is the primary category.
static CATEGORY_PATTERNS: LazyLock<Vec<(Category, Regex)>> = LazyLock::new(|| {
    vec![
        (
            Category::Project,
            Regex::new(r"\b(projects?|projetos?|roadmap|milestones?|initiatives?)\b")
                .expect("static regex: project"),
        ),
        (
            Category::Idea,
            Regex::new(r"\b(ideas?|ideias?|proposals?|propostas?|brainstorm\w*)\b")
                .expect("static regex: idea"),
        ),
        (
            Category::Note,
            Regex::new(r"\b(notes?|notas?|memo|journal)\b").expect("static regex: note"),
        ),
        (
            Category::Concept,
            Regex::new(r"\b(concepts?|conceitos?|theory|theories|definitions?|principles?|frameworks?)\b")
                .expect("static regex: concept"),
        ),
        (
            Category::Person,
            Regex::new(r"(^|\s)@\w+|\b(person|pessoa|people|members?|founders?|authors?)\b")
                .expect("static regex: person"),
        ),
        (
            Category::Sphere,
            Regex::new(r"\b(spheres?|esferas?|domains?)\b").expect("static regex: sphere"),
        ),
        (
            Category::Finance,
            Regex::new(r"\b(financ\w*|budgets?|orçamentos?|funding|treasury|tokens?|investments?)\b")
                .expect("static regex: finance"),
        ),
    ]
});

/// Infers zero or more categories from free text.
///
/// Every check runs independently against the lower-cased text, so a text
/// can carry several categories. Results keep the check order.
///
/// # Examples
///
/// ```
/// use mindtree::importer::inference::{infer_categories_from_text, Category};
///
/// let categories = infer_categories_from_text("Project proposal for the community budget");
/// assert_eq!(
///     categories,
///     vec![Category::Project, Category::Idea, Category::Finance]
/// );
/// ```
pub fn infer_categories_from_text(text: &str) -> Vec<Category> {
    let lower = text.to_lowercase();
    CATEGORY_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(&lower))
        .map(|(category, _)| *category)
        .collect()
}

struct DomainRule {
    name: &'static str,
    keywords: &'static [&'static str],
}

const DOMAIN_RULES: &[DomainRule] = &[
    DomainRule {
        name: "governance",
        keywords: &["governance", "governança", "voting", "dao", "council", "policy", "policies"],
    },
    DomainRule {
        name: "health",
        keywords: &["health", "saúde", "wellness", "medical", "medicine", "fitness"],
    },
    DomainRule {
        name: "education",
        keywords: &["education", "educação", "learning", "school", "course", "teaching"],
    },
    DomainRule {
        name: "finance",
        keywords: &["finance", "financial", "budget", "funding", "treasury", "investment"],
    },
    DomainRule {
        name: "technology",
        keywords: &["technology", "tecnologia", "software", "blockchain", "protocol", "platform"],
    },
    DomainRule {
        name: "community",
        keywords: &["community", "comunidade", "residents", "neighbors", "gathering"],
    },
    DomainRule {
        name: "resources",
        keywords: &["resource", "recurso", "toolkit", "material", "library"],
    },
    DomainRule {
        name: "projects",
        keywords: &["project", "projeto", "initiative", "roadmap"],
    },
    DomainRule {
        name: "ethics",
        keywords: &["ethics", "ética", "ethical", "values", "moral"],
    },
    DomainRule {
        name: "ipe-city",
        keywords: &["ipê city", "ipe city", "ipê village", "ipe village"],
    },
    DomainRule {
        name: "mind-tree",
        keywords: &["mind tree", "mindtree", "ipê mind"],
    },
    DomainRule {
        name: "network-state",
        keywords: &["network state", "pop-up city", "popup city"],
    },
];

/// Infers the high-level domains a text belongs to by substring matching.
///
/// # Examples
///
/// ```
/// use mindtree::importer::inference::infer_domains;
///
/// let domains = infer_domains("Community health workshop at Ipê City");
/// assert_eq!(domains, vec!["health", "community", "ipe-city"]);
/// ```
pub fn infer_domains(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    DOMAIN_RULES
        .iter()
        .filter(|rule| rule.keywords.iter().any(|kw| lower.contains(kw)))
        .map(|rule| rule.name)
        .collect()
}

/// Returns the first tag that belongs to the known category vocabulary.
pub fn category_from_tags(tags: &[String]) -> Option<&str> {
    tags.iter()
        .map(String::as_str)
        .find(|tag| KNOWN_CATEGORIES.contains(&tag.to_lowercase().as_str()))
}
