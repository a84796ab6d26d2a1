//! Assistant instruction fragments and their selection.
//!
//! The seed dataset is written to the `subprompts` table when a database is
//! opened. A question picks the entry whose bag-of-words vector is closest by
//! cosine similarity, falling back to the default entry.

use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;

/// Minimum similarity for a subprompt to beat the default entry.
pub const MATCH_THRESHOLD: f64 = 0.1;

/// A built-in subprompt.
#[derive(Debug, Clone, Copy)]
pub struct SubpromptSeed {
    pub name: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
    pub content: &'static str,
    pub is_default: bool,
}

pub const SEED_SUBPROMPTS: &[SubpromptSeed] = &[
    SubpromptSeed {
        name: "general",
        description: "General questions about the community knowledge base",
        keywords: &["help", "question", "about", "explain", "what"],
        content: "Answer using the community knowledge base below. Say so when the notes do not cover the question.",
        is_default: true,
    },
    SubpromptSeed {
        name: "obsidian-import",
        description: "Importing Obsidian vaults, canvases and markdown notes",
        keywords: &["import", "obsidian", "canvas", "vault", "markdown", "upload", "notes", "file"],
        content: "Explain how imported notes, canvases and their links are represented, citing note titles.",
        is_default: false,
    },
    SubpromptSeed {
        name: "idea-discovery",
        description: "Finding related ideas and proposals",
        keywords: &["idea", "ideas", "proposal", "similar", "related", "find", "search", "connect"],
        content: "List the most relevant ideas by title and explain how they connect to each other.",
        is_default: false,
    },
    SubpromptSeed {
        name: "governance",
        description: "Governance, voting and decision making",
        keywords: &["governance", "vote", "voting", "council", "policy", "decision", "dao"],
        content: "Focus on governance notes: who decides, how proposals are voted and which policies apply.",
        is_default: false,
    },
    SubpromptSeed {
        name: "finance",
        description: "Budgets, funding and treasury questions",
        keywords: &["budget", "funding", "treasury", "finance", "cost", "money", "grant"],
        content: "Focus on financial notes: budgets, funding sources and costs. Quote figures only when present.",
        is_default: false,
    },
    SubpromptSeed {
        name: "community",
        description: "Community life, events and residents",
        keywords: &["community", "event", "events", "residents", "neighbors", "gathering", "volunteer"],
        content: "Focus on community life: events, residents and volunteer initiatives mentioned in the notes.",
        is_default: false,
    },
];

/// A subprompt row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subprompt {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub content: String,
    pub is_default: bool,
}

impl Subprompt {
    /// Text the similarity vector is built from.
    fn profile(&self) -> String {
        format!(
            "{} {} {}",
            self.name.replace('-', " "),
            self.description,
            self.keywords.join(" ")
        )
    }
}

/// Inserts the seed dataset, leaving existing rows with the same name alone.
pub fn seed(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO subprompts (name, description, keywords, content, is_default)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    for entry in SEED_SUBPROMPTS {
        stmt.execute(rusqlite::params![
            entry.name,
            entry.description,
            serde_json::to_string(entry.keywords)?,
            entry.content,
            entry.is_default,
        ])
        .with_context(|| format!("Failed to seed subprompt {}", entry.name))?;
    }

    Ok(())
}

/// Lists every stored subprompt ordered by id.
pub fn list(conn: &Connection) -> Result<Vec<Subprompt>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, keywords, content, is_default FROM subprompts ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, bool>(5)?,
        ))
    })?;

    let mut subprompts = Vec::new();
    for row in rows {
        let (id, name, description, keywords, content, is_default) = row?;
        subprompts.push(Subprompt {
            id,
            name,
            description,
            keywords: serde_json::from_str(&keywords)
                .with_context(|| format!("Invalid keywords for subprompt {id}"))?,
            content,
            is_default,
        });
    }

    Ok(subprompts)
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "how", "does", "can", "are", "our", "you", "that", "this", "from",
    "into", "about", "what", "which", "who", "why", "when", "is", "do", "to", "of", "in", "on", "a",
    "an", "my", "me", "we", "it", "be",
];

/// Term frequencies of the lower-cased words in `text`, without stop words.
pub fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 2 && !STOP_WORDS.contains(&w.as_str()))
    {
        *counts.entry(word).or_insert(0.0) += 1.0;
    }
    counts
}

/// Cosine similarity of two sparse term vectors, 0.0 when either is empty.
pub fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    let norm_a = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.values().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Picks the subprompt closest to the question.
///
/// Returns the default entry when nothing reaches [`MATCH_THRESHOLD`], and
/// `None` only when the list has neither a match nor a default.
pub fn select<'a>(subprompts: &'a [Subprompt], question: &str) -> Option<&'a Subprompt> {
    let query = term_frequencies(question);

    let best = subprompts
        .iter()
        .filter(|s| !s.is_default)
        .map(|s| (s, cosine_similarity(&query, &term_frequencies(&s.profile()))))
        .filter(|(_, score)| *score >= MATCH_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1));

    match best {
        Some((subprompt, score)) => {
            tracing::debug!(name = %subprompt.name, score, "selected subprompt");
            Some(subprompt)
        }
        None => subprompts.iter().find(|s| s.is_default),
    }
}

/// Loads the stored subprompts and picks one for the question.
pub fn select_for_question(conn: &Connection, question: &str) -> Result<Option<Subprompt>> {
    let subprompts = list(conn)?;
    Ok(select(&subprompts, question).cloned())
}
