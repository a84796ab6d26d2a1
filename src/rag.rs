//! Retrieval-augmented answers over the imported graph.
//!
//! [`Assistant::ask`] combines a subprompt, the cached graph digest and the
//! nodes most relevant to the question into one prompt for the language model.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::llm::LanguageModel;
use crate::subprompts::{self, Subprompt};
use crate::{ObsidianNode, ObsidianService};

/// Nodes quoted in full after the digest.
pub const RELEVANT_NODE_LIMIT: usize = 5;

/// Characters quoted per relevant node.
pub const RELEVANT_NODE_CHARS: usize = 800;

/// Caches the context digest for a fixed time.
///
/// The digest is rebuilt on the first call after `ttl` has elapsed or after
/// [`ContextCache::invalidate`].
#[derive(Debug)]
pub struct ContextCache {
    ttl: Duration,
    entry: RefCell<Option<(Instant, String)>>,
}

impl ContextCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RefCell::new(None),
        }
    }

    /// Returns the cached digest, rebuilding it with `build` when stale.
    pub fn get_or_refresh<F>(&self, build: F) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        if let Some((built_at, context)) = self.entry.borrow().as_ref()
            && built_at.elapsed() < self.ttl
        {
            return Ok(context.clone());
        }

        let context = build()?;
        tracing::debug!(chars = context.len(), "refreshed context digest");
        *self.entry.borrow_mut() = Some((Instant::now(), context.clone()));
        Ok(context)
    }

    /// Drops the cached digest, e.g. after an import.
    pub fn invalidate(&self) {
        self.entry.borrow_mut().take();
    }

    pub fn is_cached(&self) -> bool {
        self.entry
            .borrow()
            .as_ref()
            .is_some_and(|(built_at, _)| built_at.elapsed() < self.ttl)
    }
}

/// An answer with the material used to produce it.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub subprompt: Option<String>,
    pub sources: Vec<String>,
}

/// Answers questions about the graph through a language model.
pub struct Assistant<'a, M: LanguageModel> {
    service: &'a ObsidianService,
    model: M,
    cache: ContextCache,
}

impl<'a, M: LanguageModel> Assistant<'a, M> {
    pub fn new(service: &'a ObsidianService, model: M, context_ttl: Duration) -> Self {
        Self {
            service,
            model,
            cache: ContextCache::new(context_ttl),
        }
    }

    pub fn cache(&self) -> &ContextCache {
        &self.cache
    }

    /// Answers `question` using the stored notes.
    pub fn ask(&self, question: &str) -> Result<Answer> {
        let conn = self.service.store().database().connection();
        let subprompt = subprompts::select_for_question(conn, question)?;

        let digest = self
            .cache
            .get_or_refresh(|| self.service.get_obsidian_context())?;

        let mut terms: Vec<String> = subprompts::term_frequencies(question).into_keys().collect();
        terms.sort();
        let keywords: Vec<&str> = terms.iter().map(String::as_str).collect();
        let relevant = self
            .service
            .find_relevant_nodes(&keywords, RELEVANT_NODE_LIMIT)?;

        let prompt = compose_prompt(question, subprompt.as_ref(), &digest, &relevant);
        tracing::info!(
            subprompt = subprompt.as_ref().map(|s| s.name.as_str()),
            relevant = relevant.len(),
            "asking language model"
        );

        let text = self
            .model
            .generate(&prompt)
            .context("Failed to get an answer from the language model")?;

        Ok(Answer {
            text: text.trim().to_string(),
            subprompt: subprompt.map(|s| s.name),
            sources: relevant.iter().map(|n| n.title().to_string()).collect(),
        })
    }
}

/// Builds the prompt sent to the model.
pub fn compose_prompt(
    question: &str,
    subprompt: Option<&Subprompt>,
    digest: &str,
    relevant: &[ObsidianNode],
) -> String {
    let mut prompt = String::from(
        "You are the Ipê Mind Tree assistant. Answer from the community notes below.\n",
    );

    if let Some(subprompt) = subprompt {
        prompt.push_str(&subprompt.content);
        prompt.push('\n');
    }

    prompt.push_str("\n# Knowledge base overview\n");
    prompt.push_str(digest.trim_end());
    prompt.push('\n');

    if !relevant.is_empty() {
        prompt.push_str("\n# Most relevant notes\n");
        for node in relevant {
            let content: String = node.content().chars().take(RELEVANT_NODE_CHARS).collect();
            prompt.push_str(&format!("\n## {} ({})\n{}\n", node.title(), node.path(), content.trim()));
        }
    }

    prompt.push_str(&format!("\n# Question\n{}\n", question.trim()));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::{Database, SourceFile};
    use std::sync::Mutex;

    /// Returns a canned answer and records every prompt.
    struct EchoModel {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl EchoModel {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    impl LanguageModel for &EchoModel {
        fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                Err(LlmError::Http { status: 503 })
            } else {
                Ok("  The garden is funded.  ".to_string())
            }
        }
    }

    fn service_with_notes() -> ObsidianService {
        let service = ObsidianService::new(Database::in_memory().unwrap());
        service
            .import_from_files(
                &[
                    SourceFile::new("Garden.md", "# Garden\nThe garden budget comes from the treasury. #finance"),
                    SourceFile::new("Walk.md", "# Walk\nEvening walks. #community"),
                ],
                None,
            )
            .unwrap();
        service
    }

    #[test]
    fn cache_reuses_value_within_ttl() {
        let cache = ContextCache::new(Duration::from_secs(60));
        let mut builds = 0;

        for _ in 0..3 {
            let value = cache
                .get_or_refresh(|| {
                    builds += 1;
                    Ok("digest".to_string())
                })
                .unwrap();
            assert_eq!(value, "digest");
        }

        assert_eq!(builds, 1);
        assert!(cache.is_cached());
    }

    #[test]
    fn zero_ttl_always_rebuilds() {
        let cache = ContextCache::new(Duration::ZERO);
        let mut builds = 0;

        for _ in 0..2 {
            cache
                .get_or_refresh(|| {
                    builds += 1;
                    Ok(String::new())
                })
                .unwrap();
        }

        assert_eq!(builds, 2);
        assert!(!cache.is_cached());
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let cache = ContextCache::new(Duration::from_secs(60));
        cache.get_or_refresh(|| Ok("old".to_string())).unwrap();

        cache.invalidate();
        let value = cache.get_or_refresh(|| Ok("new".to_string())).unwrap();

        assert_eq!(value, "new");
    }

    #[test]
    fn failed_build_is_not_cached() {
        let cache = ContextCache::new(Duration::from_secs(60));

        assert!(cache.get_or_refresh(|| anyhow::bail!("db down")).is_err());
        assert!(!cache.is_cached());
    }

    #[test]
    fn ask_builds_prompt_from_subprompt_digest_and_relevant_nodes() {
        let service = service_with_notes();
        let model = EchoModel::new();
        let assistant = Assistant::new(&service, &model, Duration::from_secs(60));

        let answer = assistant.ask("What is the garden budget?").unwrap();

        assert_eq!(answer.text, "The garden is funded.");
        assert_eq!(answer.subprompt.as_deref(), Some("finance"));
        assert_eq!(answer.sources, vec!["Garden"]);

        let prompts = model.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("Focus on financial notes"));
        assert!(prompt.contains("# Knowledge base overview"));
        assert!(prompt.contains("## Garden (Garden.md)"));
        assert!(prompt.ends_with("# Question\nWhat is the garden budget?\n"));
    }

    #[test]
    fn ask_reuses_cached_digest() {
        let service = service_with_notes();
        let model = EchoModel::new();
        let assistant = Assistant::new(&service, &model, Duration::from_secs(60));

        assistant.ask("garden").unwrap();
        service
            .import_from_files(&[SourceFile::new("New.md", "# Newcomer")], None)
            .unwrap();
        assistant.ask("garden").unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert!(!prompts[1].contains("Newcomer"));
        assert!(prompts[1].contains("2 notes"));
    }

    #[test]
    fn ask_propagates_model_errors() {
        let service = service_with_notes();
        let model = EchoModel {
            prompts: Mutex::new(Vec::new()),
            fail: true,
        };
        let assistant = Assistant::new(&service, &model, Duration::from_secs(60));

        let err = assistant.ask("anything").unwrap_err();
        assert!(format!("{err:#}").contains("503"));
    }

    #[test]
    fn compose_prompt_without_relevant_nodes() {
        let prompt = compose_prompt("Hi?", None, "digest text", &[]);

        assert!(prompt.contains("digest text"));
        assert!(!prompt.contains("# Most relevant notes"));
    }
}
