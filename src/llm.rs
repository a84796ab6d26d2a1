//! Blocking client for an Ollama-compatible text generation API.
//!
//! Provides the typed error, builder, retry policy and the [`LanguageModel`]
//! trait the assistant is written against.
mod client;

pub use client::{
    DEFAULT_HOST, DEFAULT_MODEL, LanguageModel, LlmClient, LlmClientBuilder, LlmError,
    retry_with_backoff, retry_with_delays,
};
