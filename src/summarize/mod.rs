//! Abstractive summarization of book content.
//!
//! - `http`: inference-endpoint backend
//! - [`SummarizationModel`]: input policy in front of any [`Summarizer`]

mod http;

pub use http::HttpSummarizer;

use crate::lifecycle::{LoadError, ModelCell};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Unavailable(#[from] LoadError),

    #[error("summarization request failed: {0}")]
    Request(String),

    #[error("unexpected summarization response: {0}")]
    Response(String),
}

/// A backend that produces a summary for already-vetted input.
///
/// `max_length` and `min_length` are token targets the backend treats as
/// soft bounds.
pub trait Summarizer: Send + Sync {
    fn summarize(
        &self,
        text: &str,
        max_length: usize,
        min_length: usize,
    ) -> Result<String, SummarizeError>;
}

/// Lazily loads the wrapped backend on first use.
impl<S: Summarizer> Summarizer for ModelCell<S> {
    fn summarize(
        &self,
        text: &str,
        max_length: usize,
        min_length: usize,
    ) -> Result<String, SummarizeError> {
        self.get()?.summarize(text, max_length, min_length)
    }
}

/// Applies the input policy before handing text to the backend:
/// blank text is never sent, and long text is cut to a prefix.
#[derive(Clone)]
pub struct SummarizationModel {
    backend: Arc<dyn Summarizer>,
    max_input_chars: usize,
}

impl SummarizationModel {
    pub fn new(backend: Arc<dyn Summarizer>, max_input_chars: usize) -> Self {
        Self {
            backend,
            max_input_chars,
        }
    }

    /// Summarize `text`. Returns `Ok(None)` for blank input or a blank
    /// summary.
    pub fn summarize(
        &self,
        text: &str,
        max_length: usize,
        min_length: usize,
    ) -> Result<Option<String>, SummarizeError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        if max_length == 0 {
            return Err(SummarizeError::InvalidInput(
                "max_length must be greater than 0".to_string(),
            ));
        }
        if min_length > max_length {
            return Err(SummarizeError::InvalidInput(format!(
                "min_length ({min_length}) exceeds max_length ({max_length})"
            )));
        }

        let input = truncate_chars(text, self.max_input_chars);
        if input.len() < text.len() {
            log::debug!(
                "summarization input cut to {} of {} chars",
                self.max_input_chars,
                text.chars().count()
            );
        }

        let summary = self.backend.summarize(input, max_length, min_length)?;
        let summary = summary.trim();

        if summary.is_empty() {
            log::warn!("summarizer returned an empty summary");
            return Ok(None);
        }
        Ok(Some(summary.to_string()))
    }
}

/// The first `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
