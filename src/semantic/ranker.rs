//! Top-K similarity ranking of a query against a text corpus.

use crate::semantic::embeddings::{Embedder, EmbeddingError};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;

/// Corpora at least this large are scored in parallel.
const PARALLEL_SCORING_MIN: usize = 1024;

/// A corpus position and its cosine similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedResult {
    /// Index into the corpus as passed to [`SimilarityRanker::rank`]
    pub index: usize,
    /// Cosine similarity in [-1.0, 1.0]
    pub score: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum RankError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embedder returned {got} vectors of dimension {dims:?}, expected {expected}")]
    ShapeMismatch {
        expected: usize,
        got: usize,
        dims: Option<usize>,
    },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

#[cfg(test)]
impl RankError {
    pub fn is_model_unavailable(&self) -> bool {
        matches!(
            self,
            RankError::Embedding(
                EmbeddingError::Unavailable(_)
                    | EmbeddingError::InitFailed(_)
                    | EmbeddingError::DownloadTimeout(_)
                    | EmbeddingError::InvalidModel(_)
            )
        )
    }
}

/// Ranks corpus texts by similarity to a query.
///
/// Holds no state besides the embedder, so one instance can serve every
/// request.
#[derive(Clone)]
pub struct SimilarityRanker {
    embedder: Arc<dyn Embedder>,
}

impl SimilarityRanker {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Return the `top_k` corpus entries closest to `query`, best first.
    ///
    /// Equal scores are ordered by ascending corpus index. A blank query is
    /// rejected before the model is touched; an empty corpus is a valid
    /// empty result.
    pub fn rank(
        &self,
        query: &str,
        corpus: &[String],
        top_k: usize,
    ) -> Result<Vec<RankedResult>, RankError> {
        if query.trim().is_empty() {
            return Err(RankError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }

        if corpus.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or(RankError::ShapeMismatch {
                expected: 1,
                got: 0,
                dims: None,
            })?;

        let corpus_vecs = self.embedder.embed(corpus)?;
        check_shape(&query_vec, &corpus_vecs, corpus.len())?;

        let scores = score_all(&query_vec, &corpus_vecs);
        let results = top_k_by_score(&scores, top_k);

        log::debug!(
            "ranked {} candidates, returning {} (best {:?})",
            corpus.len(),
            results.len(),
            results.first().map(|r| r.score)
        );

        Ok(results)
    }
}

fn check_shape(query: &[f32], corpus: &[Vec<f32>], expected: usize) -> Result<(), RankError> {
    let dims = query.len();
    if corpus.len() != expected {
        return Err(RankError::ShapeMismatch {
            expected,
            got: corpus.len(),
            dims: Some(dims),
        });
    }
    if let Some(bad) = corpus.iter().find(|v| v.len() != dims) {
        return Err(RankError::ShapeMismatch {
            expected: dims,
            got: bad.len(),
            dims: Some(bad.len()),
        });
    }
    Ok(())
}

/// Dot product; equals cosine similarity for unit vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn score_all(query: &[f32], corpus: &[Vec<f32>]) -> Vec<f32> {
    if corpus.len() >= PARALLEL_SCORING_MIN {
        corpus.par_iter().map(|v| dot(query, v)).collect()
    } else {
        corpus.iter().map(|v| dot(query, v)).collect()
    }
}

/// Pick the `k` best scores, descending, ties by ascending index.
pub fn top_k_by_score(scores: &[f32], k: usize) -> Vec<RankedResult> {
    let mut results = scores
        .iter()
        .enumerate()
        .map(|(index, &score)| RankedResult { index, score })
        .collect::<Vec<_>>();

    // NaN scores sort after every number
    let by_rank = |a: &RankedResult, b: &RankedResult| {
        a.score
            .is_nan()
            .cmp(&b.score.is_nan())
            .then(b.score.total_cmp(&a.score))
            .then(a.index.cmp(&b.index))
    };

    if k < results.len() {
        results.select_nth_unstable_by(k, by_rank);
        results.truncate(k);
    }
    results.sort_by(by_rank);

    results
}
