//! Semantic similarity for book text.
//!
//! - `embeddings`: fastembed wrapper and the `Embedder` seam
//! - `ranker`: dot-product scoring and top-K selection

pub mod embeddings;
mod ranker;

pub use embeddings::{Embedder, EmbeddingError, EmbeddingModel};
pub use ranker::{dot, top_k_by_score, RankError, RankedResult, SimilarityRanker};
