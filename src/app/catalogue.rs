use super::errors::AppError;
use crate::{
    books::{Book, BookCreate, BookManager, BookQuery, BookUpdate},
    config::Config,
    lifecycle::{LoadError, Loadable, ModelCell, ModelState},
    seed::{self, SeedReport},
    semantic::{Embedder, SimilarityRanker},
    summarize::{SummarizationModel, Summarizer},
};
use serde::Serialize;
use std::{path::Path, sync::Arc, thread::JoinHandle};

/// Request defaults applied when a caller leaves a knob unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogueDefaults {
    pub top_k: usize,
    pub max_length: usize,
    pub min_length: usize,
}

impl From<&Config> for CatalogueDefaults {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.semantic.default_top_k,
            max_length: config.summarizer.default_max_length,
            min_length: config.summarizer.default_min_length,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredBook {
    #[serde(flatten)]
    pub book: Book,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookSummary {
    pub book_id: u64,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub state: ModelState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub embedder: ModelInfo,
    pub summarizer: ModelInfo,
}

/// The book catalogue and its AI features.
///
/// Models are injected as [`ModelCell`]s, so the catalogue decides when they
/// load (see [`Catalogue::preload`]) but never how.
pub struct Catalogue {
    books: Arc<dyn BookManager>,
    ranker: SimilarityRanker,
    summarizer: SummarizationModel,
    embedder_cell: Arc<dyn Loadable>,
    summarizer_cell: Arc<dyn Loadable>,
    defaults: CatalogueDefaults,
}

impl Catalogue {
    pub fn new<E, S>(
        books: Arc<dyn BookManager>,
        embedder: Arc<ModelCell<E>>,
        summarizer: Arc<ModelCell<S>>,
        max_input_chars: usize,
        defaults: CatalogueDefaults,
    ) -> Self
    where
        E: Embedder + 'static,
        S: Summarizer + 'static,
    {
        Self {
            books,
            ranker: SimilarityRanker::new(embedder.clone()),
            summarizer: SummarizationModel::new(summarizer.clone(), max_input_chars),
            embedder_cell: embedder,
            summarizer_cell: summarizer,
            defaults,
        }
    }

    /// Startup phase: load the embedder now and the summarizer in the
    /// background. Join the returned handle to wait for the summarizer.
    pub fn preload(&self) -> Result<JoinHandle<Result<(), LoadError>>, LoadError> {
        self.embedder_cell.load()?;
        Ok(self.summarizer_cell.spawn_load())
    }

    pub fn model_status(&self) -> ModelStatus {
        let info = |cell: &Arc<dyn Loadable>| ModelInfo {
            name: cell.name().to_string(),
            state: cell.state(),
        };
        ModelStatus {
            embedder: info(&self.embedder_cell),
            summarizer: info(&self.summarizer_cell),
        }
    }

    /// All books, newest first, optionally filtered by a case-insensitive
    /// substring of title, author, genre or description.
    pub fn list(&self, filter: Option<&str>) -> Result<Vec<Book>, AppError> {
        let keyword = filter
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        let mut books = self.books.search(BookQuery {
            keyword,
            ..Default::default()
        })?;
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(books.into_iter().map(Book::without_content).collect())
    }

    pub fn get(&self, id: u64) -> Result<Book, AppError> {
        self.books
            .search(BookQuery {
                id: Some(id),
                ..Default::default()
            })?
            .into_iter()
            .next()
            .ok_or(AppError::NotFound)
    }

    pub fn seed(&self, path: &Path) -> Result<SeedReport, AppError> {
        Ok(seed::seed_from_csv(self.books.as_ref(), path)?)
    }

    pub fn create(&self, book: BookCreate) -> Result<Book, AppError> {
        if book.title.trim().is_empty() || book.author.trim().is_empty() {
            return Err(AppError::Validation(
                "'title' and 'author' are required".to_string(),
            ));
        }
        let book = self.books.create(book)?;
        log::info!("added book #{} '{}'", book.id, book.title);
        Ok(book)
    }

    pub fn update(&self, id: u64, update: BookUpdate) -> Result<Book, AppError> {
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&update.title) || blank(&update.author) {
            return Err(AppError::Validation(
                "'title' and 'author' cannot be blank".to_string(),
            ));
        }
        self.books.update(id, update)?.ok_or(AppError::NotFound)
    }

    pub fn delete(&self, id: u64) -> Result<(), AppError> {
        if !self.books.delete(id)? {
            return Err(AppError::NotFound);
        }
        log::info!("deleted book #{id}");
        Ok(())
    }

    /// Summarize a book's content and store the summary as its description.
    pub fn summarize(
        &self,
        id: u64,
        max_length: Option<usize>,
        min_length: Option<usize>,
    ) -> Result<BookSummary, AppError> {
        let book = self.get(id)?;
        let source = book.content.as_deref().unwrap_or_default().trim();
        if source.is_empty() {
            return Err(AppError::NoContent("No content available to summarize"));
        }

        let summary = self
            .summarizer
            .summarize(
                source,
                max_length.unwrap_or(self.defaults.max_length),
                min_length.unwrap_or(self.defaults.min_length),
            )?
            .ok_or(AppError::SummarizationFailed)?;

        self.books
            .update(
                id,
                BookUpdate {
                    description: Some(summary.clone()),
                    ..Default::default()
                },
            )?
            .ok_or(AppError::NotFound)?;

        Ok(BookSummary {
            book_id: id,
            summary,
        })
    }

    /// Books most similar to the given one, excluding itself.
    pub fn recommendations(
        &self,
        id: u64,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredBook>, AppError> {
        let book = self.get(id)?;
        let target = book.ranking_text();
        if target.is_empty() {
            return Err(AppError::NoContent("No text available for recommendations"));
        }

        let others = self
            .books
            .search(BookQuery::default())?
            .into_iter()
            .filter(|b| b.id != id)
            .collect::<Vec<_>>();

        self.rank_books(&target, others, top_k)
    }

    /// Books whose text best matches a free-form description.
    pub fn search_by_description(
        &self,
        description: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredBook>, AppError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::Validation("'description' is required".to_string()));
        }

        let books = self.books.search(BookQuery::default())?;
        if books.is_empty() {
            return Ok(vec![]);
        }

        self.rank_books(description, books, top_k)
    }

    fn rank_books(
        &self,
        query: &str,
        candidates: Vec<Book>,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredBook>, AppError> {
        let _span = tracing::debug_span!("rank_books", candidates = candidates.len()).entered();

        let corpus = candidates.iter().map(Book::ranking_text).collect::<Vec<_>>();
        let ranking = self
            .ranker
            .rank(query, &corpus, top_k.unwrap_or(self.defaults.top_k))?;

        // map corpus positions back to books
        Ok(ranking
            .into_iter()
            .map(|r| ScoredBook {
                book: candidates[r.index].clone().without_content(),
                score: r.score,
            })
            .collect())
    }
}

#[cfg(test)]
impl Catalogue {
    pub fn total(&self) -> Result<usize, AppError> {
        Ok(self.books.total()?)
    }
}
