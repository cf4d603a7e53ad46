use crate::app::{AppError, Catalogue, CatalogueDefaults};
use crate::books::{BackendCsv, Book, BookCreate, BookManager, BookQuery, BookUpdate};
use crate::lifecycle::{ModelCell, ModelState};
use crate::semantic::embeddings::normalize_l2;
use crate::semantic::{dot, Embedder, EmbeddingError, RankError, SimilarityRanker};
use crate::summarize::{SummarizeError, Summarizer};
use anyhow::anyhow;
use std::sync::{Arc, Mutex};

const VOCAB: [&str; 8] = [
    "dragon", "story", "romance", "novel", "adventure", "knight", "cook", "space",
];

/// Bag of words over a tiny vocabulary, with a trailing "s" stripped.
struct KeywordEmbedder;

impl KeywordEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; VOCAB.len()];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let stem = word.strip_suffix('s').unwrap_or(word);
            if let Some(pos) = VOCAB.iter().position(|v| *v == stem) {
                v[pos] += 1.0;
            }
        }
        normalize_l2(&mut v);
        v
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

type Calls = Arc<Mutex<Vec<(String, usize, usize)>>>;

struct CannedSummarizer {
    reply: String,
    calls: Calls,
}

impl Summarizer for CannedSummarizer {
    fn summarize(
        &self,
        text: &str,
        max_length: usize,
        min_length: usize,
    ) -> Result<String, SummarizeError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), max_length, min_length));
        Ok(self.reply.clone())
    }
}

const DEFAULTS: CatalogueDefaults = CatalogueDefaults {
    top_k: 5,
    max_length: 130,
    min_length: 30,
};

fn create_catalogue(reply: &str) -> (Catalogue, Calls, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let books = Arc::new(BackendCsv::load(tmp.path().join("books.csv")).unwrap());
    let calls = Calls::default();

    let catalogue = Catalogue::new(
        books,
        Arc::new(ModelCell::ready("keywords", KeywordEmbedder)),
        Arc::new(ModelCell::ready(
            "canned",
            CannedSummarizer {
                reply: reply.to_string(),
                calls: calls.clone(),
            },
        )),
        4000,
        DEFAULTS,
    );
    (catalogue, calls, tmp)
}

fn add(catalogue: &Catalogue, title: &str, description: &str, content: &str) -> u64 {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    catalogue
        .create(BookCreate {
            title: title.into(),
            author: "Anon".into(),
            genre: None,
            description: non_empty(description),
            content: non_empty(content),
        })
        .unwrap()
        .id
}

// --- ranker over the fake embedder ---

#[test]
fn ranker_puts_dragon_books_first() {
    let ranker = SimilarityRanker::new(Arc::new(KeywordEmbedder));
    let corpus = vec![
        "a story about dragons".to_string(),
        "a romance novel".to_string(),
        "a dragon adventure".to_string(),
    ];

    let results = ranker.rank("dragons", &corpus, 2).unwrap();
    let mut indices = results.iter().map(|r| r.index).collect::<Vec<_>>();
    indices.sort();
    assert_eq!(indices, vec![0, 2]);

    let all = ranker.rank("dragons", &corpus, 3).unwrap();
    assert_eq!(all[2].index, 1);
    assert!(all[1].score > all[2].score);
}

#[test]
fn ranker_rejects_empty_query() {
    let ranker = SimilarityRanker::new(Arc::new(KeywordEmbedder));
    let corpus = vec!["a romance novel".to_string()];

    assert!(matches!(
        ranker.rank("", &corpus, 5),
        Err(RankError::InvalidInput(_))
    ));
    assert!(matches!(
        ranker.rank("   ", &[], 5),
        Err(RankError::InvalidInput(_))
    ));
}

#[test]
fn ranker_empty_corpus_is_empty_result() {
    let ranker = SimilarityRanker::new(Arc::new(KeywordEmbedder));
    assert!(ranker.rank("dragons", &[], 5).unwrap().is_empty());
}

#[test]
fn ranker_scores_are_dot_products_of_embeddings() {
    let ranker = SimilarityRanker::new(Arc::new(KeywordEmbedder));
    let corpus = vec![
        "knights and dragons".to_string(),
        "space cooks".to_string(),
        "a dragon story".to_string(),
    ];

    let results = ranker.rank("a dragon knight", &corpus, 10).unwrap();
    assert_eq!(results.len(), 3);

    let query = KeywordEmbedder::vector("a dragon knight");
    for result in &results {
        let expected = dot(&query, &KeywordEmbedder::vector(&corpus[result.index]));
        assert!((result.score - expected).abs() < 1e-6);
        assert!((-1.0..=1.0).contains(&result.score));
    }
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn ranker_surfaces_unloadable_model() {
    let cell = ModelCell::<KeywordEmbedder>::new("broken", || Err(anyhow!("no weights")));
    let ranker = SimilarityRanker::new(Arc::new(cell));
    let corpus = vec!["a romance novel".to_string()];

    let err = ranker.rank("dragons", &corpus, 1).unwrap_err();
    assert!(err.is_model_unavailable());
}

// --- listing and CRUD ---

#[test]
fn list_is_newest_first_and_omits_content() {
    let (catalogue, _, _tmp) = create_catalogue("");
    add(&catalogue, "First", "", "body one");
    add(&catalogue, "Second", "", "body two");

    let books = catalogue.list(None).unwrap();
    assert_eq!(
        books.iter().map(|b| b.title.as_str()).collect::<Vec<_>>(),
        vec!["Second", "First"]
    );
    assert!(books.iter().all(|b| b.content.is_none()));

    let full = catalogue.get(books[0].id).unwrap();
    assert_eq!(full.content.as_deref(), Some("body two"));
}

#[test]
fn list_filters_by_keyword() {
    let (catalogue, _, _tmp) = create_catalogue("");
    add(&catalogue, "Dragon Tales", "", "");
    add(&catalogue, "Pasta", "", "");

    let books = catalogue.list(Some("dragon")).unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Dragon Tales");
    assert_eq!(catalogue.list(Some("  ")).unwrap().len(), 2);
}

#[test]
fn create_requires_title_and_author() {
    let (catalogue, _, _tmp) = create_catalogue("");
    let result = catalogue.create(BookCreate {
        title: "  ".into(),
        author: "Anon".into(),
        ..Default::default()
    });
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(catalogue.total().unwrap(), 0);
}

#[test]
fn update_and_delete_missing_book_is_not_found() {
    let (catalogue, _, _tmp) = create_catalogue("");
    let update = BookUpdate {
        title: Some("X".into()),
        ..Default::default()
    };
    assert!(matches!(catalogue.update(7, update), Err(AppError::NotFound)));
    assert!(matches!(catalogue.delete(7), Err(AppError::NotFound)));
    assert!(matches!(catalogue.get(7), Err(AppError::NotFound)));
}

#[test]
fn update_rejects_blank_title() {
    let (catalogue, _, _tmp) = create_catalogue("");
    let id = add(&catalogue, "Title", "", "");
    let update = BookUpdate {
        title: Some(" ".into()),
        ..Default::default()
    };
    assert!(matches!(
        catalogue.update(id, update),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn delete_removes_book() {
    let (catalogue, _, _tmp) = create_catalogue("");
    let id = add(&catalogue, "Title", "", "");
    catalogue.delete(id).unwrap();
    assert_eq!(catalogue.total().unwrap(), 0);
}

// --- summarize ---

#[test]
fn summarize_stores_summary_as_description() {
    let (catalogue, calls, _tmp) = create_catalogue("  A knight meets a dragon.  ");
    let id = add(&catalogue, "Tale", "old description", "Long text about knights.");

    let summary = catalogue.summarize(id, None, None).unwrap();
    assert_eq!(summary.book_id, id);
    assert_eq!(summary.summary, "A knight meets a dragon.");

    let book = catalogue.get(id).unwrap();
    assert_eq!(book.description.as_deref(), Some("A knight meets a dragon."));

    let calls = calls.lock().unwrap();
    assert_eq!(
        calls.as_slice(),
        &[("Long text about knights.".to_string(), 130, 30)]
    );
}

#[test]
fn summarize_passes_explicit_bounds() {
    let (catalogue, calls, _tmp) = create_catalogue("short");
    let id = add(&catalogue, "Tale", "", "text");

    catalogue.summarize(id, Some(60), Some(10)).unwrap();
    assert_eq!(calls.lock().unwrap()[0].1, 60);
    assert_eq!(calls.lock().unwrap()[0].2, 10);
}

#[test]
fn summarize_without_content_is_no_content() {
    let (catalogue, calls, _tmp) = create_catalogue("unused");
    let id = add(&catalogue, "Tale", "has a description", "");

    assert!(matches!(
        catalogue.summarize(id, None, None),
        Err(AppError::NoContent(_))
    ));
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn summarize_blank_result_fails() {
    let (catalogue, _, _tmp) = create_catalogue("   ");
    let id = add(&catalogue, "Tale", "keep me", "text");

    assert!(matches!(
        catalogue.summarize(id, None, None),
        Err(AppError::SummarizationFailed)
    ));
    assert_eq!(
        catalogue.get(id).unwrap().description.as_deref(),
        Some("keep me")
    );
}

#[test]
fn summarize_inverted_bounds_is_user_error() {
    let (catalogue, _, _tmp) = create_catalogue("unused");
    let id = add(&catalogue, "Tale", "", "text");

    let err = catalogue.summarize(id, Some(10), Some(20)).unwrap_err();
    assert!(matches!(
        err,
        AppError::Summarize(SummarizeError::InvalidInput(_))
    ));
    assert!(err.is_user_error());
}

/// Store whose updates report the book as gone, like a concurrent delete.
struct VanishingUpdates(BackendCsv);

impl BookManager for VanishingUpdates {
    fn search(&self, query: BookQuery) -> anyhow::Result<Vec<Book>> {
        self.0.search(query)
    }
    fn create(&self, book: BookCreate) -> anyhow::Result<Book> {
        self.0.create(book)
    }
    fn update(&self, _id: u64, _update: BookUpdate) -> anyhow::Result<Option<Book>> {
        Ok(None)
    }
    fn delete(&self, id: u64) -> anyhow::Result<bool> {
        self.0.delete(id)
    }
    fn total(&self) -> anyhow::Result<usize> {
        self.0.total()
    }
}

#[test]
fn summarize_of_book_deleted_meanwhile_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let books = Arc::new(VanishingUpdates(
        BackendCsv::load(tmp.path().join("books.csv")).unwrap(),
    ));
    let catalogue = Catalogue::new(
        books,
        Arc::new(ModelCell::ready("keywords", KeywordEmbedder)),
        Arc::new(ModelCell::ready(
            "canned",
            CannedSummarizer {
                reply: "A summary.".into(),
                calls: Calls::default(),
            },
        )),
        4000,
        DEFAULTS,
    );
    let id = add(&catalogue, "Tale", "", "text");

    assert!(matches!(
        catalogue.summarize(id, None, None),
        Err(AppError::NotFound)
    ));
}

// --- recommendations and search ---

#[test]
fn recommendations_exclude_the_book_itself() {
    let (catalogue, _, _tmp) = create_catalogue("");
    let target = add(&catalogue, "Target", "a dragon story", "");
    let dragon = add(&catalogue, "Dragon", "", "dragons and knights");
    let romance = add(&catalogue, "Romance", "a romance novel", "");

    let results = catalogue.recommendations(target, Some(5)).unwrap();
    let ids = results.iter().map(|r| r.book.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![dragon, romance]);
    assert!(results.iter().all(|r| r.book.content.is_none()));
}

#[test]
fn recommendations_need_text() {
    let (catalogue, _, _tmp) = create_catalogue("");
    let id = add(&catalogue, "Empty", "", "");
    assert!(matches!(
        catalogue.recommendations(id, None),
        Err(AppError::NoContent(_))
    ));
}

#[test]
fn recommendations_for_single_book_are_empty() {
    let (catalogue, _, _tmp) = create_catalogue("");
    let id = add(&catalogue, "Alone", "a dragon story", "");
    assert!(catalogue.recommendations(id, None).unwrap().is_empty());
}

#[test]
fn search_by_description_ranks_books() {
    let (catalogue, _, _tmp) = create_catalogue("");
    let romance = add(&catalogue, "Romance", "a romance novel", "");
    let dragon = add(&catalogue, "Dragon", "a dragon adventure", "");

    let results = catalogue.search_by_description("dragons", Some(1)).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].book.id, dragon);

    let results = catalogue.search_by_description("romance", None).unwrap();
    assert_eq!(results[0].book.id, romance);
}

#[test]
fn search_by_description_validates_input() {
    let (catalogue, _, _tmp) = create_catalogue("");
    assert!(matches!(
        catalogue.search_by_description(" ", None),
        Err(AppError::Validation(_))
    ));
    assert!(catalogue
        .search_by_description("dragons", None)
        .unwrap()
        .is_empty());
}

// --- model lifecycle ---

#[test]
fn invalid_search_does_not_load_the_embedder() {
    let tmp = tempfile::tempdir().unwrap();
    let books = Arc::new(BackendCsv::load(tmp.path().join("books.csv")).unwrap());
    let catalogue = Catalogue::new(
        books,
        Arc::new(ModelCell::<KeywordEmbedder>::new("keywords", || {
            Err(anyhow!("must not load"))
        })),
        Arc::new(ModelCell::<CannedSummarizer>::new("canned", || {
            Err(anyhow!("must not load"))
        })),
        4000,
        DEFAULTS,
    );
    add(&catalogue, "Dragon", "a dragon adventure", "");

    assert!(matches!(
        catalogue.search_by_description(" ", None),
        Err(AppError::Validation(_))
    ));
    let status = catalogue.model_status();
    assert_eq!(status.embedder.state, ModelState::Unloaded);
    assert_eq!(status.summarizer.state, ModelState::Unloaded);
}

#[test]
fn preload_brings_models_up() {
    let tmp = tempfile::tempdir().unwrap();
    let books = Arc::new(BackendCsv::load(tmp.path().join("books.csv")).unwrap());
    let catalogue = Catalogue::new(
        books,
        Arc::new(ModelCell::new("keywords", || Ok(KeywordEmbedder))),
        Arc::new(ModelCell::new("canned", || {
            Ok(CannedSummarizer {
                reply: "ok".into(),
                calls: Calls::default(),
            })
        })),
        4000,
        DEFAULTS,
    );

    let status = catalogue.model_status();
    assert_eq!(status.embedder.state, ModelState::Unloaded);
    assert_eq!(status.summarizer.state, ModelState::Unloaded);

    let summarizer = catalogue.preload().unwrap();
    assert_eq!(catalogue.model_status().embedder.state, ModelState::Ready);

    summarizer.join().unwrap().unwrap();
    let status = catalogue.model_status();
    assert_eq!(status.summarizer.name, "canned");
    assert_eq!(status.summarizer.state, ModelState::Ready);
}

#[test]
fn preload_reports_embedder_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let books = Arc::new(BackendCsv::load(tmp.path().join("books.csv")).unwrap());
    let catalogue = Catalogue::new(
        books,
        Arc::new(ModelCell::<KeywordEmbedder>::new("broken", || {
            Err(anyhow!("no weights"))
        })),
        Arc::new(ModelCell::ready(
            "canned",
            CannedSummarizer {
                reply: "ok".into(),
                calls: Calls::default(),
            },
        )),
        4000,
        DEFAULTS,
    );

    let err = catalogue.preload().unwrap_err();
    assert_eq!(err.model, "broken");
    assert_eq!(catalogue.model_status().embedder.state, ModelState::Unloaded);
}
