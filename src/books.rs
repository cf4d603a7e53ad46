use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    hash::Hash,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Instant,
};

#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,

    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Hash for Book {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialEq for Book {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Book {
    /// Text that represents this book for similarity ranking:
    /// description and content joined by a newline, trimmed.
    pub fn ranking_text(&self) -> String {
        format!(
            "{}\n{}",
            self.description.as_deref().unwrap_or_default(),
            self.content.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    /// Same book without the (possibly long) content body.
    pub fn without_content(mut self) -> Self {
        self.content = None;
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BookCreate {
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BookUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl BookUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.genre.is_none()
            && self.description.is_none()
            && self.content.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BookQuery {
    pub id: Option<u64>,
    /// Case-insensitive substring over title, author, genre and description
    pub keyword: Option<String>,
    /// Exact title match
    pub title: Option<String>,
    /// Exact author match
    pub author: Option<String>,

    #[serde(default)]
    pub limit: Option<usize>,
}

pub trait BookManager: Send + Sync {
    /// Matching books in insertion order.
    fn search(&self, query: BookQuery) -> anyhow::Result<Vec<Book>>;
    fn create(&self, book: BookCreate) -> anyhow::Result<Book>;
    /// Returns `None` when no book has this id.
    fn update(&self, id: u64, update: BookUpdate) -> anyhow::Result<Option<Book>>;
    /// Returns false when no book has this id.
    fn delete(&self, id: u64) -> anyhow::Result<bool>;
    fn total(&self) -> anyhow::Result<usize>;
}

#[derive(Debug, Clone, Default)]
pub struct BackendCsv {
    list: Arc<RwLock<Vec<Book>>>,
    path: PathBuf,
}

const CSV_HEADERS: [&str; 7] = [
    "id",
    "title",
    "author",
    "genre",
    "description",
    "content",
    "created_at",
];

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl BackendCsv {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Err(err) = std::fs::metadata(path) {
            match err.kind() {
                ErrorKind::NotFound => {
                    log::info!("Creating new database at {}", path.display());
                    let mut csv_wrt = csv::Writer::from_path(path)?;
                    csv_wrt.write_record(CSV_HEADERS)?;
                    csv_wrt.flush()?;
                }
                _ => Err(err)?,
            }
        }

        let now = Instant::now();
        let mut csv_reader = csv::Reader::from_path(path)?;

        let mut books = vec![];
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let field = |idx: usize, name: &str| {
                record
                    .get(idx)
                    .ok_or_else(|| anyhow!("record {line}: missing {name}"))
            };

            let id = field(0, "id")?
                .parse::<u64>()
                .with_context(|| format!("record {line}: bad id"))?;
            let created_at = DateTime::parse_from_rfc3339(field(6, "created_at")?)
                .with_context(|| format!("record {line}: bad created_at"))?
                .with_timezone(&Utc);

            books.push(Book {
                id,
                title: field(1, "title")?.to_string(),
                author: field(2, "author")?.to_string(),
                genre: non_empty(field(3, "genre")?),
                description: non_empty(field(4, "description")?),
                content: non_empty(field(5, "content")?),
                created_at,
            });
        }

        log::debug!(
            "took {}ms to read csv",
            now.elapsed().as_micros() as f64 / 1000.0
        );

        Ok(BackendCsv {
            list: Arc::new(RwLock::new(books)),
            path: path.to_path_buf(),
        })
    }

    fn read_list(&self) -> anyhow::Result<RwLockReadGuard<'_, Vec<Book>>> {
        self.list.read().map_err(|_| anyhow!("book list lock poisoned"))
    }

    fn write_list(&self) -> anyhow::Result<RwLockWriteGuard<'_, Vec<Book>>> {
        self.list.write().map_err(|_| anyhow!("book list lock poisoned"))
    }

    /// Rewrites the whole file through a temp file and a rename.
    fn save(&self, books: &[Book]) -> anyhow::Result<()> {
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push("-tmp");

        let mut csv_wrt = csv::Writer::from_path(&temp_path)?;
        csv_wrt.write_record(CSV_HEADERS)?;
        for book in books {
            csv_wrt.write_record([
                book.id.to_string().as_str(),
                book.title.as_str(),
                book.author.as_str(),
                book.genre.as_deref().unwrap_or_default(),
                book.description.as_deref().unwrap_or_default(),
                book.content.as_deref().unwrap_or_default(),
                book.created_at.to_rfc3339().as_str(),
            ])?;
        }
        csv_wrt.flush()?;
        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Persist `next`, and only then make it the in-memory list.
    fn commit(&self, books: &mut Vec<Book>, next: Vec<Book>) -> anyhow::Result<()> {
        self.save(&next)?;
        *books = next;
        Ok(())
    }
}

impl BookManager for BackendCsv {
    fn create(&self, book_create: BookCreate) -> anyhow::Result<Book> {
        let mut books = self.write_list()?;
        let id = books.iter().map(|b| b.id).max().map_or(1, |max| max + 1);

        let book = Book {
            id,
            title: book_create.title,
            author: book_create.author,
            genre: book_create.genre,
            description: book_create.description,
            content: book_create.content,
            created_at: Utc::now(),
        };

        let mut next = books.clone();
        next.push(book.clone());
        self.commit(&mut books, next)?;

        Ok(book)
    }

    fn delete(&self, id: u64) -> anyhow::Result<bool> {
        let mut books = self.write_list()?;
        let Some(idx) = books.iter().position(|b| b.id == id) else {
            return Ok(false);
        };

        let mut next = books.clone();
        next.remove(idx);
        self.commit(&mut books, next)?;

        Ok(true)
    }

    fn update(&self, id: u64, book_update: BookUpdate) -> anyhow::Result<Option<Book>> {
        let mut books = self.write_list()?;
        let mut next = books.clone();
        let Some(book) = next.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };

        if let Some(title) = book_update.title {
            book.title = title;
        }
        if let Some(author) = book_update.author {
            book.author = author;
        }
        if let Some(genre) = book_update.genre {
            book.genre = non_empty(&genre);
        }
        if let Some(descr) = book_update.description {
            book.description = non_empty(&descr);
        }
        if let Some(content) = book_update.content {
            book.content = non_empty(&content);
        }

        let result = book.clone();
        self.commit(&mut books, next)?;

        Ok(Some(result))
    }

    fn total(&self) -> anyhow::Result<usize> {
        Ok(self.read_list()?.len())
    }

    fn search(&self, query: BookQuery) -> anyhow::Result<Vec<Book>> {
        let books = self.read_list()?;

        let keyword = query.keyword.map(|k| k.to_lowercase());
        let contains = |field: Option<&str>, needle: &str| {
            field
                .map(|f| f.to_lowercase().contains(needle))
                .unwrap_or(false)
        };

        let mut output = vec![];
        for book in books.iter() {
            if query.id.is_some_and(|id| id != book.id) {
                continue;
            }
            if let Some(title) = &query.title {
                if book.title != *title {
                    continue;
                }
            }
            if let Some(author) = &query.author {
                if book.author != *author {
                    continue;
                }
            }
            if let Some(keyword) = &keyword {
                let matches = contains(Some(book.title.as_str()), keyword)
                    || contains(Some(book.author.as_str()), keyword)
                    || contains(book.genre.as_deref(), keyword)
                    || contains(book.description.as_deref(), keyword);
                if !matches {
                    continue;
                }
            }

            output.push(book.clone());

            if query.id.is_some() || query.limit.is_some_and(|limit| output.len() >= limit) {
                break;
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
impl BackendCsv {
    pub fn path(&self) -> &Path {
        &self.path
    }
}
