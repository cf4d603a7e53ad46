//! Bulk import of books from a seed CSV.
//!
//! Expected headers: `title,author,genre,description,content`. Any column may
//! be missing or empty.

use crate::books::{BookCreate, BookManager, BookQuery};
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct SeedRow {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SeedReport {
    pub added: usize,
    pub duplicates: usize,
    /// Rows imported with a placeholder title or author
    pub filled: usize,
}

const UNTITLED: &str = "Untitled";
const UNKNOWN_AUTHOR: &str = "Unknown";

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Import every row that is not already in the catalogue (exact title and
/// author match). A missing title or author is replaced by a placeholder.
pub fn seed_from_csv(books: &dyn BookManager, path: &Path) -> anyhow::Result<SeedReport> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("seed file not readable: {}", path.display()))?;

    let mut report = SeedReport::default();
    for (line, row) in reader.deserialize::<SeedRow>().enumerate() {
        let row = row.with_context(|| format!("malformed seed row {}", line + 1))?;

        let (title, author) = (clean(row.title), clean(row.author));
        let filled = title.is_none() || author.is_none();
        let title = title.unwrap_or_else(|| UNTITLED.to_string());
        let author = author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        let existing = books.search(BookQuery {
            title: Some(title.clone()),
            author: Some(author.clone()),
            limit: Some(1),
            ..Default::default()
        })?;
        if !existing.is_empty() {
            log::debug!("seed row {} skipped: '{title}' by {author} exists", line + 1);
            report.duplicates += 1;
            continue;
        }

        if filled {
            log::warn!(
                "seed row {} lacks title or author, imported as '{title}' by {author}",
                line + 1
            );
            report.filled += 1;
        }

        books.create(BookCreate {
            title,
            author,
            genre: clean(row.genre),
            description: clean(row.description),
            content: clean(row.content),
        })?;
        report.added += 1;
    }

    log::info!(
        "Seeded {} books ({} duplicates, {} with placeholders)",
        report.added,
        report.duplicates,
        report.filled
    );

    Ok(report)
}
