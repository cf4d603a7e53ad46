use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct BookFields {
    /// Book title
    #[clap(short, long)]
    pub title: Option<String>,

    /// Book author
    #[clap(short, long)]
    pub author: Option<String>,

    /// Book genre
    #[clap(short, long)]
    pub genre: Option<String>,

    /// Short description
    #[clap(short, long)]
    pub description: Option<String>,

    /// Full text of the book
    #[clap(short, long, conflicts_with = "content_file")]
    pub content: Option<String>,

    /// Read the full text from a file
    #[clap(long)]
    pub content_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import books from a CSV file (title,author,genre,description,content)
    Seed {
        /// Path to the seed file
        path: PathBuf,
    },
    /// Add a book
    Add {
        #[clap(flatten)]
        fields: BookFields,
    },
    /// List books, newest first
    List {
        /// Case-insensitive filter on title, author, genre and description
        #[clap(short, long)]
        query: Option<String>,

        /// Print the count
        #[clap(short = 'n', long, default_value = "false")]
        count: bool,
    },
    /// Show one book including its content
    Show { id: u64 },
    /// Change fields of a book
    Update {
        id: u64,

        #[clap(flatten)]
        fields: BookFields,
    },
    /// Delete a book
    Delete {
        id: u64,

        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },
    /// Summarize a book's content and store it as the description
    Summarize {
        id: u64,

        /// Upper bound for summary length, in tokens
        #[clap(long)]
        max_length: Option<usize>,

        /// Lower bound for summary length, in tokens
        #[clap(long)]
        min_length: Option<usize>,
    },
    /// Books similar to the given one
    Similar {
        id: u64,

        /// Number of results
        #[clap(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Find books matching a free-form description
    Search {
        description: String,

        /// Number of results
        #[clap(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Show model status
    Models {
        /// Load both models before reporting
        #[clap(long, default_value = "false")]
        load: bool,
    },
}
