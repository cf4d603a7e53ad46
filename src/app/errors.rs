use crate::{semantic::RankError, summarize::SummarizeError};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("book not found")]
    NotFound,

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0}")]
    NoContent(&'static str),

    #[error("summarization failed")]
    SummarizationFailed,

    #[error("ranking error: {0}")]
    Rank(#[from] RankError),

    #[error("summarization error: {0}")]
    Summarize(#[from] SummarizeError),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the caller did something wrong, as opposed to the system
    /// failing. Drives the CLI exit code.
    pub fn is_user_error(&self) -> bool {
        match self {
            AppError::NotFound | AppError::Validation(_) | AppError::NoContent(_) => true,
            AppError::Rank(RankError::InvalidInput(_)) => true,
            AppError::Summarize(SummarizeError::InvalidInput(_)) => true,
            _ => false,
        }
    }
}
