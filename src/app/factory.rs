use crate::{
    app::catalogue::{Catalogue, CatalogueDefaults},
    books,
    config::Config,
    lifecycle::ModelCell,
    semantic::EmbeddingModel,
    summarize::HttpSummarizer,
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Application factory: the one place where concrete models and stores are
/// chosen and wired together.
pub struct AppFactory;

impl AppFactory {
    /// Build a catalogue over the on-disk store, with both models unloaded.
    pub fn create_catalogue(paths: &AppPaths) -> Result<Catalogue> {
        let config = Self::create_config(paths)?;
        let books = Arc::new(
            books::BackendCsv::load(&paths.books_path)
                .with_context(|| format!("failed to open {}", paths.books_path.display()))?,
        );

        Ok(Catalogue::new(
            books,
            Self::embedder_cell(&config, paths),
            Self::summarizer_cell(&config),
            config.summarizer.max_input_chars,
            CatalogueDefaults::from(&config),
        ))
    }

    pub fn create_config(paths: &AppPaths) -> Result<Config> {
        Config::load_with(&paths.base_path).context("failed to load config")
    }

    pub fn embedder_cell(config: &Config, paths: &AppPaths) -> Arc<ModelCell<EmbeddingModel>> {
        let model_name = config.semantic.model.clone();
        let timeout = Duration::from_secs(config.semantic.download_timeout_secs);
        let cache_dir = paths.base_path.clone();

        Arc::new(ModelCell::new(model_name.clone(), move || {
            Ok(EmbeddingModel::new(
                &model_name,
                cache_dir.clone(),
                Some(timeout),
            )?)
        }))
    }

    pub fn summarizer_cell(config: &Config) -> Arc<ModelCell<HttpSummarizer>> {
        let summarizer_config = config.summarizer.clone();
        let name = summarizer_config
            .endpoint
            .rsplit("/models/")
            .next()
            .unwrap_or(&summarizer_config.endpoint)
            .to_string();

        Arc::new(ModelCell::new(name, move || {
            HttpSummarizer::connect(&summarizer_config)
        }))
    }

    /// Get application paths, creating the base directory
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;

        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Ok(AppPaths::new(base_path))
    }

    /// `LIBRIS_BASE_PATH`, or `~/.local/share/libris`
    fn get_base_path() -> Result<PathBuf> {
        if let Ok(base_path) = std::env::var("LIBRIS_BASE_PATH") {
            return Ok(PathBuf::from(base_path));
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(home.join(".local/share/libris"))
    }
}

/// Application paths structure
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: PathBuf,
    pub books_path: PathBuf,
}

impl AppPaths {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            books_path: base_path.join("books.csv"),
            base_path,
        }
    }
}
