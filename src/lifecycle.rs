//! Explicit load lifecycle for pretrained models.
//!
//! A [`ModelCell`] owns a loader and the loaded instance:
//! - `Unloaded -> Loading -> Ready`, and `Ready` is terminal
//! - concurrent first callers block on a single load
//! - a failed load leaves the cell `Unloaded` so a later call can try again

use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

type Loader<M> = Box<dyn Fn() -> anyhow::Result<M> + Send + Sync>;

/// A model could not be brought up.
#[derive(Debug, Clone, thiserror::Error)]
#[error("model '{model}' unavailable: {reason}")]
pub struct LoadError {
    pub model: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
}

pub struct ModelCell<M> {
    name: String,
    cell: OnceCell<Arc<M>>,
    loading: AtomicBool,
    loader: Option<Loader<M>>,
}

impl<M> ModelCell<M> {
    /// Create an unloaded cell. Nothing runs until [`ModelCell::get`] or
    /// [`ModelCell::load`] is called.
    pub fn new<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<M> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            cell: OnceCell::new(),
            loading: AtomicBool::new(false),
            loader: Some(Box::new(loader)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ModelState {
        if self.cell.get().is_some() {
            ModelState::Ready
        } else if self.loading.load(Ordering::Acquire) {
            ModelState::Loading
        } else {
            ModelState::Unloaded
        }
    }

    /// Return the loaded model, loading it first if needed.
    pub fn get(&self) -> Result<Arc<M>, LoadError> {
        self.cell
            .get_or_try_init(|| self.run_loader())
            .map(Arc::clone)
    }

    /// Run the initialization phase now.
    pub fn load(&self) -> Result<(), LoadError> {
        self.get().map(|_| ())
    }

    fn run_loader(&self) -> Result<Arc<M>, LoadError> {
        let loader = self.loader.as_ref().ok_or_else(|| LoadError {
            model: self.name.clone(),
            reason: "no loader configured".to_string(),
        })?;

        self.loading.store(true, Ordering::Release);
        log::info!("Loading model '{}'", self.name);
        let now = Instant::now();

        let result = loader();
        self.loading.store(false, Ordering::Release);

        match result {
            Ok(model) => {
                log::info!(
                    "Model '{}' ready in {}ms",
                    self.name,
                    now.elapsed().as_millis()
                );
                Ok(Arc::new(model))
            }
            Err(err) => {
                log::error!("Model '{}' failed to load: {err:#}", self.name);
                Err(LoadError {
                    model: self.name.clone(),
                    reason: format!("{err:#}"),
                })
            }
        }
    }
}

/// Type-erased view of a [`ModelCell`] for code that only drives the
/// lifecycle and does not care what the model is.
pub trait Loadable: Send + Sync {
    fn name(&self) -> &str;
    fn state(&self) -> ModelState;
    fn load(&self) -> Result<(), LoadError>;
}

impl<M: Send + Sync> Loadable for ModelCell<M> {
    fn name(&self) -> &str {
        ModelCell::name(self)
    }

    fn state(&self) -> ModelState {
        ModelCell::state(self)
    }

    fn load(&self) -> Result<(), LoadError> {
        ModelCell::load(self)
    }
}

#[cfg(test)]
impl<M> ModelCell<M> {
    /// Wrap an instance that is already loaded.
    pub fn ready(name: impl Into<String>, model: M) -> Self {
        Self {
            name: name.into(),
            cell: OnceCell::with_value(Arc::new(model)),
            loading: AtomicBool::new(false),
            loader: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ModelState::Ready
    }
}

impl dyn Loadable {
    /// Load on a background thread so the caller is not blocked.
    pub fn spawn_load(self: &Arc<Self>) -> JoinHandle<Result<(), LoadError>> {
        let cell = Arc::clone(self);
        std::thread::spawn(move || cell.load())
    }
}
