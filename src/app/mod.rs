pub mod catalogue;
pub mod errors;
pub mod factory;

pub use catalogue::{BookSummary, Catalogue, CatalogueDefaults, ModelStatus, ScoredBook};
pub use errors::AppError;
pub use factory::{AppFactory, AppPaths};
