//! Catalog-facing half of the assistant: the read-only store, the queries
//! and cards behind each tool, and the registry that exposes them.

pub mod catalog;
pub mod format;
pub mod prompt;
pub mod queries;
pub mod tool;

pub use catalog::{CatalogError, CatalogStore, SqliteCatalog};
pub use format::CardStyle;
pub use prompt::SYSTEM_PROMPT;
pub use tool::{catalog_registry, CatalogTool, CatalogToolExecutor};
