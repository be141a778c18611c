pub mod catalog;
pub mod config;
pub mod dataset;
pub mod draft;
pub mod recipe;
pub mod render;
pub mod shelf;
pub mod storage;

pub use catalog::{Catalog, CatalogError, CatalogEvent, CategoryFilter};
pub use draft::{Field, RecipeDraft, ValidationErrors};
pub use recipe::{Recipe, RecipeId};
pub use storage::{KeyValueStorage, MemoryStorage, SqliteStorage};
