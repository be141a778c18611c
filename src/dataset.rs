use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::recipe::{Recipe, RecipeId};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Malformed dataset: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Duplicate recipe id {0} in dataset")]
    DuplicateId(RecipeId),
}

#[derive(Deserialize)]
struct Dataset {
    recipes: Vec<Recipe>,
}

/// Loads the bundled recipes shipped next to the binary.
pub fn load_dataset(path: &Path) -> Result<Vec<Recipe>, DatasetError> {
    let json_str = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let recipes = parse_dataset(&json_str)?;
    log::info!("Loaded {} bundled recipes from {}", recipes.len(), path.display());
    Ok(recipes)
}

pub fn parse_dataset(json_str: &str) -> Result<Vec<Recipe>, DatasetError> {
    let Dataset { mut recipes } = serde_json::from_str(json_str)?;
    let mut seen = HashSet::new();
    for recipe in recipes.iter_mut() {
        if !seen.insert(recipe.id.clone()) {
            return Err(DatasetError::DuplicateId(recipe.id.clone()));
        }
        recipe.is_custom = false;
    }
    Ok(recipes)
}
