use std::env;
use std::path::PathBuf;

pub const DATASET_VAR: &str = "RECIPE_BOX_DATASET";
pub const DB_VAR: &str = "RECIPE_BOX_DB";

const DEFAULT_DATASET: &str = "assets/recipes.json";
const DEFAULT_DB: &str = "recipe_box.db";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub dataset_path: PathBuf,
    pub db_path: PathBuf,
}

impl Config {
    /// Reads the configuration from the environment, falling back to the
    /// defaults for anything unset or blank.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            dataset_path: path_var(&lookup, DATASET_VAR, DEFAULT_DATASET),
            db_path: path_var(&lookup, DB_VAR, DEFAULT_DB),
        }
    }
}

fn path_var(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> PathBuf {
    match lookup(key).map(|v| v.trim().to_string()) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        Some(_) => {
            log::warn!("{} is blank, using default: {}", key, default);
            PathBuf::from(default)
        }
        None => {
            log::info!("{} not set, using default: {}", key, default);
            PathBuf::from(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_unset_or_blank() {
        let vars = HashMap::from([(DB_VAR, "  ")]);
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.dataset_path, PathBuf::from(DEFAULT_DATASET));
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB));
    }

    #[test]
    fn values_are_taken_from_the_environment() {
        let vars = HashMap::from([(DATASET_VAR, "/srv/recipes.json"), (DB_VAR, "/var/box.db")]);
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.dataset_path, PathBuf::from("/srv/recipes.json"));
        assert_eq!(config.db_path, PathBuf::from("/var/box.db"));
    }
}
