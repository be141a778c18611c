//! The recipe catalog: bundled plus custom recipes, the favorites set, and the
//! derived filtered view.
//!
//! Every mutation updates memory first and then commits the affected storage
//! key. A failed commit is logged and the in-memory change stands.

use rand::seq::IteratorRandom;
use rand::Rng;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use uuid::Uuid;

use crate::draft::{RecipeDraft, ValidationErrors};
use crate::recipe::{Recipe, RecipeId};
use crate::storage::{load_json, save_json, KeyValueStorage, CUSTOM_RECIPES_KEY, FAVORITES_KEY};

pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("No recipe with id {0}")]
    NotFound(RecipeId),
    #[error("Recipe {0} comes from the bundled collection and cannot be deleted")]
    ReadOnly(RecipeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Named(String),
}

impl CategoryFilter {
    /// Parses user input; blank input and the `all` sentinel select everything.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(ALL_CATEGORIES) {
            CategoryFilter::All
        } else {
            CategoryFilter::Named(raw.to_string())
        }
    }

    fn matches(&self, recipe: &Recipe) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Named(name) => recipe
                .category()
                .is_some_and(|category| category.to_lowercase() == name.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    Added(RecipeId),
    Deleted(RecipeId),
    FavoriteToggled { id: RecipeId, favorite: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&CatalogEvent) + Send>;

pub struct Catalog<S> {
    recipes: Vec<Recipe>,
    favorites: Vec<RecipeId>,
    storage: S,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl<S: KeyValueStorage> Catalog<S> {
    /// Builds the working collection from the bundled recipes and whatever
    /// custom recipes and favorites `storage` holds. Corrupt or missing
    /// entries are skipped.
    pub fn initialize(bundled: Vec<Recipe>, storage: S) -> Self {
        let mut recipes = bundled;
        let mut ids: HashSet<RecipeId> = HashSet::new();
        recipes.retain_mut(|recipe| {
            recipe.is_custom = false;
            ids.insert(recipe.id.clone())
        });

        let mut restored = 0;
        for mut recipe in stored_recipes(&storage, CUSTOM_RECIPES_KEY) {
            if !ids.insert(recipe.id.clone()) {
                log::warn!("Skipping stored recipe with duplicate id {}", recipe.id);
                continue;
            }
            recipe.is_custom = true;
            recipes.push(recipe);
            restored += 1;
        }

        let mut favorites: Vec<RecipeId> = Vec::new();
        for recipe in stored_recipes(&storage, FAVORITES_KEY) {
            if !ids.contains(&recipe.id) {
                log::debug!("Dropping favorite {} missing from the collection", recipe.id);
            } else if !favorites.contains(&recipe.id) {
                favorites.push(recipe.id);
            }
        }

        log::debug!(
            "Catalog ready: {} recipes ({} custom), {} favorites",
            recipes.len(),
            restored,
            favorites.len()
        );

        Self {
            recipes,
            favorites,
            storage,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn get(&self, id: &RecipeId) -> Option<&Recipe> {
        self.recipes.iter().find(|r| &r.id == id)
    }

    pub fn is_favorite(&self, id: &RecipeId) -> bool {
        self.favorites.contains(id)
    }

    /// Favorited recipes in the order they were favorited.
    pub fn favorites(&self) -> Vec<&Recipe> {
        self.favorites.iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn add_recipe(&mut self, draft: &RecipeDraft) -> Result<&Recipe, ValidationErrors> {
        let valid = draft.validate()?;
        let id = self.fresh_id();
        let recipe = valid.into_recipe(id.clone());
        log::info!("Adding custom recipe {} ({})", recipe.title, id);
        self.recipes.push(recipe);
        self.commit_custom();
        self.notify(CatalogEvent::Added(id));
        Ok(&self.recipes[self.recipes.len() - 1])
    }

    pub fn delete_recipe(&mut self, id: &RecipeId) -> Result<Recipe, CatalogError> {
        let index = self
            .recipes
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        if !self.recipes[index].is_custom {
            return Err(CatalogError::ReadOnly(id.clone()));
        }

        let removed = self.recipes.remove(index);
        log::info!("Deleted custom recipe {} ({})", removed.title, id);
        self.commit_custom();
        self.notify(CatalogEvent::Deleted(id.clone()));

        if self.is_favorite(id) {
            self.favorites.retain(|fav| fav != id);
            self.commit_favorites();
            self.notify(CatalogEvent::FavoriteToggled {
                id: id.clone(),
                favorite: false,
            });
        }
        Ok(removed)
    }

    /// Flips favorite membership of `id`; returns whether it is now a
    /// favorite.
    pub fn toggle_favorite(&mut self, id: &RecipeId) -> Result<bool, CatalogError> {
        if self.get(id).is_none() {
            return Err(CatalogError::NotFound(id.clone()));
        }
        let favorite = if self.is_favorite(id) {
            self.favorites.retain(|fav| fav != id);
            false
        } else {
            self.favorites.push(id.clone());
            true
        };
        self.commit_favorites();
        self.notify(CatalogEvent::FavoriteToggled {
            id: id.clone(),
            favorite,
        });
        Ok(favorite)
    }

    /// Recipes whose title or any ingredient contains `query`
    /// (case-insensitive) and whose category matches `category`, in
    /// collection order.
    pub fn filter(&self, query: &str, category: &CategoryFilter) -> Vec<&Recipe> {
        let needle = query.trim().to_lowercase();
        self.recipes
            .iter()
            .filter(|r| category.matches(r))
            .filter(|r| needle.is_empty() || r.mentions(&needle))
            .collect()
    }

    /// Distinct non-empty categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.recipes
            .iter()
            .filter_map(Recipe::category)
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn random_recipe<R: Rng + ?Sized>(
        &self,
        exclude: &[RecipeId],
        rng: &mut R,
    ) -> Option<&Recipe> {
        let recipe = self
            .recipes
            .iter()
            .filter(|r| !exclude.contains(&r.id))
            .choose(rng);
        log::debug!("Picked random recipe: {:?}", recipe.map(|r| &r.id));
        recipe
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&CatalogEvent) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    /// Writes the custom subset of the collection.
    pub fn commit_custom(&mut self) {
        let custom: Vec<&Recipe> = self.recipes.iter().filter(|r| r.is_custom).collect();
        if let Err(e) = save_json(&mut self.storage, CUSTOM_RECIPES_KEY, &custom) {
            log::error!("Failed to persist custom recipes: {}", e);
        }
    }

    /// Writes the full favorites set as recipe objects.
    pub fn commit_favorites(&mut self) {
        let favorites: Vec<&Recipe> = self
            .favorites
            .iter()
            .filter_map(|id| self.recipes.iter().find(|r| &r.id == id))
            .collect();
        if let Err(e) = save_json(&mut self.storage, FAVORITES_KEY, &favorites) {
            log::error!("Failed to persist favorites: {}", e);
        }
    }

    fn fresh_id(&self) -> RecipeId {
        loop {
            let id = RecipeId::new(Uuid::new_v4().to_string());
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    fn notify(&mut self, event: CatalogEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}

/// Recipes stored under `key`; entries that do not parse are skipped one by
/// one rather than discarding the whole list.
fn stored_recipes(storage: &impl KeyValueStorage, key: &str) -> Vec<Recipe> {
    let Some(values) = load_json::<Vec<Value>>(storage, key) else {
        return Vec::new();
    };
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Recipe>(value) {
            Ok(recipe) => Some(recipe),
            Err(e) => {
                log::warn!("Skipping malformed entry under '{}': {}", key, e);
                None
            }
        })
        .collect()
}
