use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const DEFAULT_IMAGE: &str =
    "https://images.unsplash.com/photo-1495521821757-a1efb6729352?w=800";
pub const DEFAULT_CATEGORY: &str = "Custom";

/// Identifier of a recipe.
///
/// The bundled dataset uses integer ids while user recipes get UUID strings,
/// so both are read into the string form and compared as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    pub fn new(id: impl Into<String>) -> Self {
        RecipeId(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipeId {
    fn from(id: &str) -> Self {
        RecipeId(id.trim().to_string())
    }
}

impl From<i64> for RecipeId {
    fn from(id: i64) -> Self {
        RecipeId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for RecipeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => RecipeId::new(id),
            RawId::Int(id) => RecipeId::from(id),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub cooking_time: u32,
    pub servings: u32,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub is_custom: bool,
}

impl Recipe {
    /// Image to display, falling back to the default picture when the recipe
    /// has none.
    pub fn image_url(&self) -> &str {
        match self.image.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => DEFAULT_IMAGE,
        }
    }

    /// Non-empty category, if any.
    pub fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Case-insensitive substring match against the title and every
    /// ingredient line. `needle` must already be lowercase.
    pub(crate) fn mentions(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self
                .ingredients
                .iter()
                .any(|line| line.to_lowercase().contains(needle))
    }
}
