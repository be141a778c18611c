use std::collections::BTreeMap;
use std::fmt;

use crate::recipe::{Recipe, RecipeId, DEFAULT_CATEGORY};

/// Raw user input for a new recipe, as typed into the add form.
///
/// Numbers stay as text until validation so that bad input can be reported
/// per field instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeDraft {
    pub title: String,
    pub image: String,
    pub category: String,
    pub cooking_time: String,
    pub servings: String,
    pub ingredients: String,
    pub instructions: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    CookingTime,
    Servings,
    Ingredients,
    Instructions,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::CookingTime => "cookingTime",
            Field::Servings => "servings",
            Field::Ingredients => "ingredients",
            Field::Instructions => "instructions",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Field-level messages produced by [`RecipeDraft::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<Field, String>,
}

impl ValidationErrors {
    fn insert(&mut self, field: Field, message: &str) {
        self.errors.insert(field, message.to_string());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.errors.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.errors.iter().map(|(field, msg)| (*field, msg.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .iter()
            .map(|(field, msg)| format!("{}: {}", field, msg))
            .collect();
        write!(f, "invalid recipe ({})", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Checked draft, ready to receive an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDraft {
    title: String,
    image: Option<String>,
    category: String,
    cooking_time: u32,
    servings: u32,
    ingredients: Vec<String>,
    instructions: Vec<String>,
}

impl ValidDraft {
    pub fn into_recipe(self, id: RecipeId) -> Recipe {
        Recipe {
            id,
            title: self.title,
            image: self.image,
            category: Some(self.category),
            cooking_time: self.cooking_time,
            servings: self.servings,
            ingredients: self.ingredients,
            instructions: self.instructions,
            is_custom: true,
        }
    }
}

impl RecipeDraft {
    pub fn validate(&self) -> Result<ValidDraft, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let title = self.title.trim();
        if title.is_empty() {
            errors.insert(Field::Title, "Title is required");
        }
        let cooking_time = positive_count(
            &self.cooking_time,
            "Cooking time must be greater than 0",
            "Cooking time must be a whole number of minutes",
        )
        .unwrap_or_else(|msg| {
            errors.insert(Field::CookingTime, msg);
            0
        });
        let servings = positive_count(
            &self.servings,
            "Servings must be greater than 0",
            "Servings must be a whole number",
        )
        .unwrap_or_else(|msg| {
            errors.insert(Field::Servings, msg);
            0
        });
        let ingredients = split_lines(&self.ingredients);
        if ingredients.is_empty() {
            errors.insert(Field::Ingredients, "At least one ingredient is required");
        }
        let instructions = split_lines(&self.instructions);
        if instructions.is_empty() {
            errors.insert(Field::Instructions, "At least one instruction is required");
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let image = Some(self.image.trim())
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        let category = match self.category.trim() {
            "" => DEFAULT_CATEGORY.to_string(),
            category => category.to_string(),
        };

        Ok(ValidDraft {
            title: title.to_string(),
            image,
            category,
            cooking_time,
            servings,
            ingredients,
            instructions,
        })
    }
}

fn positive_count(
    raw: &str,
    not_positive: &'static str,
    not_a_number: &'static str,
) -> Result<u32, &'static str> {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => u32::try_from(n).map_err(|_| not_a_number),
        Ok(_) => Err(not_positive),
        Err(_) if raw.is_empty() => Err(not_positive),
        Err(_) => Err(not_a_number),
    }
}

/// Splits multi-line text into trimmed lines, dropping the empty ones.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pancakes() -> RecipeDraft {
        RecipeDraft {
            title: "  Pancakes ".to_string(),
            image: String::new(),
            category: String::new(),
            cooking_time: "20".to_string(),
            servings: "4".to_string(),
            ingredients: "2 eggs\n\n  1 cup milk \n".to_string(),
            instructions: "Whisk\r\nFry".to_string(),
        }
    }

    #[test]
    fn valid_draft_becomes_custom_recipe() {
        let recipe = pancakes()
            .validate()
            .unwrap()
            .into_recipe(RecipeId::from("abc"));
        assert_eq!(recipe.title, "Pancakes");
        assert_eq!(recipe.ingredients, vec!["2 eggs", "1 cup milk"]);
        assert_eq!(recipe.instructions, vec!["Whisk", "Fry"]);
        assert_eq!(recipe.category.as_deref(), Some(DEFAULT_CATEGORY));
        assert_eq!(recipe.image, None);
        assert_eq!((recipe.cooking_time, recipe.servings), (20, 4));
        assert!(recipe.is_custom);
    }

    #[test]
    fn zero_cooking_time_is_rejected() {
        let draft = RecipeDraft {
            cooking_time: "0".to_string(),
            ..pancakes()
        };
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get(Field::CookingTime),
            Some("Cooking time must be greater than 0")
        );
    }

    #[test]
    fn every_missing_field_is_reported() {
        let errors = RecipeDraft::default().validate().unwrap_err();
        for field in [
            Field::Title,
            Field::CookingTime,
            Field::Servings,
            Field::Ingredients,
            Field::Instructions,
        ] {
            assert!(errors.contains(field), "missing error for {}", field);
        }
    }

    #[test]
    fn non_numeric_and_negative_values() {
        let draft = RecipeDraft {
            cooking_time: "soon".to_string(),
            servings: "-2".to_string(),
            ..pancakes()
        };
        let errors = draft.validate().unwrap_err();
        assert_eq!(
            errors.get(Field::CookingTime),
            Some("Cooking time must be a whole number of minutes")
        );
        assert_eq!(
            errors.get(Field::Servings),
            Some("Servings must be greater than 0")
        );
    }

    #[test]
    fn whitespace_only_lines_do_not_count() {
        let draft = RecipeDraft {
            ingredients: "  \n\t\n".to_string(),
            ..pancakes()
        };
        let errors = draft.validate().unwrap_err();
        assert!(errors.contains(Field::Ingredients));
        assert!(!errors.contains(Field::Instructions));
    }
}
