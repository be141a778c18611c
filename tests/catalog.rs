use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use recipe_box::dataset::{load_dataset, parse_dataset};
use recipe_box::storage::{load_json, open_connection, CUSTOM_RECIPES_KEY, FAVORITES_KEY};
use recipe_box::{
    Catalog, CategoryFilter, Field, KeyValueStorage, MemoryStorage, Recipe, RecipeDraft, RecipeId,
    SqliteStorage,
};

fn bundled() -> Vec<Recipe> {
    parse_dataset(
        r#"{"recipes": [
            {"id": 1, "title": "Chocolate Cake", "category": "Dessert", "cookingTime": 45,
             "servings": 8, "ingredients": ["flour", "cocoa"], "instructions": ["Bake"]},
            {"id": 2, "title": "Salad", "category": "Vegan", "cookingTime": 10,
             "servings": 2, "ingredients": ["lettuce", "tomato"], "instructions": ["Toss"]}
        ]}"#,
    )
    .unwrap()
}

fn draft(title: &str) -> RecipeDraft {
    RecipeDraft {
        title: title.to_string(),
        image: String::new(),
        category: "Snack".to_string(),
        cooking_time: "5".to_string(),
        servings: "1".to_string(),
        ingredients: "bread\ncheese".to_string(),
        instructions: "Assemble\nGrill".to_string(),
    }
}

fn stored_titles(storage: &impl KeyValueStorage, key: &str) -> Vec<String> {
    load_json::<Vec<Recipe>>(storage, key)
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.title)
        .collect()
}

#[test]
fn search_for_choc_finds_only_the_cake() {
    let catalog = Catalog::initialize(bundled(), MemoryStorage::new());
    let hits = catalog.filter("choc", &CategoryFilter::parse("all"));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Chocolate Cake");
}

#[test]
fn storage_holds_exactly_the_surviving_custom_recipes() {
    let mut catalog = Catalog::initialize(bundled(), MemoryStorage::new());
    let keep = catalog.add_recipe(&draft("Toastie")).unwrap().id.clone();
    let nachos = catalog.add_recipe(&draft("Nachos")).unwrap().id.clone();
    catalog.delete_recipe(&nachos).unwrap();

    let stored: Vec<Recipe> = load_json(catalog.storage(), CUSTOM_RECIPES_KEY).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, keep);
    assert!(stored.iter().all(|r| r.is_custom));
}

#[test]
fn rejected_draft_changes_nothing() {
    let mut catalog = Catalog::initialize(bundled(), MemoryStorage::new());
    let before: Vec<Recipe> = catalog.recipes().to_vec();
    let errors = catalog
        .add_recipe(&RecipeDraft {
            cooking_time: "0".to_string(),
            ..draft("Toastie")
        })
        .unwrap_err();
    assert!(errors.contains(Field::CookingTime));
    assert_eq!(catalog.recipes(), before.as_slice());
}

#[test]
fn deleted_recipes_leave_collection_and_favorites() {
    let mut catalog = Catalog::initialize(bundled(), MemoryStorage::new());
    let ids: Vec<RecipeId> = ["Toastie", "Nachos", "Wrap"]
        .into_iter()
        .map(|title| catalog.add_recipe(&draft(title)).unwrap().id.clone())
        .collect();
    for id in &ids {
        catalog.toggle_favorite(id).unwrap();
    }
    catalog.toggle_favorite(&RecipeId::from("2")).unwrap();

    for id in &ids {
        catalog.delete_recipe(id).unwrap();
        assert!(catalog.recipes().iter().all(|r| &r.id != id));
        assert!(catalog.favorites().iter().all(|r| &r.id != id));
    }
    assert_eq!(stored_titles(catalog.storage(), FAVORITES_KEY), vec!["Salad"]);
}

#[test]
fn custom_ids_stay_unique_across_many_additions() {
    let mut catalog = Catalog::initialize(bundled(), MemoryStorage::new());
    for n in 0..50 {
        let recipe = catalog.add_recipe(&draft(&format!("Snack {}", n))).unwrap();
        assert!(recipe.is_custom);
    }
    let ids: HashSet<&RecipeId> = catalog.recipes().iter().map(|r| &r.id).collect();
    assert_eq!(ids.len(), 52);
}

#[test]
fn a_session_restores_from_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recipe_box.db");

    let toastie = {
        let conn = Arc::new(Mutex::new(open_connection(&path).unwrap()));
        let mut catalog = Catalog::initialize(bundled(), SqliteStorage::new(conn, "chat:1"));
        let toastie = catalog.add_recipe(&draft("Toastie")).unwrap().id.clone();
        let nachos = catalog.add_recipe(&draft("Nachos")).unwrap().id.clone();
        catalog.toggle_favorite(&toastie).unwrap();
        catalog.toggle_favorite(&RecipeId::from("1")).unwrap();
        catalog.delete_recipe(&nachos).unwrap();
        toastie
    };

    let conn = Arc::new(Mutex::new(open_connection(&path).unwrap()));
    let catalog = Catalog::initialize(bundled(), SqliteStorage::new(conn, "chat:1"));
    assert_eq!(catalog.recipes().len(), 3);
    assert!(catalog.get(&toastie).is_some_and(|r| r.is_custom));
    assert_eq!(
        catalog
            .favorites()
            .iter()
            .map(|r| r.title.as_str())
            .collect::<Vec<_>>(),
        vec!["Toastie", "Chocolate Cake"]
    );
    assert_eq!(
        stored_titles(catalog.storage(), CUSTOM_RECIPES_KEY),
        vec!["Toastie"]
    );
    assert_eq!(catalog.categories(), vec!["Dessert", "Snack", "Vegan"]);
}

#[test]
fn shipped_dataset_has_searchable_categories() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/recipes.json");
    let catalog = Catalog::initialize(load_dataset(&path).unwrap(), MemoryStorage::new());
    assert!(catalog.categories().contains(&"Dessert".to_string()));
    let desserts = catalog.filter("chocolate", &CategoryFilter::parse("Dessert"));
    assert!(desserts.len() >= 2);
    assert!(desserts.iter().all(|r| r.category() == Some("Dessert")));
}
