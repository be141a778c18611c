use std::sync::{Arc, Mutex, MutexGuard};
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::*;
use teloxide::types::{InputFile, ParseMode};
use teloxide::{prelude::*, utils::command::BotCommands};
use url::Url;

use recipe_box::catalog::CategoryFilter;
use recipe_box::recipe::{Recipe, RecipeId, DEFAULT_IMAGE};
use recipe_box::render::{self, escape_markdown};
use recipe_box::shelf::Shelf;
use recipe_box::RecipeDraft;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type MyDialogue = Dialogue<State, InMemStorage<State>>;
pub type SharedShelf = Arc<Mutex<Shelf>>;

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "Display this text.")]
    Help,
    #[command(description = "List every recipe.")]
    Recipes,
    #[command(description = "Search titles and ingredients, e.g. /search chocolate")]
    Search(String),
    #[command(description = "List the recipe categories.")]
    Categories,
    #[command(description = "List the recipes of a category, e.g. /browse Dessert")]
    Browse(String),
    #[command(description = "Show a recipe by id.")]
    Show(String),
    #[command(description = "Favorite or unfavorite a recipe by id.")]
    Fav(String),
    #[command(description = "List your favorite recipes.")]
    Favorites,
    #[command(description = "Add a recipe of your own.")]
    Add,
    #[command(description = "Abandon the recipe being added.")]
    Cancel,
    #[command(description = "Delete one of your recipes by id.")]
    Delete(String),
    #[command(description = "Suggest a random recipe.")]
    Random,
    #[command(description = "Suggest another recipe.")]
    Next,
    #[command(description = "Show the suggested recipe in full.")]
    Accept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStep {
    Title,
    Image,
    Category,
    CookingTime,
    Servings,
    Ingredients,
    Instructions,
}

impl DraftStep {
    fn prompt(self) -> &'static str {
        match self {
            DraftStep::Title => "What is the recipe called?",
            DraftStep::Image => "Send an image URL, or - for the default picture.",
            DraftStep::Category => "Which category (e.g. Dessert, Italian, Vegan)? Send - to skip.",
            DraftStep::CookingTime => "How many minutes does it take to cook?",
            DraftStep::Servings => "How many servings does it make?",
            DraftStep::Ingredients => "List the ingredients, one per line.",
            DraftStep::Instructions => "List the steps, one per line.",
        }
    }

    fn next(self) -> Option<DraftStep> {
        match self {
            DraftStep::Title => Some(DraftStep::Image),
            DraftStep::Image => Some(DraftStep::Category),
            DraftStep::Category => Some(DraftStep::CookingTime),
            DraftStep::CookingTime => Some(DraftStep::Servings),
            DraftStep::Servings => Some(DraftStep::Ingredients),
            DraftStep::Ingredients => Some(DraftStep::Instructions),
            DraftStep::Instructions => None,
        }
    }

    fn apply(self, draft: &mut RecipeDraft, text: &str) {
        let optional = || {
            if text.trim() == "-" {
                String::new()
            } else {
                text.to_string()
            }
        };
        match self {
            DraftStep::Title => draft.title = text.to_string(),
            DraftStep::Image => draft.image = optional(),
            DraftStep::Category => draft.category = optional(),
            DraftStep::CookingTime => draft.cooking_time = text.to_string(),
            DraftStep::Servings => draft.servings = text.to_string(),
            DraftStep::Ingredients => draft.ingredients = text.to_string(),
            DraftStep::Instructions => draft.instructions = text.to_string(),
        }
    }
}

#[derive(Clone, Default)]
pub enum State {
    #[default]
    Start,
    Suggesting(Vec<RecipeId>),
    Drafting {
        draft: RecipeDraft,
        step: DraftStep,
    },
}

pub fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    let commands = dptree::entry()
        .filter_command::<Command>()
        .branch(dptree::case![Command::Help].endpoint(help))
        .branch(dptree::case![Command::Recipes].endpoint(list_recipes))
        .branch(dptree::case![Command::Search(query)].endpoint(search))
        .branch(dptree::case![Command::Categories].endpoint(list_categories))
        .branch(dptree::case![Command::Browse(category)].endpoint(browse))
        .branch(dptree::case![Command::Show(id)].endpoint(show))
        .branch(dptree::case![Command::Fav(id)].endpoint(toggle_favorite))
        .branch(dptree::case![Command::Favorites].endpoint(list_favorites))
        .branch(dptree::case![Command::Add].endpoint(start_draft))
        .branch(dptree::case![Command::Cancel].endpoint(cancel))
        .branch(dptree::case![Command::Delete(id)].endpoint(delete))
        .branch(dptree::case![Command::Random].endpoint(start_suggestions))
        .branch(dptree::case![Command::Next].endpoint(send_suggestion))
        .branch(dptree::case![Command::Accept].endpoint(accept_suggestion));

    Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<State>, State>()
        .branch(commands)
        .branch(dptree::case![State::Drafting { draft, step }].endpoint(receive_draft_field))
        .branch(dptree::endpoint(fallback))
}

fn lock(shelf: &SharedShelf) -> Result<MutexGuard<'_, Shelf>, String> {
    shelf.lock().map_err(|e| format!("Shelf lock failed: {}", e))
}

async fn send_markdown(bot: &Bot, chat_id: ChatId, text: String) -> HandlerResult {
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    Ok(())
}

/// Sends the recipe picture, retrying with the default picture when the
/// recipe's own image cannot be delivered. Returns whether any image went
/// through.
async fn send_picture(bot: &Bot, chat_id: ChatId, image: &str, caption: &str) -> bool {
    let mut candidates = vec![image];
    if image != DEFAULT_IMAGE {
        candidates.push(DEFAULT_IMAGE);
    }
    for candidate in candidates {
        let url = match Url::parse(candidate) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Invalid image URL {}: {}", candidate, e);
                continue;
            }
        };
        match bot
            .send_photo(chat_id, InputFile::url(url))
            .caption(caption)
            .parse_mode(ParseMode::MarkdownV2)
            .await
        {
            Ok(_) => return true,
            Err(e) => log::warn!("Failed to send image {}: {}", candidate, e),
        }
    }
    false
}

async fn send_recipe(bot: &Bot, chat_id: ChatId, recipe: &Recipe, favorite: bool) -> HandlerResult {
    let caption = format!("*{}*", render::title(recipe));
    send_picture(bot, chat_id, recipe.image_url(), &caption).await;
    for text in render::detail(recipe, favorite) {
        send_markdown(bot, chat_id, text).await?;
    }
    Ok(())
}

fn usage(command: &str) -> String {
    format!("Usage: /{} <id>\nIds are listed by /recipes and /search", command)
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn list_recipes(bot: Bot, shelf: SharedShelf, msg: Message) -> HandlerResult {
    let text = {
        let mut shelf = lock(&shelf)?;
        let catalog = &*shelf.catalog(msg.chat.id.0);
        let all = catalog.filter("", &CategoryFilter::All);
        render::listing("All Recipes", &all, |r| catalog.is_favorite(&r.id))
    };
    send_markdown(&bot, msg.chat.id, text).await
}

async fn search(bot: Bot, shelf: SharedShelf, msg: Message, query: String) -> HandlerResult {
    let text = {
        let mut shelf = lock(&shelf)?;
        let catalog = &*shelf.catalog(msg.chat.id.0);
        let hits = catalog.filter(&query, &CategoryFilter::All);
        let heading = format!("Results for \"{}\"", query.trim());
        render::listing(&heading, &hits, |r| catalog.is_favorite(&r.id))
    };
    send_markdown(&bot, msg.chat.id, text).await
}

async fn list_categories(bot: Bot, shelf: SharedShelf, msg: Message) -> HandlerResult {
    let categories = lock(&shelf)?.catalog(msg.chat.id.0).categories();
    let text = if categories.is_empty() {
        "No categories yet.".to_string()
    } else {
        format!(
            "Categories:\n{}\n\nUse /browse <category>",
            categories.join("\n")
        )
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn browse(bot: Bot, shelf: SharedShelf, msg: Message, category: String) -> HandlerResult {
    let filter = CategoryFilter::parse(&category);
    let heading = match &filter {
        CategoryFilter::All => "All Recipes".to_string(),
        CategoryFilter::Named(name) => name.clone(),
    };
    let text = {
        let mut shelf = lock(&shelf)?;
        let catalog = &*shelf.catalog(msg.chat.id.0);
        let hits = catalog.filter("", &filter);
        render::listing(&heading, &hits, |r| catalog.is_favorite(&r.id))
    };
    send_markdown(&bot, msg.chat.id, text).await
}

async fn show(bot: Bot, shelf: SharedShelf, msg: Message, id: String) -> HandlerResult {
    if id.trim().is_empty() {
        bot.send_message(msg.chat.id, usage("show")).await?;
        return Ok(());
    }
    let id = RecipeId::from(id.as_str());
    let found = {
        let mut shelf = lock(&shelf)?;
        let catalog = shelf.catalog(msg.chat.id.0);
        catalog
            .get(&id)
            .cloned()
            .map(|recipe| (recipe, catalog.is_favorite(&id)))
    };
    match found {
        Some((recipe, favorite)) => send_recipe(&bot, msg.chat.id, &recipe, favorite).await,
        None => {
            bot.send_message(msg.chat.id, format!("No recipe with id {}", id))
                .await?;
            Ok(())
        }
    }
}

async fn toggle_favorite(bot: Bot, shelf: SharedShelf, msg: Message, id: String) -> HandlerResult {
    if id.trim().is_empty() {
        bot.send_message(msg.chat.id, usage("fav")).await?;
        return Ok(());
    }
    let id = RecipeId::from(id.as_str());
    let reply = {
        let mut shelf = lock(&shelf)?;
        let catalog = shelf.catalog(msg.chat.id.0);
        match catalog.toggle_favorite(&id) {
            Ok(favorite) => {
                let title = catalog.get(&id).map(|r| r.title.clone()).unwrap_or_default();
                if favorite {
                    format!("Added {} to your favorites", title)
                } else {
                    format!("Removed {} from your favorites", title)
                }
            }
            Err(e) => e.to_string(),
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn list_favorites(bot: Bot, shelf: SharedShelf, msg: Message) -> HandlerResult {
    let text = {
        let mut shelf = lock(&shelf)?;
        let favorites = shelf.catalog(msg.chat.id.0).favorites();
        render::listing("Favorites", &favorites, |_| true)
    };
    send_markdown(&bot, msg.chat.id, text).await
}

async fn delete(bot: Bot, shelf: SharedShelf, msg: Message, id: String) -> HandlerResult {
    if id.trim().is_empty() {
        bot.send_message(msg.chat.id, usage("delete")).await?;
        return Ok(());
    }
    let id = RecipeId::from(id.as_str());
    let reply = match lock(&shelf)?.catalog(msg.chat.id.0).delete_recipe(&id) {
        Ok(removed) => format!("Deleted {}", removed.title),
        Err(e) => e.to_string(),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn start_draft(bot: Bot, dialogue: MyDialogue, msg: Message) -> HandlerResult {
    let step = DraftStep::Title;
    dialogue
        .update(State::Drafting {
            draft: RecipeDraft::default(),
            step,
        })
        .await?;
    bot.send_message(
        msg.chat.id,
        format!("Let's add a recipe (/cancel to stop).\n\n{}", step.prompt()),
    )
    .await?;
    Ok(())
}

async fn cancel(bot: Bot, dialogue: MyDialogue, msg: Message, state: State) -> HandlerResult {
    let text = match state {
        State::Drafting { .. } => "Recipe discarded.",
        _ => "Nothing to cancel.",
    };
    dialogue.update(State::Start).await?;
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn receive_draft_field(
    bot: Bot,
    dialogue: MyDialogue,
    shelf: SharedShelf,
    msg: Message,
    (mut draft, step): (RecipeDraft, DraftStep),
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, step.prompt()).await?;
        return Ok(());
    };
    step.apply(&mut draft, text);

    if let Some(next) = step.next() {
        dialogue.update(State::Drafting { draft, step: next }).await?;
        bot.send_message(msg.chat.id, next.prompt()).await?;
        return Ok(());
    }

    dialogue.update(State::Start).await?;
    let added = {
        let mut shelf = lock(&shelf)?;
        shelf
            .catalog(msg.chat.id.0)
            .add_recipe(&draft)
            .cloned()
    };
    match added {
        Ok(recipe) => {
            let saved = format!("Saved\\! Its id is `{}`", escape_markdown(recipe.id.as_str()));
            send_markdown(&bot, msg.chat.id, saved).await?;
            for text in render::detail(&recipe, false) {
                send_markdown(&bot, msg.chat.id, text).await?;
            }
            Ok(())
        }
        Err(errors) => send_markdown(&bot, msg.chat.id, render::validation_report(&errors)).await,
    }
}

/// Ids already suggested in this round, or `None` while a recipe is being
/// added so the draft is not thrown away. `/random` starts a new round.
fn suggested_so_far(state: State, restart: bool) -> Option<Vec<RecipeId>> {
    match state {
        State::Drafting { .. } => None,
        State::Suggesting(ids) if !restart => Some(ids),
        _ => Some(Vec::new()),
    }
}

async fn start_suggestions(
    bot: Bot,
    dialogue: MyDialogue,
    shelf: SharedShelf,
    msg: Message,
    state: State,
) -> HandlerResult {
    suggest(bot, dialogue, shelf, msg, state, true).await
}

async fn send_suggestion(
    bot: Bot,
    dialogue: MyDialogue,
    shelf: SharedShelf,
    msg: Message,
    state: State,
) -> HandlerResult {
    suggest(bot, dialogue, shelf, msg, state, false).await
}

async fn suggest(
    bot: Bot,
    dialogue: MyDialogue,
    shelf: SharedShelf,
    msg: Message,
    state: State,
    restart: bool,
) -> HandlerResult {
    let Some(mut prev_ids) = suggested_so_far(state, restart) else {
        bot.send_message(
            msg.chat.id,
            "Finish the recipe you are adding or /cancel it first",
        )
        .await?;
        return Ok(());
    };
    let picked = {
        let mut shelf = lock(&shelf)?;
        shelf
            .catalog(msg.chat.id.0)
            .random_recipe(&prev_ids, &mut rand::thread_rng())
            .cloned()
    };
    let Some(recipe) = picked else {
        dialogue.update(State::Start).await?;
        bot.send_message(
            msg.chat.id,
            "You circled over all recipes. You can start over with /random",
        )
        .await?;
        return Ok(());
    };

    let caption = format!(
        "*{}* · {} mins\n\n/accept to see the full recipe\n/next for another recipe",
        render::title(&recipe),
        recipe.cooking_time
    );
    if !send_picture(&bot, msg.chat.id, recipe.image_url(), &caption).await {
        send_markdown(&bot, msg.chat.id, caption).await?;
    }
    prev_ids.push(recipe.id);
    dialogue.update(State::Suggesting(prev_ids)).await?;
    Ok(())
}

async fn accept_suggestion(
    bot: Bot,
    dialogue: MyDialogue,
    shelf: SharedShelf,
    msg: Message,
    state: State,
) -> HandlerResult {
    let last = match state {
        State::Suggesting(ids) => ids.last().cloned(),
        _ => None,
    };
    let Some(id) = last else {
        bot.send_message(
            msg.chat.id,
            "To accept you first need a suggestion from /random",
        )
        .await?;
        return Ok(());
    };

    let found = {
        let mut shelf = lock(&shelf)?;
        let catalog = shelf.catalog(msg.chat.id.0);
        catalog
            .get(&id)
            .cloned()
            .map(|recipe| (recipe, catalog.is_favorite(&id)))
    };
    dialogue.update(State::Start).await?;
    match found {
        Some((recipe, favorite)) => send_recipe(&bot, msg.chat.id, &recipe, favorite).await,
        None => {
            bot.send_message(msg.chat.id, "That recipe is gone, try /random again")
                .await?;
            Ok(())
        }
    }
}

async fn fallback(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "I did not understand that. See /help")
        .await?;
    Ok(())
}
