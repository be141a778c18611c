//! Telegram MarkdownV2 views of recipes.

use crate::draft::ValidationErrors;
use crate::recipe::Recipe;

/// How many card lines a single listing message shows.
pub const LISTING_LIMIT: usize = 30;

static SPECIAL_CHARACTERS: [char; 19] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL_CHARACTERS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c)
    }
    escaped
}

/// Telegram rejects messages longer than this, counted in UTF-16 units.
pub const MESSAGE_LIMIT: usize = 4096;
/// Longest title shown before it is cut with an ellipsis.
pub const TITLE_CHARS: usize = 200;
/// Longest ingredient or instruction line shown in a detail view.
pub const LINE_CHARS: usize = 500;

fn message_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Cuts `text` to at most `max` characters, marking the cut with `…`.
pub fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

/// Escaped, length-capped title.
pub fn title(recipe: &Recipe) -> String {
    escape_markdown(&clip(&recipe.title, TITLE_CHARS))
}

/// One-line summary: title, cooking time, favorite marker and the id to use
/// with the other commands.
pub fn card_line(recipe: &Recipe, favorite: bool) -> String {
    let star = if favorite { "★ " } else { "" };
    let custom = if recipe.is_custom { " \\(yours\\)" } else { "" };
    format!(
        "{}*{}* · {} mins{}\n`{}`",
        star,
        title(recipe),
        recipe.cooking_time,
        custom,
        escape_markdown(recipe.id.as_str()),
    )
}

pub fn listing(heading: &str, recipes: &[&Recipe], is_favorite: impl Fn(&Recipe) -> bool) -> String {
    let heading = escape_markdown(&clip(heading, TITLE_CHARS));
    if recipes.is_empty() {
        return format!("*{}*\n\nNothing here yet\\.", heading);
    }
    // room for the "…and N more" footer
    let budget = MESSAGE_LIMIT - 80;
    let mut text = format!("*{}* \\({}\\)\n", heading, recipes.len());
    let mut shown = 0;
    for &recipe in recipes.iter().take(LISTING_LIMIT) {
        let card = format!("\n{}\n", card_line(recipe, is_favorite(recipe)));
        if message_len(&text) + message_len(&card) > budget {
            break;
        }
        text.push_str(&card);
        shown += 1;
    }
    if recipes.len() > shown {
        text.push_str(&format!(
            "\n…and {} more, narrow it down with /search",
            recipes.len() - shown
        ));
    }
    text
}

/// Full recipe view, split into as many messages as needed to stay under
/// [`MESSAGE_LIMIT`]. Splits only fall between lines.
pub fn detail(recipe: &Recipe, favorite: bool) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(if favorite {
        format!("*{}* ★", title(recipe))
    } else {
        format!("*{}*", title(recipe))
    });
    lines.push(String::new());
    lines.push(format!("*Servings:* {}", recipe.servings));
    lines.push(format!("*Cooking Time:* {} mins", recipe.cooking_time));
    lines.push(format!(
        "*Category:* {}",
        escape_markdown(&clip(recipe.category().unwrap_or("none"), TITLE_CHARS))
    ));

    lines.push(String::new());
    lines.push("*Ingredients*".to_string());
    for item in &recipe.ingredients {
        lines.push(format!("• {}", escape_markdown(&clip(item, LINE_CHARS))));
    }

    lines.push(String::new());
    lines.push("*Instructions*".to_string());
    for (idx, step) in recipe.instructions.iter().enumerate() {
        lines.push(format!(
            "{}\\. {}",
            idx + 1,
            escape_markdown(&clip(step, LINE_CHARS))
        ));
    }
    pack_lines(&lines)
}

fn pack_lines(lines: &[String]) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();
    for line in lines {
        if !current.is_empty() && message_len(&current) + message_len(line) + 1 > MESSAGE_LIMIT {
            messages.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        messages.push(current);
    }
    messages
}

pub fn validation_report(errors: &ValidationErrors) -> String {
    let mut text = String::from("The recipe was not saved:\n");
    for (field, message) in errors.iter() {
        text.push_str(&format!(
            "\n• _{}_: {}",
            escape_markdown(field.label()),
            escape_markdown(message)
        ));
    }
    text.push_str("\n\nStart over with /add");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::RecipeDraft;
    use crate::recipe::RecipeId;

    fn waffles() -> Recipe {
        Recipe {
            id: RecipeId::from("d1-e2"),
            title: "Mom's waffles (crispy!)".to_string(),
            image: None,
            category: Some("Breakfast".to_string()),
            cooking_time: 25,
            servings: 4,
            ingredients: vec!["2 eggs".to_string(), "1.5 cups flour".to_string()],
            instructions: vec!["Mix".to_string(), "Bake".to_string()],
            is_custom: true,
        }
    }

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(escape_markdown("a_b.c!"), "a\\_b\\.c\\!");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn card_shows_marker_and_id() {
        let line = card_line(&waffles(), true);
        assert!(line.starts_with("★ *Mom's waffles \\(crispy\\!\\)*"));
        assert!(line.contains("25 mins"));
        assert!(line.contains("`d1\\-e2`"));
    }

    #[test]
    fn listing_truncates_long_results() {
        let recipe = waffles();
        let many: Vec<&Recipe> = std::iter::repeat(&recipe).take(LISTING_LIMIT + 5).collect();
        let text = listing("All Recipes", &many, |_| false);
        assert!(text.contains("…and 5 more"));
        assert_eq!(text.matches("25 mins").count(), LISTING_LIMIT);

        let empty = listing("Favorites", &[], |_| false);
        assert!(empty.contains("Nothing here yet"));
    }

    #[test]
    fn detail_numbers_instructions() {
        let messages = detail(&waffles(), false);
        assert_eq!(messages.len(), 1);
        let text = &messages[0];
        assert!(text.contains("*Servings:* 4"));
        assert!(text.contains("• 1\\.5 cups flour"));
        assert!(text.contains("1\\. Mix\n2\\. Bake"));
        assert!(!text.contains('★'));
    }

    #[test]
    fn report_lists_each_field() {
        let errors = RecipeDraft::default().validate().unwrap_err();
        let text = validation_report(&errors);
        assert!(text.contains("_title_: Title is required"));
        assert!(text.contains("_cookingTime_"));
        assert!(text.contains("_instructions_"));
    }

    #[test]
    fn clip_marks_the_cut() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("abcdef", 4), "abc…");
    }

    #[test]
    fn long_titles_stay_within_one_message() {
        let mut long = waffles();
        long.title = "a.".repeat(1500);
        let text = listing("All Recipes", &[&long], |_| true);
        assert!(text.chars().count() <= MESSAGE_LIMIT);
        assert!(text.contains('…'));

        let messages = detail(&long, true);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].chars().count() <= MESSAGE_LIMIT);
    }

    #[test]
    fn listing_stops_before_the_limit() {
        let mut long = waffles();
        long.title = "!".repeat(TITLE_CHARS * 2);
        let many: Vec<&Recipe> = std::iter::repeat(&long).take(LISTING_LIMIT).collect();
        let text = listing("All Recipes", &many, |_| false);
        assert!(message_len(&text) <= MESSAGE_LIMIT);
        let shown = text.matches("25 mins").count();
        assert!(shown > 0 && shown < LISTING_LIMIT);
        assert!(text.contains(&format!("…and {} more", LISTING_LIMIT - shown)));
    }

    #[test]
    fn long_detail_is_split_between_lines() {
        let mut long = waffles();
        long.ingredients = (0..40).map(|n| format!("{} {}", n, "x".repeat(300))).collect();
        let messages = detail(&long, false);
        assert!(messages.len() > 1);
        for message in &messages {
            assert!(message_len(message) <= MESSAGE_LIMIT);
        }
        assert!(messages[0].starts_with("*Mom's waffles"));
        assert!(messages.last().unwrap().contains("2\\. Bake"));
        let joined = messages.concat();
        assert_eq!(joined.matches("• ").count(), 40);
    }
}
