use dotenv::dotenv;
use std::sync::{Arc, Mutex};
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::{prelude::*, utils::command::BotCommands};

use recipe_box::config::Config;
use recipe_box::dataset::load_dataset;
use recipe_box::shelf::Shelf;
use recipe_box::storage::{open_connection, open_in_memory};

mod bot;
use bot::{Command, State};

#[tokio::main]
async fn main() {
    // Load all env variables from .env file.
    dotenv().ok();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();
    log::info!("Starting recipe box bot...");

    let config = Config::load();

    let bundled = match load_dataset(&config.dataset_path) {
        Ok(recipes) => recipes,
        Err(e) => {
            log::error!("{}; starting without bundled recipes", e);
            Vec::new()
        }
    };

    log::info!("Opening database {}", config.db_path.display());
    let conn = match open_connection(&config.db_path) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!(
                "Failed to open {}: {}; custom recipes will not survive a restart",
                config.db_path.display(),
                e
            );
            match open_in_memory() {
                Ok(conn) => conn,
                Err(e) => panic!("Failed to open SQLite in memory with error {}", e),
            }
        }
    };
    let shelf = Arc::new(Mutex::new(Shelf::new(Arc::new(Mutex::new(conn)), bundled)));

    let bot = Bot::from_env();
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Could not register the command list: {}", e);
    }

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![shelf, InMemStorage::<State>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
