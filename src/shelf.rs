use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::catalog::Catalog;
use crate::recipe::Recipe;
use crate::storage::SqliteStorage;

/// How many chat catalogs stay loaded before the least recently used one is
/// dropped. Dropped catalogs reload from SQLite on their next use.
pub const DEFAULT_CAPACITY: usize = 256;

struct OpenCatalog {
    catalog: Catalog<SqliteStorage>,
    last_used: u64,
}

/// One catalog per chat. All chats share the bundled recipes and the SQLite
/// connection; each keeps its custom recipes and favorites in its own
/// namespace.
pub struct Shelf {
    conn: Arc<Mutex<Connection>>,
    bundled: Vec<Recipe>,
    catalogs: HashMap<i64, OpenCatalog>,
    capacity: usize,
    clock: u64,
}

impl Shelf {
    pub fn new(conn: Arc<Mutex<Connection>>, bundled: Vec<Recipe>) -> Self {
        Self::with_capacity(conn, bundled, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(
        conn: Arc<Mutex<Connection>>,
        bundled: Vec<Recipe>,
        capacity: usize,
    ) -> Self {
        Self {
            conn,
            bundled,
            catalogs: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    pub fn catalog(&mut self, chat_id: i64) -> &mut Catalog<SqliteStorage> {
        if !self.catalogs.contains_key(&chat_id) && self.catalogs.len() >= self.capacity {
            self.evict_least_recent();
        }
        self.clock += 1;
        let Shelf {
            conn,
            bundled,
            catalogs,
            clock,
            ..
        } = self;
        let open = catalogs.entry(chat_id).or_insert_with(|| {
            let storage = SqliteStorage::new(conn.clone(), namespace(chat_id));
            let mut catalog = Catalog::initialize(bundled.clone(), storage);
            catalog.subscribe(move |event| log::debug!("chat {}: {:?}", chat_id, event));
            OpenCatalog {
                catalog,
                last_used: 0,
            }
        });
        open.last_used = *clock;
        &mut open.catalog
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .catalogs
            .iter()
            .min_by_key(|(_, open)| open.last_used)
            .map(|(&chat_id, _)| chat_id);
        if let Some(open) = oldest.and_then(|chat_id| self.catalogs.remove(&chat_id)) {
            log::debug!(
                "Closing catalog for {}",
                open.catalog.storage().namespace()
            );
        }
    }

    pub fn open_catalogs(&self) -> usize {
        self.catalogs.len()
    }
}

fn namespace(chat_id: i64) -> String {
    format!("chat:{}", chat_id)
}
