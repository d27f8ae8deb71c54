use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::catalog::{DynCatalogRepository, SqliteCatalogRepository};
use crate::config::Config;
use crate::engagement::{DynRelationStore, SqliteRelationStore};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub catalog: DynCatalogRepository,
    pub relations: DynRelationStore,
}

impl AppState {
    /// Wire the SQLite-backed repositories around one shared pool.
    pub fn new(db: DbPool, config: Config) -> Self {
        Self {
            catalog: Arc::new(SqliteCatalogRepository::new(db.clone())),
            relations: Arc::new(SqliteRelationStore::new(db)),
            config,
        }
    }
}
