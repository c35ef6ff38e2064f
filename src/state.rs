use std::path::PathBuf;

use crate::db::{DbPool, OrmConn, orm_from_pool};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(pool: DbPool, upload_dir: PathBuf) -> Self {
        let orm = orm_from_pool(pool.clone());
        Self {
            pool,
            orm,
            upload_dir,
        }
    }
}
