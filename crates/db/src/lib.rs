use std::str::FromStr;

use sqlx::{
    Error, Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub mod graph;
pub mod models;
pub mod pagination;
pub mod repositories;

#[cfg(test)]
pub(crate) mod test_utils;

#[derive(Clone)]
pub struct DBService {
    pub pool: Pool<Sqlite>,
}

impl DBService {
    /// Opens (or creates) the database at `database_url` and applies pending
    /// migrations.
    pub async fn new_with_url(database_url: &str) -> Result<DBService, Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!("Database ready at {}", database_url);
        Ok(DBService { pool })
    }

    /// Private in-memory database; every call yields an empty, migrated schema.
    ///
    /// A single connection that never expires keeps the database alive for
    /// the lifetime of the pool.
    pub async fn new_in_memory() -> Result<DBService, Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(DBService { pool })
    }
}
