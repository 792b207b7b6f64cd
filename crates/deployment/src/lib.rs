use anyhow::Error as AnyhowError;
use async_trait::async_trait;
use db::DBService;
use sqlx::Error as SqlxError;
use thiserror::Error;
use utils::config::AppConfig;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

/// Everything a request handler may reach: the database and the settings the
/// process was started with.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &AppConfig;

    fn db(&self) -> &DBService;

    /// Row counts per table, logged once at startup.
    async fn log_inventory(&self) -> Result<(), DeploymentError> {
        let pool = &self.db().pool;
        for table in ["conference", "session", "speaker", "attendee"] {
            let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(pool)
                .await?;
            tracing::info!("{table}: {count} rows");
        }
        Ok(())
    }
}
