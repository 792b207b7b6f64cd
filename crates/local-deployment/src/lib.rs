use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use utils::config::AppConfig;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<AppConfig>,
    db: DBService,
}

impl LocalDeployment {
    /// Assembles a deployment from an already opened database, e.g. an
    /// in-memory one.
    pub fn from_parts(db: DBService, config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            db,
        }
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = AppConfig::from_env();
        let db = DBService::new_with_url(&config.database_url).await?;
        tracing::info!("Connected to {}", config.database_url);
        Ok(Self::from_parts(db, config))
    }

    fn config(&self) -> &AppConfig {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }
}
