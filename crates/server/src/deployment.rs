use std::sync::Arc;

use db::DBService;
use services::services::{inventory::InventoryService, summary::SummaryService};

use crate::config::ServerConfig;

/// Shared handler state: database, configuration and the long-lived services.
#[derive(Clone)]
pub struct DeploymentImpl {
    db: DBService,
    config: Arc<ServerConfig>,
    summary: SummaryService,
    inventory: InventoryService,
}

impl DeploymentImpl {
    pub fn new(db: DBService, config: ServerConfig) -> Self {
        let summary = SummaryService::new(db.pool.clone(), config.summary_cache_ttl);
        let inventory = InventoryService::new(db.pool.clone(), summary.clone(), config.elevation);
        Self {
            db,
            config: Arc::new(config),
            summary,
            inventory,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn summary(&self) -> &SummaryService {
        &self.summary
    }

    pub fn inventory(&self) -> &InventoryService {
        &self.inventory
    }
}
