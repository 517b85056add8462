use crate::app::manager::AppManager;
use crate::app::memory_app_manager::MemoryAppManager;
use crate::error::Result;
use crate::options::{AppManagerConfig, AppManagerDriver};
use std::sync::Arc;
use tracing::info;

pub struct AppManagerFactory;

impl AppManagerFactory {
    pub async fn create(config: &AppManagerConfig) -> Result<Arc<dyn AppManager + Send + Sync>> {
        info!("initializing app manager with driver: {:?}", config.driver);

        match config.driver {
            AppManagerDriver::Array => {
                let manager = MemoryAppManager::with_apps(config.array.clone());
                manager.init().await?;
                Ok(Arc::new(manager))
            }
            AppManagerDriver::Memory => {
                let manager = MemoryAppManager::new();
                manager.init().await?;
                Ok(Arc::new(manager))
            }
        }
    }
}
