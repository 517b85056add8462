use crate::app::config::App;
use crate::error::Result;
use async_trait::async_trait;

/// Lookup contract for application credentials. The array-backed
/// [`MemoryAppManager`](crate::app::memory_app_manager::MemoryAppManager) is
/// the only shipped driver; additional drivers must stay safe under
/// concurrent lookup.
#[async_trait]
pub trait AppManager: Send + Sync {
    async fn init(&self) -> Result<()>;

    async fn get_apps(&self) -> Result<Vec<App>>;

    async fn find_by_id(&self, app_id: &str) -> Result<Option<App>>;

    async fn find_by_key(&self, key: &str) -> Result<Option<App>>;
}
