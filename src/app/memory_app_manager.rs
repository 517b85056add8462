use crate::app::config::App;
use crate::app::manager::AppManager;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// In-memory app store, seeded from the configuration's app array.
pub struct MemoryAppManager {
    apps: DashMap<String, App>,
}

impl MemoryAppManager {
    pub fn new() -> Self {
        Self {
            apps: DashMap::new(),
        }
    }

    pub fn with_apps(apps: Vec<App>) -> Self {
        let manager = Self::new();
        for app in apps {
            manager.apps.insert(app.id.clone(), app);
        }
        manager
    }
}

impl Default for MemoryAppManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AppManager for MemoryAppManager {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn get_apps(&self) -> Result<Vec<App>> {
        Ok(self.apps.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn find_by_id(&self, app_id: &str) -> Result<Option<App>> {
        Ok(self.apps.get(app_id).map(|entry| entry.value().clone()))
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<App>> {
        Ok(self
            .apps
            .iter()
            .find(|entry| entry.value().key == key)
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_apps() -> Vec<App> {
        vec![App {
            id: "1234".to_string(),
            key: "app-key".to_string(),
            secret: "secret".to_string(),
            enable_client_messages: true,
            max_event_payload_in_kb: Some(1024),
            ..Default::default()
        }]
    }

    #[tokio::test]
    async fn find_by_id_returns_existing_app() {
        let manager = MemoryAppManager::with_apps(sample_apps());
        let app = manager.find_by_id("1234").await.unwrap();
        assert_eq!(app.unwrap().key, "app-key");
    }

    #[tokio::test]
    async fn find_by_id_returns_none_for_unknown_app() {
        let manager = MemoryAppManager::with_apps(sample_apps());
        assert!(manager.find_by_id("invalid").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_key_returns_existing_app() {
        let manager = MemoryAppManager::with_apps(sample_apps());
        let app = manager.find_by_key("app-key").await.unwrap();
        assert_eq!(app.unwrap().id, "1234");
    }

    #[tokio::test]
    async fn find_by_key_returns_none_for_unknown_key() {
        let manager = MemoryAppManager::with_apps(sample_apps());
        assert!(manager.find_by_key("invalid-key").await.unwrap().is_none());
    }
}
