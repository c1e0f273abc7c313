use crate::models::error::RecommendError;
use crate::models::recommendation::{Item, UserRatings};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait DatabaseTrait: Send {
    async fn list_items(&mut self) -> Result<Vec<Item>, BackendError>;
    async fn list_user_vectors(&mut self) -> Result<Vec<UserRatings>, BackendError>;

    // Both collections as seen by one refresh
    async fn load_snapshot(&mut self) -> Result<(Vec<Item>, Vec<UserRatings>), BackendError> {
        let items = self.list_items().await?;
        let users = self.list_user_vectors().await?;
        Ok((items, users))
    }

    async fn close(&mut self) -> Result<(), BackendError>;
}

#[derive(Clone)]
pub struct Database {
    backend: Arc<Mutex<dyn DatabaseTrait + Send + Sync>>,
}

impl Database {
    pub fn new(backend: Arc<Mutex<dyn DatabaseTrait + Send + Sync>>) -> Self {
        Database { backend }
    }

    pub async fn load_snapshot(&self) -> Result<(Vec<Item>, Vec<UserRatings>), RecommendError> {
        let mut backend = self.backend.lock().await;
        backend.load_snapshot().await.map_err(|e| {
            RecommendError::StoreUnavailable(format!("Error loading jobs and ratings: {}", e))
        })
    }

    pub async fn close(&self) -> Result<(), RecommendError> {
        let mut backend = self.backend.lock().await;
        backend.close().await.map_err(|e| {
            RecommendError::StoreUnavailable(format!("Error closing connection: {}", e))
        })
    }
}
