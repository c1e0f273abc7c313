use crate::models::db::{BackendError, Database, DatabaseTrait};
use crate::models::recommendation::{Item, RatingVector, UserRatings};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MemoryData {
    items: Vec<Item>,
    users: Vec<UserRatings>,
    failing: bool,
    item_loads: usize,
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    data: Arc<Mutex<MemoryData>>,
}

pub fn item(id: &str, title: &str) -> Item {
    let mut fields = Map::new();
    fields.insert("title".to_string(), Value::String(title.to_string()));
    Item {
        id: id.to_string(),
        fields,
    }
}

pub fn ratings(pairs: &[(&str, f64)]) -> RatingVector {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

impl MemoryDatabase {
    pub fn new(items: Vec<Item>, users: Vec<UserRatings>) -> Self {
        let db = MemoryDatabase::default();
        {
            let mut data = db.data.lock().unwrap();
            data.items = items;
            data.users = users;
        }
        db
    }

    pub fn database(&self) -> Database {
        Database::new(Arc::new(tokio::sync::Mutex::new(self.clone())))
    }

    pub fn set_user(&self, user: UserRatings) {
        let mut data = self.data.lock().unwrap();
        match data.users.iter().position(|u| u.id == user.id) {
            Some(i) => data.users[i] = user,
            None => data.users.push(user),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.data.lock().unwrap().failing = failing;
    }

    pub fn item_loads(&self) -> usize {
        self.data.lock().unwrap().item_loads
    }
}

#[async_trait]
impl DatabaseTrait for MemoryDatabase {
    async fn list_items(&mut self) -> Result<Vec<Item>, BackendError> {
        let mut data = self.data.lock().unwrap();
        if data.failing {
            return Err("connection refused".into());
        }
        data.item_loads += 1;
        Ok(data.items.clone())
    }

    async fn list_user_vectors(&mut self) -> Result<Vec<UserRatings>, BackendError> {
        let data = self.data.lock().unwrap();
        if data.failing {
            return Err("connection refused".into());
        }
        Ok(data.users.clone())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}
