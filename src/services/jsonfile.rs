use crate::models::db::{BackendError, DatabaseTrait};
use crate::models::recommendation::{Item, UserRatings};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;

// { "job": [...], "recommend": [...] }
#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    job: Vec<Item>,
    #[serde(default)]
    recommend: Vec<UserRatings>,
}

// The file is re-read on every refresh so edits show up without a restart
pub struct JsonFileDatabase {
    path: PathBuf,
    reads: usize,
}

impl JsonFileDatabase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileDatabase {
            path: path.into(),
            reads: 0,
        }
    }

    async fn load(&mut self) -> Result<Snapshot, BackendError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| format!("{}: {}", self.path.display(), e))?;
        self.reads += 1;
        debug!("Read {} ({} reads so far)", self.path.display(), self.reads);
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        if let Some(user) = snapshot
            .recommend
            .iter()
            .find(|user| user.score.values().any(|v| *v < 0.0))
        {
            return Err(format!("user '{}' has a negative score", user.id).into());
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl DatabaseTrait for JsonFileDatabase {
    async fn list_items(&mut self) -> Result<Vec<Item>, BackendError> {
        Ok(self.load().await?.job)
    }

    async fn list_user_vectors(&mut self) -> Result<Vec<UserRatings>, BackendError> {
        Ok(self.load().await?.recommend)
    }

    async fn load_snapshot(&mut self) -> Result<(Vec<Item>, Vec<UserRatings>), BackendError> {
        let snapshot = self.load().await?;
        Ok((snapshot.job, snapshot.recommend))
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db::Database;
    use crate::models::error::RecommendError;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "job_recommender_{}_{}.json",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn database(path: PathBuf) -> Database {
        Database::new(Arc::new(Mutex::new(JsonFileDatabase::new(path))))
    }

    #[tokio::test]
    async fn reads_both_collections() {
        let path = temp_file(
            "reads",
            r#"{
                "job": [{"_id": "A", "title": "Welder"}, {"_id": "B"}],
                "recommend": [{"_id": "u1", "score": {"A": 5, "B": 1}}]
            }"#,
        );
        let db = database(path.clone());

        let (items, users) = db.load_snapshot().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].fields["title"], "Welder");
        assert_eq!(users[0].id, "u1");
        assert_eq!(users[0].score["A"], 5.0);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn picks_up_edits_between_refreshes() {
        let path = temp_file("edits", r#"{"job": [{"_id": "A"}]}"#);
        let db = database(path.clone());
        assert_eq!(db.load_snapshot().await.unwrap().0.len(), 1);

        std::fs::write(&path, r#"{"job": [{"_id": "A"}, {"_id": "B"}]}"#).unwrap();
        assert_eq!(db.load_snapshot().await.unwrap().0.len(), 2);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn snapshot_comes_from_a_single_read() {
        let path = temp_file(
            "single",
            r#"{"job": [{"_id": "A"}], "recommend": [{"_id": "u1", "score": {"A": 1}}]}"#,
        );
        let mut store = JsonFileDatabase::new(path.clone());

        let (items, users) = store.load_snapshot().await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(users.len(), 1);
        assert_eq!(store.reads, 1);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn missing_file_is_a_store_failure() {
        let db = database(std::env::temp_dir().join("job_recommender_does_not_exist.json"));
        let err = db.load_snapshot().await.unwrap_err();
        assert!(matches!(err, RecommendError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn negative_scores_are_rejected() {
        let path = temp_file("negative", r#"{"recommend": [{"_id": "u1", "score": {"A": -1}}]}"#);
        let db = database(path.clone());
        assert!(db.load_snapshot().await.is_err());
        std::fs::remove_file(path).ok();
    }
}
