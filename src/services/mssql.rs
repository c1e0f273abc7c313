use crate::config::SqlServerSettings;
use crate::models::db::{BackendError, DatabaseTrait};
use crate::models::recommendation::{Item, UserRatings};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt}; // Required for async compatibility with `tiberius`

type SqlClient = Client<Compat<TcpStream>>;

pub struct SqlServerDatabase {
    settings: SqlServerSettings,
    client: Option<SqlClient>,
}

impl SqlServerDatabase {
    // Connects right away so a bad configuration fails at startup
    pub async fn new(settings: &SqlServerSettings) -> Result<Self, BackendError> {
        let mut db = SqlServerDatabase::disconnected(settings);
        db.client().await?;
        Ok(db)
    }

    pub fn disconnected(settings: &SqlServerSettings) -> Self {
        SqlServerDatabase {
            settings: settings.clone(),
            client: None,
        }
    }

    async fn connect(settings: &SqlServerSettings) -> Result<SqlClient, BackendError> {
        let mut config = Config::new();
        config.host(&settings.host);
        config.port(settings.port);
        config.authentication(AuthMethod::sql_server(
            &settings.username,
            &settings.password,
        ));
        config.database(&settings.database);

        // Accept self-signed certificates
        config.trust_cert();

        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Ok(Client::connect(config, tcp.compat_write()).await?)
    }

    async fn client(&mut self) -> Result<&mut SqlClient, BackendError> {
        if self.client.is_none() {
            info!(
                "Connecting to SQL Server at {}:{}",
                self.settings.host, self.settings.port
            );
            self.client = Some(Self::connect(&self.settings).await?);
        }
        self.client
            .as_mut()
            .ok_or_else(|| "SQL Server connection unavailable".into())
    }

    // A failed query leaves the connection in an unknown state; the next
    // refresh opens a new one.
    fn reset_on_error<T>(&mut self, result: Result<T, BackendError>) -> Result<T, BackendError> {
        if let Err(e) = &result {
            warn!("SQL Server query failed, reconnecting on next use: {}", e);
            self.client = None;
        }
        result
    }

    async fn fetch_items(&mut self) -> Result<Vec<Item>, BackendError> {
        let query = format!(
            "SELECT CAST(ID AS NVARCHAR(255)) AS ID, PAYLOAD FROM dbo.{};",
            self.settings.table_job
        );
        debug!("Query: {}", query);

        let mut result = self.client().await?.query(query, &[]).await?;
        let mut items = Vec::new();

        while let Some(item) = result.try_next().await? {
            if let Some(row) = item.into_row() {
                let id = row.try_get::<&str, _>(0)?;
                let payload = row.try_get::<&str, _>(1)?;
                if let Some(item) = parse_item(id, payload)? {
                    items.push(item);
                }
            }
        }

        Ok(items)
    }

    async fn fetch_user_vectors(&mut self) -> Result<Vec<UserRatings>, BackendError> {
        let query = format!(
            "SELECT CAST(USER_ID AS NVARCHAR(255)) AS USER_ID, \
                    CAST(JOB_ID AS NVARCHAR(255)) AS JOB_ID, \
                    CAST(SCORE AS FLOAT) AS SCORE \
             FROM dbo.{};",
            self.settings.table_score
        );
        debug!("Query: {}", query);

        let mut result = self.client().await?.query(query, &[]).await?;
        let mut ratings = RatingRows::default();

        while let Some(item) = result.try_next().await? {
            if let Some(row) = item.into_row() {
                ratings.push(
                    row.try_get::<&str, _>(0)?,
                    row.try_get::<&str, _>(1)?,
                    row.try_get::<f64, _>(2)?,
                );
            }
        }

        Ok(ratings.users)
    }
}

fn parse_item(id: Option<&str>, payload: Option<&str>) -> Result<Option<Item>, BackendError> {
    let id = match id {
        Some(id) => id,
        None => {
            warn!("Skipping job row with a NULL id");
            return Ok(None);
        }
    };
    let fields: Map<String, Value> = match payload {
        Some(payload) => serde_json::from_str(payload)
            .map_err(|e| format!("job '{}' has an invalid payload: {}", id, e))?,
        None => Map::new(),
    };
    Ok(Some(Item {
        id: id.to_string(),
        fields,
    }))
}

// Groups (user, job, score) rows per user in first-seen order
#[derive(Default)]
struct RatingRows {
    position: HashMap<String, usize>,
    users: Vec<UserRatings>,
}

impl RatingRows {
    fn push(&mut self, user_id: Option<&str>, job_id: Option<&str>, score: Option<f64>) {
        let (user_id, job_id, score) = match (user_id, job_id, score) {
            (Some(user_id), Some(job_id), Some(score)) => (user_id, job_id, score),
            (user_id, job_id, _) => {
                warn!(
                    "Skipping rating row with NULL fields (user {:?}, job {:?})",
                    user_id, job_id
                );
                return;
            }
        };
        if score < 0.0 {
            warn!(
                "Skipping negative score {} for user '{}' on job '{}'",
                score, user_id, job_id
            );
            return;
        }

        let users = &mut self.users;
        let i = *self.position.entry(user_id.to_string()).or_insert_with(|| {
            users.push(UserRatings::new(user_id, Default::default()));
            users.len() - 1
        });
        users[i].score.insert(job_id.to_string(), score);
    }
}

#[async_trait]
impl DatabaseTrait for SqlServerDatabase {
    async fn list_items(&mut self) -> Result<Vec<Item>, BackendError> {
        let result = self.fetch_items().await;
        self.reset_on_error(result)
    }

    async fn list_user_vectors(&mut self) -> Result<Vec<UserRatings>, BackendError> {
        let result = self.fetch_user_vectors().await;
        self.reset_on_error(result)
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn settings(port: u16) -> SqlServerSettings {
        SqlServerSettings {
            host: "127.0.0.1".to_string(),
            port,
            username: "sa".to_string(),
            password: "secret".to_string(),
            database: "employee".to_string(),
            table_job: "JOB".to_string(),
            table_score: "RECOMMEND".to_string(),
        }
    }

    // Accepts connections and hangs up immediately, counting attempts.
    async fn hang_up_server() -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });
        (port, accepted)
    }

    #[tokio::test]
    async fn failed_calls_reconnect_on_the_next_use() {
        let (port, accepted) = hang_up_server().await;
        let mut db = SqlServerDatabase::disconnected(&settings(port));

        assert!(db.list_items().await.is_err());
        assert!(db.client.is_none());
        assert!(db.list_user_vectors().await.is_err());

        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn closed_backend_connects_again() {
        let (port, accepted) = hang_up_server().await;
        let mut db = SqlServerDatabase::disconnected(&settings(port));

        assert!(db.close().await.is_ok());
        assert!(db.load_snapshot().await.is_err());
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_hanging_up_fails_startup() {
        let (port, _) = hang_up_server().await;
        assert!(SqlServerDatabase::new(&settings(port)).await.is_err());
    }

    #[test]
    fn null_ids_and_scores_are_skipped() {
        let mut rows = RatingRows::default();
        rows.push(Some("u1"), Some("A"), Some(5.0));
        rows.push(None, Some("A"), Some(1.0));
        rows.push(Some("u2"), None, Some(1.0));
        rows.push(Some("u2"), Some("B"), None);
        rows.push(Some("u3"), Some("B"), Some(-2.0));
        rows.push(Some("u1"), Some("B"), Some(1.0));

        assert_eq!(rows.users.len(), 1);
        assert_eq!(rows.users[0].id, "u1");
        assert_eq!(rows.users[0].score.len(), 2);
    }

    #[test]
    fn item_rows_need_an_id_and_valid_json() {
        assert_eq!(parse_item(None, Some("{}")).unwrap(), None);

        let item = parse_item(Some("A"), Some(r#"{"title": "Welder"}"#))
            .unwrap()
            .unwrap();
        assert_eq!(item.fields["title"], "Welder");
        assert!(parse_item(Some("B"), None).unwrap().unwrap().fields.is_empty());

        assert!(parse_item(Some("C"), Some("not json")).is_err());
    }
}
