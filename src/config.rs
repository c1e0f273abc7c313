use crate::models::error::RecommendError;
use crate::services::session::SessionConfig;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct SqlServerSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub table_job: String,
    pub table_score: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreSettings {
    SqlServer(SqlServerSettings),
    JsonFile(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind_addr: String,
    pub store: StoreSettings,
    pub session: SessionConfig,
    pub session_lifetime_secs: u64,
    pub sweep_schedule: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, RecommendError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, RecommendError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = SessionConfig::default();

        let db_type = env.required("DB_TYPE")?;
        let store = match db_type.as_str() {
            "sqlserver" => StoreSettings::SqlServer(SqlServerSettings {
                host: env.required("DB_HOST")?,
                port: env.parsed("DB_PORT", 1433)?,
                username: env.required("DB_USERNAME")?,
                password: env.required("DB_PASSWORD")?,
                database: env.required("DB_NAME")?,
                table_job: env.or("TABLE_JOB", "JOB"),
                table_score: env.or("TABLE_SCORE", "RECOMMEND"),
            }),
            "json" => StoreSettings::JsonFile(env.or("JSON_STORE_PATH", "./data/store.json")),
            _ => {
                return Err(RecommendError::Config(format!(
                    "Unsupported DB_TYPE: '{}'",
                    db_type
                )))
            }
        };

        let shuffle_seed = match env.get("RECOMMEND_SHUFFLE_SEED") {
            Some(raw) => Some(parse("RECOMMEND_SHUFFLE_SEED", &raw)?),
            None => None,
        };

        Ok(Settings {
            bind_addr: env.or("BIND_ADDR", "0.0.0.0:8000"),
            store,
            session: SessionConfig {
                max_k: env.parsed("RECOMMEND_MAX_K", defaults.max_k)?,
                max_n: env.parsed("RECOMMEND_MAX_N", defaults.max_n)?,
                refresh_ttl_secs: env
                    .parsed("RECOMMEND_REFRESH_TTL_SECS", defaults.refresh_ttl_secs)?,
                exclude_self: env.parsed("RECOMMEND_EXCLUDE_SELF", defaults.exclude_self)?,
                shuffle_seed,
            },
            session_lifetime_secs: env.parsed("SESSION_LIFETIME_SECS", 3600)?,
            sweep_schedule: env.or("SWEEP_SCHEDULE", "0 */5 * * * *"),
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, RecommendError> {
        self.get(key)
            .ok_or_else(|| RecommendError::Config(format!("{} is not set", key)))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T, RecommendError> {
        match self.get(key) {
            Some(raw) => parse(key, &raw),
            None => Ok(default),
        }
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, RecommendError> {
    raw.trim()
        .parse()
        .map_err(|_| RecommendError::Config(format!("{} has an invalid value: '{}'", key, raw)))
}
