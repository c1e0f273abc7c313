use config::{Settings, StoreSettings};
use handlers::recommendations::global_handler;
use log::info;
use models::db::{Database, DatabaseTrait};
use services::cache::SessionCache;
use services::clock::SystemClock;
use services::cronjobs::schedule_jobs;
use services::jsonfile::JsonFileDatabase;
use services::mssql::SqlServerDatabase;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let settings = Settings::from_env()?;
    let addr: SocketAddr = settings.bind_addr.parse()?;

    let backend: Arc<Mutex<dyn DatabaseTrait + Send + Sync>> = match &settings.store {
        StoreSettings::SqlServer(sql) => Arc::new(Mutex::new(
            SqlServerDatabase::new(sql)
                .await
                .map_err(|e| format!("Failed to connect to SQL Server: {}", e))?,
        )),
        StoreSettings::JsonFile(path) => Arc::new(Mutex::new(JsonFileDatabase::new(path))),
    };
    let database = Database::new(backend);

    let cache = Arc::new(SessionCache::new(
        database.clone(),
        Arc::new(SystemClock),
        settings.session.clone(),
        settings.session_lifetime_secs,
    ));
    let _scheduler = schedule_jobs(cache.clone(), &settings.sweep_schedule).await?;

    info!("Serving recommendations on {}", addr);
    let (_, server) = warp::serve(global_handler(cache)).bind_with_graceful_shutdown(addr, async {
        tokio::signal::ctrl_c().await.ok();
    });
    server.await;

    info!("Shutting down");
    database.close().await?;
    Ok(())
}
