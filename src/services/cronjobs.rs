use crate::services::cache::SessionCache;
use log::info;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

pub async fn schedule_jobs(
    cache: Arc<SessionCache>,
    schedule: &str,
) -> Result<JobScheduler, Box<dyn std::error::Error>> {
    let sched = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _l| {
        let cache = cache.clone();
        Box::pin(async move {
            let evicted = cache.sweep_expired().await;
            info!(
                "Session sweep evicted {} entries, {} remaining, {} created since start",
                evicted,
                cache.len().await,
                cache.sessions_created()
            );
        })
    })?;

    sched.add(job).await?;
    sched.start().await?;

    Ok(sched)
}
