use crate::models::db::Database;
use crate::models::error::RecommendError;
use crate::models::recommendation::{Item, RecommendationResult, UserRatings};
use crate::services::collaborative::{
    k_similar_users, n_highest_score_items, normalize, resolve_items,
};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub max_k: usize,
    pub max_n: usize,
    pub refresh_ttl_secs: u64,
    // Leave the requesting user out of its own neighbor list.
    pub exclude_self: bool,
    // Fixes the item shuffle so tie order is reproducible.
    pub shuffle_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_k: 5,
            max_n: 5,
            refresh_ttl_secs: 60,
            exclude_self: false,
            shuffle_seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Cold,
    Fresh,
    Stale,
}

// Per-user recommendation state, recomputed lazily once it goes stale.
pub struct RecommendationSession {
    uid: String,
    config: SessionConfig,
    store: Database,
    rng: StdRng,
    last_refresh_ms: u64,
    result: RecommendationResult,
}

impl RecommendationSession {
    pub fn new(uid: impl Into<String>, config: SessionConfig, store: Database) -> Self {
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RecommendationSession {
            uid: uid.into(),
            config,
            store,
            rng,
            last_refresh_ms: 0,
            result: RecommendationResult::default(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn state(&self, now_ms: u64) -> SessionState {
        if self.last_refresh_ms == 0 {
            SessionState::Cold
        } else if now_ms.saturating_sub(self.last_refresh_ms)
            > self.config.refresh_ttl_secs.saturating_mul(1000)
        {
            SessionState::Stale
        } else {
            SessionState::Fresh
        }
    }

    pub async fn get(&mut self, now_ms: u64) -> Result<RecommendationResult, RecommendError> {
        match self.state(now_ms) {
            SessionState::Fresh => Ok(self.result.clone()),
            SessionState::Cold | SessionState::Stale => {
                self.refresh(now_ms).await?;
                Ok(self.result.clone())
            }
        }
    }

    // Reloads the store and recomputes. State is only written on success.
    pub async fn refresh(&mut self, now_ms: u64) -> Result<(), RecommendError> {
        let started = Instant::now();
        let (items, users) = self.store.load_snapshot().await?;

        let (mut item_keys, items) = index_items(items);
        item_keys.shuffle(&mut self.rng);

        let mut roster: Vec<UserRatings> = dedup_users(users)
            .into_iter()
            .map(|user| UserRatings {
                score: normalize(&user.score),
                id: user.id,
            })
            .collect();
        let target = match roster.iter().find(|user| user.id == self.uid) {
            Some(user) => user.clone(),
            None => {
                let user = UserRatings::new(self.uid.clone(), Default::default());
                roster.push(user.clone());
                user
            }
        };
        debug!(
            "Loaded {} jobs and {} users for '{}'",
            item_keys.len(),
            roster.len(),
            self.uid
        );

        let similarity =
            k_similar_users(&target, &roster, self.config.max_k, self.config.exclude_self);
        let job_score = n_highest_score_items(&similarity, &roster, &item_keys, self.config.max_n);
        let jobs = resolve_items(&job_score, &items)?;

        self.result = RecommendationResult {
            update_time: now_ms,
            similarity,
            job_score,
            jobs,
        };
        self.last_refresh_ms = now_ms;
        info!(
            "Refreshed recommendations for '{}' in {:.2?}",
            self.uid(),
            started.elapsed()
        );
        Ok(())
    }
}

// Last record wins, first-seen position is kept.
fn index_items(items: Vec<Item>) -> (Vec<String>, HashMap<String, Item>) {
    let mut keys = Vec::with_capacity(items.len());
    let mut by_id = HashMap::with_capacity(items.len());
    for item in items {
        if by_id.insert(item.id.clone(), item.clone()).is_none() {
            keys.push(item.id);
        }
    }
    (keys, by_id)
}

fn dedup_users(users: Vec<UserRatings>) -> Vec<UserRatings> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut roster: Vec<UserRatings> = Vec::with_capacity(users.len());
    for user in users {
        match position.get(&user.id) {
            Some(&i) => roster[i] = user,
            None => {
                position.insert(user.id.clone(), roster.len());
                roster.push(user);
            }
        }
    }
    roster
}
