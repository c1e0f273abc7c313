use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// Sparse item-id -> rating mapping. Absent keys count as 0.
pub type RatingVector = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRatings {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub score: RatingVector,
}

impl UserRatings {
    pub fn new(id: impl Into<String>, score: RatingVector) -> Self {
        UserRatings {
            id: id.into(),
            score,
        }
    }
}

// A job record. Everything besides the id is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

// `[user_id, similarity]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEntry(pub String, pub f64);

// `[item_id, score]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemScoreEntry(pub String, pub f64);

// Payload returned for one user. `jobs` is ordered exactly like `job_score`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub update_time: u64,
    pub similarity: Vec<SimilarityEntry>,
    pub job_score: Vec<ItemScoreEntry>,
    pub jobs: Vec<Item>,
}
