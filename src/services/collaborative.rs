use crate::models::error::RecommendError;
use crate::models::recommendation::{Item, ItemScoreEntry, RatingVector, SimilarityEntry, UserRatings};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;

// Neighbors must be strictly more similar than this.
pub const SIMILARITY_THRESHOLD: f64 = 0.3;

const NORMALIZATION_EXPONENT: f64 = 0.75;

// v^0.75 / max(v^0.75); empty and all-zero vectors come back unchanged
pub fn normalize(vector: &RatingVector) -> RatingVector {
    let max_value = vector.values().cloned().fold(0.0_f64, f64::max);
    if max_value == 0.0 {
        return vector.clone();
    }
    let max_value = max_value.powf(NORMALIZATION_EXPONENT);
    vector
        .iter()
        .map(|(key, value)| (key.clone(), value.powf(NORMALIZATION_EXPONENT) / max_value))
        .collect()
}

pub fn similarity(a: &RatingVector, b: &RatingVector) -> f64 {
    // Only keys present in both contribute to the dot product.
    let (small, large) = if a.len() > b.len() { (b, a) } else { (a, b) };

    let small_sq: f64 = small.values().map(|v| v * v).sum();
    let large_sq: f64 = large.values().map(|v| v * v).sum();
    let dot: f64 = small
        .iter()
        .map(|(key, v)| v * large.get(key).copied().unwrap_or(0.0))
        .sum();

    if dot == 0.0 || small_sq == 0.0 || large_sq == 0.0 {
        return 0.0;
    }
    // Proportional vectors can round a hair above 1.
    (dot / (small_sq * large_sq).sqrt()).min(1.0)
}

fn descending<T>(score: impl Fn(&T) -> f64) -> impl Fn(&T, &T) -> Ordering {
    move |a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal)
}

// Ties keep roster order. The target itself is a candidate unless `exclude_self`.
pub fn k_similar_users(
    target: &UserRatings,
    roster: &[UserRatings],
    max_k: usize,
    exclude_self: bool,
) -> Vec<SimilarityEntry> {
    let mut neighbors: Vec<SimilarityEntry> = roster
        .par_iter()
        .filter(|user| !(exclude_self && user.id == target.id))
        .map(|user| SimilarityEntry(user.id.clone(), similarity(&target.score, &user.score)))
        .filter(|entry| entry.1 > SIMILARITY_THRESHOLD)
        .collect();

    neighbors.sort_by(descending(|entry: &SimilarityEntry| entry.1));
    neighbors.truncate(max_k);
    neighbors
}

// Mean neighbor rating per item, ties keep `item_keys` order
pub fn n_highest_score_items(
    neighbors: &[SimilarityEntry],
    roster: &[UserRatings],
    item_keys: &[String],
    max_n: usize,
) -> Vec<ItemScoreEntry> {
    let by_id: HashMap<&str, &RatingVector> = roster
        .iter()
        .map(|user| (user.id.as_str(), &user.score))
        .collect();
    let neighbor_scores: Vec<&RatingVector> = neighbors
        .iter()
        .filter_map(|SimilarityEntry(id, _)| by_id.get(id.as_str()).copied())
        .collect();
    let k = neighbor_scores.len();

    let mut scores: Vec<ItemScoreEntry> = item_keys
        .iter()
        .map(|key| {
            let mut score: f64 = neighbor_scores
                .iter()
                .map(|ratings| ratings.get(key).copied().unwrap_or(0.0))
                .sum();
            if k != 0 {
                score /= k as f64;
            }
            ItemScoreEntry(key.clone(), score)
        })
        .collect();

    scores.sort_by(descending(|entry: &ItemScoreEntry| entry.1));
    scores.truncate(max_n);
    scores
}

pub fn resolve_items(
    scores: &[ItemScoreEntry],
    items: &HashMap<String, Item>,
) -> Result<Vec<Item>, RecommendError> {
    scores
        .iter()
        .map(|ItemScoreEntry(id, _)| {
            items
                .get(id)
                .cloned()
                .ok_or_else(|| RecommendError::DataInconsistency { item_id: id.clone() })
        })
        .collect()
}
