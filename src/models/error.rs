#[derive(Debug, Clone, PartialEq)]
pub enum RecommendError {
    StoreUnavailable(String),
    DataInconsistency { item_id: String },
    Config(String),
}

impl std::fmt::Display for RecommendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecommendError::StoreUnavailable(msg) => write!(f, "Store Unavailable: {}", msg),
            RecommendError::DataInconsistency { item_id } => {
                write!(f, "Data Inconsistency: item '{}' is not in the item set", item_id)
            }
            RecommendError::Config(msg) => write!(f, "Config Error: {}", msg),
        }
    }
}

impl std::error::Error for RecommendError {}
