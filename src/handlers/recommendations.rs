use crate::models::error::RecommendError;
use crate::services::cache::SessionCache;
use log::{error, info};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Filter;

#[derive(Debug)]
struct RecommendationFailed(RecommendError);

impl warp::reject::Reject for RecommendationFailed {}

#[derive(Serialize)]
struct ErrorMessage {
    code: u16,
    message: String,
}

pub fn global_handler(
    cache: Arc<SessionCache>,
) -> impl warp::Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
    recommendation_handler(cache).recover(handle_rejection)
}

fn recommendation_handler(
    cache: Arc<SessionCache>,
) -> impl warp::Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("recommend" / String)
        .and(warp::get())
        .and(with_cache(cache))
        .and_then(get_recommendation)
}

fn with_cache(
    cache: Arc<SessionCache>,
) -> impl warp::Filter<Extract = (Arc<SessionCache>,), Error = Infallible> + Clone {
    warp::any().map(move || cache.clone())
}

async fn get_recommendation(
    user_id: String,
    cache: Arc<SessionCache>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let decoded_user_id = percent_decode_str(&user_id)
        .decode_utf8_lossy()
        .to_string();
    info!("Received request for recommendations for user: {}", decoded_user_id);

    match cache.recommend(&decoded_user_id).await {
        Ok(recommendations) => Ok(warp::reply::json(&recommendations)),
        Err(e) => {
            error!("Recommendation for '{}' failed: {}", decoded_user_id, e);
            Err(warp::reject::custom(RecommendationFailed(e)))
        }
    }
}

async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = if let Some(RecommendationFailed(e)) = err.find::<RecommendationFailed>() {
        let code = match e {
            RecommendError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (code, e.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    };

    let body = warp::reply::json(&ErrorMessage {
        code: code.as_u16(),
        message,
    });
    Ok(warp::reply::with_status(body, code))
}
