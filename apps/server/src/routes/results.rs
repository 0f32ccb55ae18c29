use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;
use serde_json::json;
use uptime_service::monitoring::{CheckOutcome, normalize_url};

use super::required_url;
use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_RESULTS_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    url: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    url: Option<String>,
}

/// Stored results, newest first, optionally for one URL
#[get("/results")]
pub async fn list_results(
    state: web::Data<AppState>,
    query: web::Query<ResultsQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .map(|url| normalize_url(&url))
        .transpose()?;

    let results = state
        .database
        .load_results(url.as_deref(), query.limit.unwrap_or(DEFAULT_RESULTS_LIMIT))
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "results": results })))
}

/// On-demand probe. Answers 429 when the URL was probed too recently.
#[post("/check")]
pub async fn check_url(
    state: web::Data<AppState>,
    body: web::Json<CheckRequest>,
) -> Result<HttpResponse, AppError> {
    let url = required_url(body.into_inner().url)?;

    match state.scheduler.check_now(&url).await? {
        CheckOutcome::Completed(result) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "suppressed": false,
            "result": result,
        }))),
        CheckOutcome::Suppressed => Ok(HttpResponse::TooManyRequests().json(json!({
            "success": false,
            "suppressed": true,
            "message": "URL was checked moments ago, try again shortly",
        }))),
    }
}
