use actix_web::{HttpResponse, delete, get, post, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uptime_service::monitoring::{
    AddOutcome, CheckOutcome, DETAILS_HISTORY, SUMMARY_HISTORY, Target, TargetDetails, TargetSummary, normalize_url,
};

use super::required_url;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddUrlRequest {
    url: Option<String>,
    /// Seconds, defaults to the configured interval
    interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    url: Option<String>,
}

/// Every target with its recent pass/fail history
#[get("/urls")]
pub async fn list_urls(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let mut urls = Vec::new();
    for target in state.scheduler.list_targets() {
        let recent = state.database.load_results(Some(&target.url), SUMMARY_HISTORY).await?;
        urls.push(TargetSummary::new(&target, &recent));
    }

    Ok(HttpResponse::Ok().json(json!({ "urls": urls })))
}

/// Add a target or change its interval. A new target is checked right away.
#[post("/urls")]
pub async fn add_url(
    state: web::Data<AppState>,
    body: web::Json<AddUrlRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let url = required_url(request.url)?;
    let interval = request.interval.unwrap_or(state.default_interval);

    let added = state.scheduler.add_target(&url, interval).await?;

    let check = if added.outcome == AddOutcome::Added {
        let outcome = state.scheduler.check_now(&added.url).await?;
        if outcome.is_suppressed() {
            info!(url = %added.url, "Initial check already dispatched by the poll loop");
        }
        Some(outcome)
    } else {
        None
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "URL added successfully",
        "target": added,
        "check": check.as_ref().and_then(CheckOutcome::result),
    })))
}

#[delete("/urls")]
pub async fn remove_url(
    state: web::Data<AppState>,
    query: web::Query<UrlQuery>,
) -> Result<HttpResponse, AppError> {
    let url = required_url(query.into_inner().url)?;

    if state.scheduler.remove_target(&url).await {
        Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "URL removed successfully" })))
    } else {
        Err(AppError::NotFound("URL not found".into()))
    }
}

/// Up to the last 100 results of one URL. Unregistered URLs report the
/// default interval.
#[get("/url-details")]
pub async fn url_details(
    state: web::Data<AppState>,
    query: web::Query<UrlQuery>,
) -> Result<HttpResponse, AppError> {
    let url = required_url(query.into_inner().url)?;

    let target = match state.scheduler.target(&url) {
        Some(target) => target,
        None => Target::new(normalize_url(&url)?, state.default_interval),
    };
    let recent = state.database.load_results(Some(&target.url), DETAILS_HISTORY).await?;

    Ok(HttpResponse::Ok().json(TargetDetails::new(&target, &recent)))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::Value;
    use uptime_service::database::Database;
    use uptime_service::monitoring::ProbeResult;

    use crate::routes::routes;
    use crate::testing::test_context;

    #[actix_web::test]
    async fn test_add_list_and_remove() {
        let ctx = test_context();
        let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

        let request = test::TestRequest::post()
            .uri("/api/urls")
            .set_json(serde_json::json!({ "url": "example.test", "interval": 2 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["target"]["url"], "https://example.test/");
        assert_eq!(body["target"]["interval"], 5);
        assert_eq!(body["target"]["outcome"], "added");
        assert_eq!(body["check"]["status_code"], 200);

        // Flush the initial check to storage, then record a failure after it
        ctx.state.scheduler.shutdown().await;
        ctx.database.persist_result(&ProbeResult::from_response("https://example.test/", 503, 10, 2)).await.unwrap();

        let request = test::TestRequest::get().uri("/api/urls").to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        let urls = body["urls"].as_array().unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0]["status"], "down");
        assert_eq!(urls[0]["history"], serde_json::json!(["down", "up"]));
        assert_eq!(urls[0]["uptime_percentage"], 50);

        let request = test::TestRequest::delete().uri("/api/urls?url=example.test").to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::OK);

        let request = test::TestRequest::delete().uri("/api/urls?url=example.test").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_retune_does_not_check_again() {
        let ctx = test_context();
        let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

        for (interval, outcome) in [(30, "added"), (60, "retuned")] {
            let request = test::TestRequest::post()
                .uri("/api/urls")
                .set_json(serde_json::json!({ "url": "https://example.test", "interval": interval }))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, request).await;
            assert_eq!(body["target"]["outcome"], outcome);
        }

        assert_eq!(ctx.state.scheduler.list_targets()[0].interval, 60);
    }

    #[actix_web::test]
    async fn test_add_rejects_bad_input() {
        let ctx = test_context();
        let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

        for payload in [
            serde_json::json!({}),
            serde_json::json!({ "url": "  " }),
            serde_json::json!({ "url": "ftp://example.test" }),
            serde_json::json!({ "url": "example.test", "interval": 1_000_000 }),
        ] {
            let request = test::TestRequest::post().uri("/api/urls").set_json(&payload).to_request();
            let response = test::call_service(&app, request).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "payload {payload}");
        }
        assert!(ctx.state.scheduler.list_targets().is_empty());
    }

    #[actix_web::test]
    async fn test_url_details() {
        let ctx = test_context();
        let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;
        ctx.state.scheduler.add_target("https://example.test", 45).await.unwrap();
        ctx.database.persist_result(&ProbeResult::unreachable("https://example.test/", 1)).await.unwrap();

        let request = test::TestRequest::get().uri("/api/url-details?url=https://example.test/").to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["interval"], 45);
        assert_eq!(body["uptime_percentage"], 0);
        assert_eq!(body["history"][0]["status_code"], 0);

        let request = test::TestRequest::get().uri("/api/url-details?url=other.test").to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["url"], "https://other.test/");
        assert_eq!(body["interval"], 30);

        let request = test::TestRequest::get().uri("/api/url-details").to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);
    }
}
