use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetLevelRequest {
    level: Option<String>,
    /// Module path, the whole application when absent
    logger: Option<String>,
}

#[get("/logging/levels")]
pub async fn available_levels(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "levels": state.log_control.levels() }))
}

#[get("/logging/config")]
pub async fn logging_config(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "config": current_config(&state) }))
}

#[post("/logging/set-level")]
pub async fn set_level(
    state: web::Data<AppState>,
    body: web::Json<SetLevelRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let level = request
        .level
        .ok_or_else(|| AppError::BadRequest("Level not specified".into()))?;
    let logger = request.logger.as_deref().filter(|logger| !logger.trim().is_empty());

    state.log_control.set_level(&level, logger)?;

    let scope = logger.map_or_else(|| "the whole application".to_owned(), |logger| format!("logger {logger}"));
    info!("Log level changed to {} for {}", level, scope);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Log level changed to {level} for {scope}"),
        "config": current_config(&state),
    })))
}

fn current_config(state: &AppState) -> Value {
    let config = state.log_control.config();
    json!({
        "global_level": config.global_level,
        "targets": config.targets,
        "other_directives": config.other_directives,
    })
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::Value;

    use crate::routes::routes;
    use crate::testing::test_context;

    #[actix_web::test]
    async fn test_levels() {
        let ctx = test_context();
        let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

        let request = test::TestRequest::get().uri("/api/logging/levels").to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["levels"], serde_json::json!(["trace", "debug", "info", "warn", "error"]));
    }

    #[actix_web::test]
    async fn test_set_level() {
        let ctx = test_context();
        let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

        let request = test::TestRequest::post()
            .uri("/api/logging/set-level")
            .set_json(serde_json::json!({ "level": "warning", "logger": "uptime_service::monitoring" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["config"]["targets"]["uptime_service::monitoring"], "warn");
        assert_eq!(body["config"]["global_level"], "info");

        let request = test::TestRequest::post()
            .uri("/api/logging/set-level")
            .set_json(serde_json::json!({ "level": "debug" }))
            .to_request();
        test::call_service(&app, request).await;

        let request = test::TestRequest::get().uri("/api/logging/config").to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["config"]["global_level"], "debug");
    }

    #[actix_web::test]
    async fn test_set_level_rejects_bad_input() {
        let ctx = test_context();
        let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

        for payload in [serde_json::json!({}), serde_json::json!({ "level": "verbose" })] {
            let request = test::TestRequest::post().uri("/api/logging/set-level").set_json(&payload).to_request();
            let response = test::call_service(&app, request).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "payload {payload}");
        }
    }
}
