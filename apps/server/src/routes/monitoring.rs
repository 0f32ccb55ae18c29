use actix_web::{HttpResponse, get, post, web};
use serde_json::json;

use crate::state::AppState;

#[post("/monitoring/start")]
pub async fn start_monitoring(state: web::Data<AppState>) -> HttpResponse {
    state.scheduler.start_all().await;
    status_response(&state, "Monitoring started").await
}

#[post("/monitoring/stop")]
pub async fn stop_monitoring(state: web::Data<AppState>) -> HttpResponse {
    state.scheduler.stop_all().await;
    status_response(&state, "Monitoring stopped").await
}

#[get("/monitoring/status")]
pub async fn monitoring_status(state: web::Data<AppState>) -> HttpResponse {
    status_response(&state, "Monitoring status").await
}

async fn status_response(state: &AppState, message: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
        "running": state.scheduler.is_running().await,
        "targets": state.scheduler.list_targets().len(),
        "active_loops": state.scheduler.active_loops().await,
    }))
}
