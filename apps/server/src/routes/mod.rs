use actix_web::web;

use crate::error::AppError;

mod events;
mod health;
mod logging;
mod monitoring;
mod results;
mod targets;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health_route).service(
        web::scope("/api")
            .service(targets::list_urls)
            .service(targets::add_url)
            .service(targets::remove_url)
            .service(targets::url_details)
            .service(results::list_results)
            .service(results::check_url)
            .service(monitoring::start_monitoring)
            .service(monitoring::stop_monitoring)
            .service(monitoring::monitoring_status)
            .service(events::status_events)
            .service(logging::available_levels)
            .service(logging::logging_config)
            .service(logging::set_level),
    );
}

/// The `url` parameter most routes require
fn required_url(url: Option<String>) -> Result<String, AppError> {
    url.filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("URL not provided".into()))
}
