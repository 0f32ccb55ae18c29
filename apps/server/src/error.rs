use std::io::Error as IoError;
use std::net::AddrParseError;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use logger::LogError;
use serde_json::json;
use thiserror::Error;
use uptime_service::SchedulerError;
use uptime_service::config;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] AddrParseError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
    #[error("{0}")]
    Scheduler(#[from] SchedulerError),
    #[error("{0}")]
    Logging(#[from] LogError),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_)
            | AppError::Logging(_)
            | AppError::Scheduler(SchedulerError::InvalidUrl { .. } | SchedulerError::IntervalTooLong { .. }) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}
