use std::convert::Infallible;
use std::time::Duration;

use actix_web::http::header;
use actix_web::web::Bytes;
use actix_web::{HttpResponse, get, web};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tracing::{debug, warn};
use uptime_service::monitoring::LiveEvent;

use crate::state::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Server-Sent Events stream of probe results.
///
/// Subscribers that fall behind skip the events they missed.
#[get("/events")]
pub async fn status_events(state: web::Data<AppState>) -> HttpResponse {
    let updates = BroadcastStream::new(state.scheduler.subscribe()).filter_map(|received| match received {
        Ok(event) => encode_event(&event).map(Ok::<_, Infallible>),
        Err(e) => {
            debug!("Live subscriber fell behind: {}", e);
            None
        }
    });

    let keep_alive = IntervalStream::new(tokio::time::interval(KEEP_ALIVE_INTERVAL))
        .map(|_| Ok::<_, Infallible>(Bytes::from_static(b": keep-alive\n\n")));

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(updates.merge(keep_alive))
}

fn encode_event(event: &LiveEvent) -> Option<Bytes> {
    match serde_json::to_string(&event.payload) {
        Ok(data) => Some(Bytes::from(format!("event: {}\ndata: {data}\n\n", event.event))),
        Err(e) => {
            warn!("Failed to serialize live event: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use actix_web::body::MessageBody;
    use actix_web::{App, test};

    use crate::routes::routes;
    use crate::testing::test_context;

    #[actix_web::test]
    async fn test_streams_status_updates() {
        let ctx = test_context();
        let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

        let response = test::call_service(&app, test::TestRequest::get().uri("/api/events").to_request()).await;
        assert!(response.status().is_success());
        assert_eq!(response.headers().get("content-type").unwrap(), "text/event-stream");

        ctx.state.scheduler.check_now("https://example.test").await.unwrap();

        let mut body = pin!(response.into_body());
        let frame = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let chunk = poll_fn(|cx| body.as_mut().poll_next(cx)).await.unwrap().unwrap();
                let chunk = String::from_utf8(chunk.to_vec()).unwrap();
                if chunk.starts_with("event:") {
                    return chunk;
                }
            }
        })
        .await
        .unwrap();

        assert!(frame.starts_with("event: status_update\ndata: {"));
        assert!(frame.contains("\"url\":\"https://example.test/\""));
        assert!(frame.ends_with("\n\n"));
    }
}
