use actix_web::{HttpResponse, Responder, get};

/// Health check route
/// This route returns no content, the response status is enough.
#[get("/health")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};

    use super::*;

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(App::new().service(health_route)).await;
        let response = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;

        assert!(response.status().is_success());
    }
}
