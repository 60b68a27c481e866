use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer};
use tracing::info;
use trail_mcp::McpServer;

async fn mcp_endpoint(server: web::Data<Arc<McpServer>>, body: String) -> HttpResponse {
    match server.handle_message(&body).await {
        Some(response) => HttpResponse::Ok().json(response),
        None => HttpResponse::Accepted().finish(),
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("ok")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/mcp", web::post().to(mcp_endpoint))
        .route("/health", web::get().to(health));
}

/// Serve JSON-RPC over `POST /mcp` until the server is stopped.
pub async fn serve_http(server: Arc<McpServer>, host: &str, port: u16) -> std::io::Result<()> {
    let state = web::Data::new(server);
    info!("Starting HTTP transport on {}:{}", host, port);

    HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind((host, port))?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{json, Value};
    use trail_core::mock::MockCloudTrail;
    use trail_core::StaticClientProvider;

    use crate::app::build_server;
    use crate::config::ServerConfig;

    fn test_server() -> Arc<McpServer> {
        let provider = Arc::new(StaticClientProvider::new(
            Arc::new(MockCloudTrail::new()),
            "us-east-1",
        ));
        build_server(&ServerConfig::default(), provider).unwrap()
    }

    #[actix_web::test]
    async fn health_reports_ok() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_server()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(&body[..], b"ok");
    }

    #[actix_web::test]
    async fn lists_tools_over_http() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_server()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/mcp")
            .set_payload(json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}).to_string())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["id"], 7);
        assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 5);
    }

    #[actix_web::test]
    async fn notifications_are_accepted_without_body() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_server()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/mcp")
            .set_payload(
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
            )
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[actix_web::test]
    async fn malformed_body_is_a_parse_error() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_server()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/mcp")
            .set_payload("{not json")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["error"]["code"], -32700);
    }
}
