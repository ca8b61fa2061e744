// Re-export route modules
pub mod messages;
pub mod wsroute;

use crate::error::AppError;
use crate::metrics::metrics_handler;
use actix_middleware::JwtAuth;
use actix_web::{web, HttpResponse};
use crypto_core::jwt::JwtVerifier;
use std::sync::Arc;

/// Message routes are served under both paths
pub const MESSAGE_PATHS: [&str; 2] = ["/messages", "/api/messages"];

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

pub fn configure(cfg: &mut web::ServiceConfig, verifier: Arc<JwtVerifier>) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .route("/health", web::get().to(health))
    .route("/metrics", web::get().to(metrics_handler))
    .route("/ws", web::get().to(wsroute::ws_handler));

    for path in MESSAGE_PATHS {
        cfg.service(
            web::resource(path)
                .wrap(JwtAuth::new(verifier.clone()))
                .route(web::post().to(messages::send_message))
                .route(web::get().to(messages::get_messages)),
        );
    }
}
