use actix_cors::Cors;
use actix_middleware::{Logging, MetricsMiddleware, RequestId};
use actix_web::{web, App, HttpServer};
use crypto_core::jwt::JwtVerifier;
use direct_chat_service::{
    config::Config,
    db,
    error::AppError,
    logging, routes,
    state::AppState,
    store::{InMemoryMessageStore, MessageStore},
};
use std::sync::Arc;

fn build_cors(allowed_origin: &str) -> Cors {
    let cors = if allowed_origin == "*" {
        Cors::default().allow_any_origin()
    } else {
        Cors::default().allowed_origin(allowed_origin)
    };

    cors.allow_any_method().allow_any_header().max_age(3600)
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();
    let cfg = Arc::new(Config::from_env()?);
    tracing::info!(config = ?cfg, "configuration loaded");

    let verifier = JwtVerifier::from_secret(cfg.jwt_secret.as_bytes())
        .map_err(|e| AppError::Config(format!("JWT verifier: {e}")))?
        .with_leeway(cfg.jwt_leeway_secs);

    let store: Arc<dyn MessageStore> = match &cfg.database_url {
        Some(url) => Arc::new(db::init_store(url, &cfg).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, messages are kept in memory only");
            Arc::new(InMemoryMessageStore::new())
        }
    };

    let state = web::Data::new(AppState::new(cfg.clone(), Arc::new(verifier), store));

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting direct-chat-service");

    HttpServer::new(move || {
        let verifier = state.verifier.clone();

        App::new()
            .wrap(MetricsMiddleware)
            .wrap(Logging)
            .wrap(RequestId::new())
            .wrap(build_cors(&state.config.cors_allowed_origin))
            .app_data(state.clone())
            .configure(move |service_cfg| routes::configure(service_cfg, verifier))
    })
    .bind(&bind_addr)
    .map_err(|e| AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| AppError::StartServer(format!("server: {e}")))
}
