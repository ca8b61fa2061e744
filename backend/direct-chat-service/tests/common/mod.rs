#![allow(dead_code)]

use actix_web::web;
use async_trait::async_trait;
use crypto_core::jwt::{JwtIssuer, JwtVerifier};
use direct_chat_service::{
    config::Config,
    models::{Message, MessageId, UserId},
    state::AppState,
    store::{InMemoryMessageStore, MessageStore, StoreError},
    websocket::WsOutboundEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub const SECRET: &str = "direct-chat-integration-secret-0123456789";

pub fn config() -> Config {
    Config::with_secret(SECRET)
}

pub fn state_with(config: Config, store: Arc<dyn MessageStore>) -> web::Data<AppState> {
    let verifier = JwtVerifier::from_secret(SECRET.as_bytes()).expect("verifier");
    web::Data::new(AppState::new(Arc::new(config), Arc::new(verifier), store))
}

pub fn state() -> web::Data<AppState> {
    state_with(config(), Arc::new(InMemoryMessageStore::new()))
}

pub fn issuer() -> JwtIssuer {
    JwtIssuer::from_secret(SECRET.as_bytes()).expect("issuer")
}

pub fn token(user_id: &str) -> String {
    issuer().generate_access_token(user_id).expect("token")
}

pub fn bearer(user_id: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token(user_id)))
}

/// Drain every message currently queued for a session
pub fn drain(rx: &mut UnboundedReceiver<WsOutboundEvent>) -> Vec<Message> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let WsOutboundEvent::ChatMessage(message) = event {
            out.push(message);
        }
    }
    out
}

/// Store whose backend is always down
pub struct FailingStore;

#[async_trait]
impl MessageStore for FailingStore {
    async fn append(&self, _: &UserId, _: &UserId, _: &str) -> Result<Message, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn history(&self, _: &UserId, _: &UserId) -> Result<Vec<Message>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn find(&self, _: MessageId) -> Result<Option<Message>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}
