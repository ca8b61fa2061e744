use crate::{
    config::Config,
    services::{Relay, RelayOptions},
    store::MessageStore,
    websocket::{session::Heartbeat, SessionRegistry},
};
use crypto_core::jwt::JwtVerifier;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: Arc<JwtVerifier>,
    pub store: Arc<dyn MessageStore>,
    pub registry: SessionRegistry,
    pub relay: Relay,
}

impl AppState {
    /// Wire the shared components; the registry starts empty
    pub fn new(config: Arc<Config>, verifier: Arc<JwtVerifier>, store: Arc<dyn MessageStore>) -> Self {
        let registry = SessionRegistry::new();
        let relay = Relay::new(
            store.clone(),
            registry.clone(),
            RelayOptions {
                echo_to_origin: config.relay_echo_to_origin,
            },
        );

        Self {
            config,
            verifier,
            store,
            registry,
            relay,
        }
    }

    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat {
            interval: self.config.ws_heartbeat_interval,
            client_timeout: self.config.ws_client_timeout,
        }
    }
}
