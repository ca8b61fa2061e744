//! # Relay
//!
//! Persists a direct message and fans the stored record out to every live
//! session of both participants.
//!
//! ## Ordering
//!
//! Persistence and fan-out for one conversation happen under a per-pair lane
//! lock, so every recipient session observes messages of that pair in the
//! order they were stored. Different pairs never wait on each other.

use crate::metrics::{DELIVERIES, MESSAGES_RELAYED, RELAY_ERRORS};
use crate::models::{Message, MessageId, UserId};
use crate::store::{MessageStore, StoreError};
use crate::websocket::{SessionId, SessionRegistry, WsOutboundEvent};
use error_types::error_codes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),

    #[error("message {0} does not exist")]
    NotFound(MessageId),

    #[error("message store unavailable: {0}")]
    StoreUnavailable(String),
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => error_codes::VALIDATION_ERROR,
            RelayError::NotFound(_) => error_codes::MESSAGE_NOT_FOUND,
            RelayError::StoreUnavailable(_) => error_codes::STORE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for RelayError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(msg) => RelayError::Validation(msg),
            StoreError::Unavailable(msg) => RelayError::StoreUnavailable(msg),
        }
    }
}

/// Where a relayed message came from, for metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaySource {
    Realtime,
    Rest,
}

impl RelaySource {
    fn as_label(self) -> &'static str {
        match self {
            RelaySource::Realtime => "realtime",
            RelaySource::Rest => "rest",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendMessage {
    pub to: UserId,
    pub message: String,
    /// Id of a record already persisted through REST
    pub id: Option<MessageId>,
}

#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Deliver the record back to the connection that sent it
    pub echo_to_origin: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            echo_to_origin: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub message: Message,
    /// Sessions the record was queued to
    pub delivered: usize,
}

type Lane = Arc<Mutex<()>>;

#[derive(Clone)]
pub struct Relay {
    store: Arc<dyn MessageStore>,
    registry: SessionRegistry,
    options: RelayOptions,
    lanes: Arc<Mutex<HashMap<(UserId, UserId), Lane>>>,
}

impl Relay {
    pub fn new(store: Arc<dyn MessageStore>, registry: SessionRegistry, options: RelayOptions) -> Self {
        Self {
            store,
            registry,
            options,
            lanes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Persist (or look up) a message from `sender` and broadcast it
    ///
    /// `origin` is the sending connection, if any. Failures leave the store
    /// and every session untouched.
    pub async fn relay_message(
        &self,
        sender: &UserId,
        origin: Option<SessionId>,
        request: SendMessage,
        source: RelaySource,
    ) -> Result<DeliveryReport, RelayError> {
        let result = self.relay_inner(sender, origin, request).await;

        match &result {
            Ok(report) => {
                MESSAGES_RELAYED.with_label_values(&[source.as_label()]).inc();
                tracing::debug!(
                    message_id = %report.message.id,
                    sender = %report.message.sender,
                    receiver = %report.message.receiver,
                    delivered = report.delivered,
                    "relayed message"
                );
            }
            Err(e) => {
                RELAY_ERRORS.with_label_values(&[e.code()]).inc();
                tracing::warn!(%sender, error = %e, "relay failed");
            }
        }
        result
    }

    async fn relay_inner(
        &self,
        sender: &UserId,
        origin: Option<SessionId>,
        request: SendMessage,
    ) -> Result<DeliveryReport, RelayError> {
        if request.to.is_blank() {
            return Err(RelayError::Validation("Recipient is required".into()));
        }

        let lane = self.lane(sender, &request.to).await;
        let _ordered = lane.lock().await;

        let message = match request.id {
            None => {
                self.store
                    .append(sender, &request.to, &request.message)
                    .await?
            }
            Some(id) => {
                let stored = self
                    .store
                    .find(id)
                    .await?
                    .ok_or(RelayError::NotFound(id))?;
                if &stored.sender != sender || stored.receiver != request.to {
                    return Err(RelayError::Validation(format!(
                        "message {id} was not sent by {sender} to {}",
                        request.to
                    )));
                }
                stored
            }
        };

        let skip = origin.filter(|_| !self.options.echo_to_origin);
        let delivered = self.broadcast(&message, skip).await;

        Ok(DeliveryReport { message, delivered })
    }

    /// Queue `message` once to each session of its sender and receiver
    ///
    /// Returns how many sessions accepted it. Sessions whose connection is
    /// already gone are skipped.
    pub async fn broadcast(&self, message: &Message, skip: Option<SessionId>) -> usize {
        let mut targets = self.registry.sessions_for(&message.receiver).await;
        if message.sender != message.receiver {
            targets.extend(self.registry.sessions_for(&message.sender).await);
        }

        let mut seen = HashSet::new();
        let mut delivered = 0;
        for session in targets {
            if Some(session.id) == skip || !seen.insert(session.id) {
                continue;
            }
            if session.deliver(WsOutboundEvent::ChatMessage(message.clone())) {
                delivered += 1;
            }
        }

        DELIVERIES.inc_by(delivered as u64);
        delivered
    }

    async fn lane(&self, a: &UserId, b: &UserId) -> Lane {
        let key = if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };

        let mut lanes = self.lanes.lock().await;
        // Idle lanes are only referenced by the table
        lanes.retain(|_, lane| Arc::strong_count(lane) > 1);
        lanes.entry(key).or_default().clone()
    }
}
