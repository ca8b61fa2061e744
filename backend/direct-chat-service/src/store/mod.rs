//! Message persistence
//!
//! [`MessageStore`] is the seam between the relay/REST layers and storage.
//! `PgMessageStore` is used in deployments; `InMemoryMessageStore` backs
//! local development (no `DATABASE_URL`) and tests.

use crate::models::{Message, MessageId, UserId};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryMessageStore;
pub use postgres::PgMessageStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("message store unavailable: {0}")]
    Unavailable(String),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one message and return the stored record
    async fn append(
        &self,
        sender: &UserId,
        receiver: &UserId,
        body: &str,
    ) -> Result<Message, StoreError>;

    /// All messages exchanged between `a` and `b`, oldest first
    ///
    /// Symmetric in its arguments. An empty vec means no conversation yet.
    async fn history(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>, StoreError>;

    /// Look up one message by id
    async fn find(&self, id: MessageId) -> Result<Option<Message>, StoreError>;
}

/// Checks shared by every backend before anything is written
pub(crate) fn validate_new_message(receiver: &UserId, body: &str) -> Result<(), StoreError> {
    if receiver.is_blank() {
        return Err(StoreError::Validation("Recipient is required".into()));
    }
    if body.trim().is_empty() {
        return Err(StoreError::Validation("Message is required".into()));
    }
    Ok(())
}
