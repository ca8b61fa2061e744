use super::{validate_new_message, MessageStore, StoreError};
use crate::models::{Message, MessageId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;

/// Idempotent schema applied at startup
///
/// `clock_timestamp()` instead of `now()` so rows inserted inside one
/// transaction still get distinct, advancing timestamps.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id BIGSERIAL PRIMARY KEY,
    sender TEXT NOT NULL,
    receiver TEXT NOT NULL,
    message TEXT NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
);

CREATE INDEX IF NOT EXISTS idx_messages_pair_timestamp
    ON messages (LEAST(sender, receiver), GREATEST(sender, receiver), timestamp, id);
"#;

const COLUMNS: &str = "id, sender, receiver, message, timestamp";

// Filters on the same expressions as idx_messages_pair_timestamp
const HISTORY_FILTER: &str = "LEAST(sender, receiver) = LEAST($1::text, $2::text) \
     AND GREATEST(sender, receiver) = GREATEST($1::text, $2::text)";

/// Postgres-backed message store
#[derive(Clone)]
pub struct PgMessageStore {
    pool: Pool,
}

impl PgMessageStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA).await?;
        tracing::info!("messages schema ready");
        Ok(())
    }
}

fn row_to_message(row: &Row) -> Message {
    Message {
        id: MessageId(row.get("id")),
        sender: UserId::new(row.get::<_, String>("sender")),
        receiver: UserId::new(row.get::<_, String>("receiver")),
        message: row.get("message"),
        timestamp: row.get::<_, DateTime<Utc>>("timestamp"),
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(
        &self,
        sender: &UserId,
        receiver: &UserId,
        body: &str,
    ) -> Result<Message, StoreError> {
        validate_new_message(receiver, body)?;

        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO messages (sender, receiver, message) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );
        let row = client
            .query_one(&sql, &[&sender.as_str(), &receiver.as_str(), &body])
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to insert message");
                StoreError::from(e)
            })?;

        Ok(row_to_message(&row))
    }

    async fn history(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {COLUMNS} FROM messages WHERE {HISTORY_FILTER} ORDER BY timestamp ASC, id ASC"
        );
        let rows = client.query(&sql, &[&a.as_str(), &b.as_str()]).await?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn find(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {COLUMNS} FROM messages WHERE id = $1");
        let row = client.query_opt(&sql, &[&id.0]).await?;

        Ok(row.as_ref().map(row_to_message))
    }
}
