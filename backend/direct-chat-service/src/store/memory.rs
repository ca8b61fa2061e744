use super::{validate_new_message, MessageStore, StoreError};
use crate::models::{Message, MessageId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    messages: Vec<Message>,
    next_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Process-local message store
///
/// A single mutex serializes writes, so ids are dense and timestamps never
/// go backwards even if the wall clock does. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryMessageStore {
    inner: Mutex<Inner>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(
        &self,
        sender: &UserId,
        receiver: &UserId,
        body: &str,
    ) -> Result<Message, StoreError> {
        validate_new_message(receiver, body)?;

        let mut inner = self.inner.lock().await;
        inner.next_id += 1;

        let now = Utc::now();
        let timestamp = match inner.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        inner.last_timestamp = Some(timestamp);

        let message = Message {
            id: MessageId(inner.next_id),
            sender: sender.clone(),
            receiver: receiver.clone(),
            message: body.to_string(),
            timestamp,
        };
        inner.messages.push(message.clone());

        Ok(message)
    }

    async fn history(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock().await;
        // Insertion order already matches (timestamp, id)
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect())
    }

    async fn find(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.messages.iter().find(|m| m.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_append_assigns_increasing_ids_and_timestamps() {
        let store = InMemoryMessageStore::new();
        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));

        let first = store.append(&alice, &bob, "hello").await.unwrap();
        let second = store.append(&bob, &alice, "hi back").await.unwrap();

        assert!(second.id > first.id);
        assert!(second.timestamp >= first.timestamp);
        assert_eq!(first.sender, alice);
        assert_eq!(first.receiver, bob);
        assert_eq!(first.message, "hello");
    }

    #[tokio::test]
    async fn test_body_is_stored_as_supplied() {
        let store = InMemoryMessageStore::new();
        let msg = store
            .append(&"alice".into(), &"bob".into(), "  padded  ")
            .await
            .unwrap();

        assert_eq!(msg.message, "  padded  ");
    }

    #[tokio::test]
    async fn test_rejected_append_writes_nothing() {
        let store = InMemoryMessageStore::new();

        let err = store
            .append(&"alice".into(), &"bob".into(), "   ")
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_history_is_symmetric_and_isolated() {
        let store = InMemoryMessageStore::new();
        let (alice, bob, carol) = (
            UserId::from("alice"),
            UserId::from("bob"),
            UserId::from("carol"),
        );

        store.append(&alice, &bob, "1").await.unwrap();
        store.append(&carol, &alice, "not for bob").await.unwrap();
        store.append(&bob, &alice, "2").await.unwrap();
        store.append(&alice, &bob, "3").await.unwrap();

        let ab = store.history(&alice, &bob).await.unwrap();
        let ba = store.history(&bob, &alice).await.unwrap();

        assert_eq!(ab, ba);
        let bodies: Vec<&str> = ab.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, vec!["1", "2", "3"]);
        assert!(ab.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_history_empty_for_strangers() {
        let store = InMemoryMessageStore::new();
        store.append(&"alice".into(), &"bob".into(), "hi").await.unwrap();

        let history = store
            .history(&"dave".into(), &"erin".into())
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let store = InMemoryMessageStore::new();
        let msg = store.append(&"alice".into(), &"bob".into(), "hi").await.unwrap();

        assert_eq!(store.find(msg.id).await.unwrap(), Some(msg));
        assert_eq!(store.find(MessageId(999)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_record() {
        let store = Arc::new(InMemoryMessageStore::new());

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append(&"alice".into(), &"bob".into(), &format!("m{i}"))
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let history = store.history(&"bob".into(), &"alice".into()).await.unwrap();
        assert_eq!(history.len(), 32);
        assert!(history.windows(2).all(|w| w[0].id < w[1].id));
    }
}
