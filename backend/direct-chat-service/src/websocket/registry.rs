use crate::metrics::ACTIVE_SESSIONS;
use crate::models::UserId;
use crate::websocket::WsOutboundEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

/// Unique identifier for one realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Routing handle for a live session
///
/// Cheap to clone. Sending through a handle whose connection has gone away
/// is a silent no-op.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub user_id: UserId,
    pub established_at: DateTime<Utc>,
    sender: UnboundedSender<WsOutboundEvent>,
}

impl SessionHandle {
    /// Create a handle plus the receiving end the connection drains
    pub fn open(user_id: UserId) -> (Self, UnboundedReceiver<WsOutboundEvent>) {
        let (tx, rx) = unbounded_channel();
        let handle = Self {
            id: SessionId::new(),
            user_id,
            established_at: Utc::now(),
            sender: tx,
        };
        (handle, rx)
    }

    /// Queue an event for this session; false if the connection is gone
    pub fn deliver(&self, event: WsOutboundEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

#[derive(Default)]
struct Inner {
    by_user: HashMap<UserId, HashMap<SessionId, SessionHandle>>,
    owners: HashMap<SessionId, UserId>,
}

impl Inner {
    fn detach(&mut self, id: SessionId) -> Option<SessionHandle> {
        let owner = self.owners.remove(&id)?;
        let sessions = self.by_user.get_mut(&owner)?;
        let handle = sessions.remove(&id);
        if sessions.is_empty() {
            self.by_user.remove(&owner);
        }
        handle
    }
}

/// Live sessions per user
///
/// Both maps sit behind one lock so every operation is a single atomic
/// step. Each handle is filed under exactly one user; a user with no
/// sessions has no entry.
#[derive(Default, Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session; registering the same session id again replaces it
    pub async fn register(&self, handle: SessionHandle) {
        let mut guard = self.inner.write().await;

        guard.detach(handle.id);
        guard.owners.insert(handle.id, handle.user_id.clone());

        let user_id = handle.user_id.clone();
        let session_id = handle.id;
        let sessions = guard.by_user.entry(user_id.clone()).or_default();
        sessions.insert(session_id, handle);
        let user_sessions = sessions.len();

        ACTIVE_SESSIONS.set(guard.owners.len() as i64);
        tracing::debug!(
            %user_id,
            %session_id,
            user_sessions,
            "registered session"
        );
    }

    /// Remove a session; unknown ids are ignored
    pub async fn unregister(&self, session_id: SessionId) -> Option<SessionHandle> {
        let mut guard = self.inner.write().await;
        let removed = guard.detach(session_id);

        if let Some(handle) = &removed {
            ACTIVE_SESSIONS.set(guard.owners.len() as i64);
            tracing::debug!(
                user_id = %handle.user_id,
                %session_id,
                "unregistered session"
            );
        }
        removed
    }

    /// Snapshot of the user's live sessions
    pub async fn sessions_for(&self, user_id: &UserId) -> Vec<SessionHandle> {
        let guard = self.inner.read().await;
        guard
            .by_user
            .get(user_id)
            .map(|sessions| sessions.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn is_registered(&self, session_id: SessionId) -> bool {
        self.inner.read().await.owners.contains_key(&session_id)
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.owners.len()
    }

    pub async fn user_count(&self) -> usize {
        self.inner.read().await.by_user.len()
    }
}
