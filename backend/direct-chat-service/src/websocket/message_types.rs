use crate::models::{Message, MessageId, UserId};
use crate::websocket::SessionId;
use serde::{Deserialize, Serialize};

/// Inbound WebSocket events from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    /// Send a message to `to`
    ///
    /// With `id`, the message was already persisted through REST and is
    /// broadcast as stored; `message` is then ignored.
    #[serde(rename = "chat-message")]
    ChatMessage {
        #[serde(default)]
        to: UserId,
        #[serde(default)]
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<MessageId>,
    },

    /// Close this session
    #[serde(rename = "logout")]
    Logout,
}

/// Outbound WebSocket events from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsOutboundEvent {
    /// A persisted message, as stored
    #[serde(rename = "chat-message")]
    ChatMessage(Message),

    /// Handshake accepted
    #[serde(rename = "connected")]
    Connected {
        user_id: UserId,
        session_id: SessionId,
    },

    /// Failure of the last inbound event on this connection only
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl WsOutboundEvent {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        WsOutboundEvent::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
