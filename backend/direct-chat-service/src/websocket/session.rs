use crate::models::UserId;
use crate::services::{Relay, RelaySource, SendMessage};
use crate::websocket::{SessionHandle, SessionId, SessionRegistry, WsInboundEvent, WsOutboundEvent};
use actix::{
    fut::{ActorFutureExt, WrapFuture},
    Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler,
};
use actix_web_actors::ws;
use error_types::error_codes;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::{wrappers::UnboundedReceiverStream, StreamExt};

/// Lifecycle of one realtime connection
///
/// The handshake is verified in `ws_handler` before any actor exists, so a
/// session starts out `Authenticated`. Events are only processed while
/// `Active`; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    pub interval: Duration,
    pub client_timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(30),
        }
    }
}

// Event routed to this connection by the relay
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct Outbound(WsOutboundEvent);

// WebSocket Actor
pub struct WsSession {
    session_id: SessionId,
    user_id: UserId,
    state: SessionState,
    registry: SessionRegistry,
    relay: Relay,
    outbound: Option<UnboundedReceiver<WsOutboundEvent>>,
    heartbeat: Heartbeat,
    hb: Instant,
}

impl WsSession {
    /// Build the actor for an authenticated, registered session
    pub fn new(
        handle: &SessionHandle,
        outbound: UnboundedReceiver<WsOutboundEvent>,
        registry: SessionRegistry,
        relay: Relay,
        heartbeat: Heartbeat,
    ) -> Self {
        Self {
            session_id: handle.id,
            user_id: handle.user_id.clone(),
            state: SessionState::Authenticated,
            registry,
            relay,
            outbound: Some(outbound),
            heartbeat,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let timeout = self.heartbeat.client_timeout;
        ctx.run_interval(self.heartbeat.interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > timeout {
                tracing::warn!(
                    user_id = %act.user_id,
                    session_id = %act.session_id,
                    "WebSocket heartbeat failed, disconnecting"
                );
                act.state = SessionState::Closed;
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn send_event(&self, ctx: &mut ws::WebsocketContext<Self>, event: &WsOutboundEvent) {
        match serde_json::to_string(event) {
            Ok(text) => ctx.text(text),
            Err(e) => tracing::error!(error = %e, "failed to encode outbound event"),
        }
    }

    fn handle_event(&mut self, event: WsInboundEvent, ctx: &mut ws::WebsocketContext<Self>) {
        match event {
            WsInboundEvent::ChatMessage { to, message, id } => {
                let relay = self.relay.clone();
                let sender = self.user_id.clone();
                let origin = self.session_id;
                let request = SendMessage { to, message, id };

                let fut = async move {
                    relay
                        .relay_message(&sender, Some(origin), request, RelaySource::Realtime)
                        .await
                };

                // Later frames from this connection wait until the relay is done
                ctx.wait(fut.into_actor(self).map(|result, act, ctx| {
                    if let Err(e) = result {
                        act.send_event(ctx, &WsOutboundEvent::error(e.code(), e.to_string()));
                    }
                }));
            }
            WsInboundEvent::Logout => {
                tracing::info!(
                    user_id = %self.user_id,
                    session_id = %self.session_id,
                    "WebSocket logout"
                );
                self.state = SessionState::Closed;
                ctx.close(Some(ws::CloseReason {
                    code: ws::CloseCode::Normal,
                    description: Some("logout".to_string()),
                }));
                ctx.stop();
            }
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.state = SessionState::Active;
        tracing::info!(
            user_id = %self.user_id,
            session_id = %self.session_id,
            "WebSocket session started"
        );

        self.hb(ctx);

        if let Some(rx) = self.outbound.take() {
            ctx.add_message_stream(UnboundedReceiverStream::new(rx).map(Outbound));
        }

        let connected = WsOutboundEvent::Connected {
            user_id: self.user_id.clone(),
            session_id: self.session_id,
        };
        self.send_event(ctx, &connected);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.state = SessionState::Closed;
        tracing::info!(
            user_id = %self.user_id,
            session_id = %self.session_id,
            "WebSocket session stopped"
        );

        // Cleanup: remove session from registry
        let registry = self.registry.clone();
        let session_id = self.session_id;
        actix::spawn(async move {
            registry.unregister(session_id).await;
        });
    }
}

impl Handler<Outbound> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        if self.state == SessionState::Active {
            self.send_event(ctx, &msg.0);
        }
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        if self.state != SessionState::Active {
            return;
        }

        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<WsInboundEvent>(&text) {
                Ok(event) => self.handle_event(event, ctx),
                Err(e) => {
                    tracing::warn!(user_id = %self.user_id, error = %e, "Failed to parse WS message");
                    self.send_event(
                        ctx,
                        &WsOutboundEvent::error(error_codes::INVALID_EVENT, e.to_string()),
                    );
                }
            },
            Ok(ws::Message::Binary(_)) => {
                self.send_event(
                    ctx,
                    &WsOutboundEvent::error(
                        error_codes::INVALID_EVENT,
                        "binary frames are not supported",
                    ),
                );
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!(user_id = %self.user_id, ?reason, "WebSocket close message received");
                self.state = SessionState::Closed;
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, error = %e, "WebSocket protocol error");
                self.state = SessionState::Closed;
                ctx.stop();
            }
        }
    }
}
