use crate::error::{AppError, AppResult};
use crate::middleware::handshake_token;
use crate::models::UserId;
use crate::state::AppState;
use crate::websocket::{SessionHandle, WsSession};
use actix_middleware::request_id;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /ws
///
/// The token is verified before the upgrade; a rejected handshake never
/// creates a session.
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> AppResult<HttpResponse> {
    let request_id = request_id(&req).unwrap_or_default();
    let token = handshake_token(&req, query.token.as_deref());
    let user_id = state.verifier.verify(token).map_err(|e| {
        tracing::warn!(%request_id, error = %e, "WebSocket connection rejected");
        AppError::from(e)
    })?;

    let (handle, outbound) = SessionHandle::open(UserId::new(user_id));
    let session_id = handle.id;
    tracing::debug!(%request_id, %session_id, user_id = %handle.user_id, "WebSocket handshake verified");
    let session = WsSession::new(
        &handle,
        outbound,
        state.registry.clone(),
        state.relay.clone(),
        state.heartbeat(),
    );
    state.registry.register(handle).await;

    match ws::start(session, &req, stream) {
        Ok(response) => Ok(response),
        Err(e) => {
            state.registry.unregister(session_id).await;
            Err(AppError::BadRequest(format!("websocket handshake failed: {e}")))
        }
    }
}
