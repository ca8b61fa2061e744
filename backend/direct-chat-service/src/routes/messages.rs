use crate::error::{AppError, AppResult};
use crate::models::UserId;
use crate::services::{RelaySource, SendMessage};
use crate::state::AppState;
use actix_middleware::AuthenticatedUser;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub to: Option<UserId>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// POST /messages
pub async fn send_message(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<SendMessageRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let to = body.to.filter(|to| !to.is_blank());
    let (to, message) = match (to, non_blank(body.message)) {
        (Some(to), Some(message)) => (to, message),
        _ => {
            return Err(AppError::Validation(
                "Recipient and message are required".into(),
            ))
        }
    };
    let sender = UserId::new(user.user_id);

    let stored = if state.config.rest_broadcast {
        let request = SendMessage { to, message, id: None };
        state
            .relay
            .relay_message(&sender, None, request, RelaySource::Rest)
            .await?
            .message
    } else {
        state.store.append(&sender, &to, &message).await?
    };

    tracing::debug!(message_id = %stored.id, %sender, "message stored");
    Ok(HttpResponse::Created().json(stored))
}

/// GET /messages?userId=<peer>
pub async fn get_messages(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> AppResult<HttpResponse> {
    let peer = non_blank(query.into_inner().user_id)
        .map(UserId::new)
        .ok_or_else(|| AppError::Validation("User ID is required".into()))?;
    let me = UserId::new(user.user_id);

    let history = state.store.history(&me, &peer).await?;
    Ok(HttpResponse::Ok().json(history))
}
