use actix_web::{http::header, HttpRequest};
use crypto_core::jwt::bearer_token;

/// Token presented on a realtime handshake
///
/// Browsers cannot set headers on a WebSocket upgrade, so the `token` query
/// parameter wins; `Authorization: Bearer` is the fallback for other clients.
pub fn handshake_token<'a>(req: &'a HttpRequest, query_token: Option<&'a str>) -> Option<&'a str> {
    query_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            bearer_token(
                req.headers()
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok()),
            )
        })
}
