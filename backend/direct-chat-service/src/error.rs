use crate::middleware::error_handling;
use crate::services::RelayError;
use crate::store::StoreError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use crypto_core::jwt::TokenError;
use thiserror::Error;

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AppError::status_code(self)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        error_handling::into_response(self)
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("no token provided")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("message store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::MissingToken => AppError::MissingToken,
            TokenError::InvalidToken(reason) => AppError::InvalidToken(reason),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(msg) => AppError::Validation(msg),
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
        }
    }
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Validation(msg) => AppError::Validation(msg),
            RelayError::NotFound(id) => AppError::NotFound(format!("message {id} does not exist")),
            RelayError::StoreUnavailable(msg) => AppError::StoreUnavailable(msg),
        }
    }
}

impl AppError {
    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => 400,
            AppError::MissingToken | AppError::InvalidToken(_) => 401,
            AppError::NotFound(_) => 404,
            AppError::StoreUnavailable(_)
            | AppError::Config(_)
            | AppError::StartServer(_)
            | AppError::Internal(_) => 500,
        }
    }

    /// Message safe to return to clients
    pub fn public_message(&self) -> String {
        match self {
            AppError::MissingToken => "No token provided".to_string(),
            AppError::InvalidToken(_) => "Invalid or expired token".to_string(),
            AppError::BadRequest(msg) | AppError::Validation(msg) | AppError::NotFound(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_are_unauthorized() {
        assert_eq!(AppError::from(TokenError::MissingToken).status_code(), 401);
        assert_eq!(
            AppError::from(TokenError::InvalidToken("token expired".into())).status_code(),
            401
        );
    }

    #[test]
    fn test_store_errors_map_by_kind() {
        assert_eq!(
            AppError::from(StoreError::Validation("Message is required".into())).status_code(),
            400
        );
        assert_eq!(
            AppError::from(StoreError::Unavailable("pool timed out".into())).status_code(),
            500
        );
    }

    #[test]
    fn test_invalid_token_reason_is_not_public() {
        let err = AppError::InvalidToken("signature mismatch".into());
        assert_eq!(err.public_message(), "Invalid or expired token");
    }
}
