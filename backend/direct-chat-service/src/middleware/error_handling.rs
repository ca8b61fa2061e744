use crate::error::AppError;
use actix_web::{http::StatusCode, HttpResponse};
use ::error_types::{error_codes, error_types as error_kinds, ErrorResponse};

// Map service errors to the shared HTTP error body
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let (error_type, code) = match err {
        AppError::BadRequest(_) => (error_kinds::VALIDATION_ERROR, error_codes::INVALID_REQUEST),
        AppError::Validation(_) => (error_kinds::VALIDATION_ERROR, error_codes::VALIDATION_ERROR),
        AppError::MissingToken => (error_kinds::AUTHENTICATION_ERROR, error_codes::TOKEN_MISSING),
        AppError::InvalidToken(_) => {
            (error_kinds::AUTHENTICATION_ERROR, error_codes::TOKEN_INVALID)
        }
        AppError::NotFound(_) => (error_kinds::NOT_FOUND_ERROR, error_codes::MESSAGE_NOT_FOUND),
        AppError::StoreUnavailable(_) => (
            error_kinds::SERVICE_UNAVAILABLE_ERROR,
            error_codes::STORE_UNAVAILABLE,
        ),
        AppError::Config(_) | AppError::StartServer(_) | AppError::Internal(_) => {
            (error_kinds::SERVER_ERROR, error_codes::INTERNAL_SERVER_ERROR)
        }
    };

    // Internal details stay in the logs
    let message = match err {
        AppError::StoreUnavailable(_) | AppError::Internal(_) => {
            tracing::error!(error = %err, "request failed");
            "Server error".to_string()
        }
        _ => err.public_message(),
    };

    let response = ErrorResponse::new(
        status.canonical_reason().unwrap_or("Error"),
        &message,
        status.as_u16(),
        error_type,
        code,
    );

    (status, response)
}

pub fn into_response(err: &AppError) -> HttpResponse {
    let (status, response) = map_error(err);
    HttpResponse::build(status).json(response)
}
