use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, StatusCode},
    Error, HttpMessage, HttpResponse, ResponseError,
};
use crate::request_id::CurrentRequestId;
use crypto_core::jwt::{bearer_token, JwtVerifier, TokenError};
use ::error_types::{error_codes, error_types as error_kinds, ErrorResponse};
use futures::future::{ready, Ready};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

/// Identity of the caller, taken from the verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Rejection produced when the bearer token does not verify
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct AuthError(#[from] pub TokenError);

impl AuthError {
    pub fn to_error_response(&self) -> ErrorResponse {
        let (code, message) = match &self.0 {
            TokenError::MissingToken => (error_codes::TOKEN_MISSING, "No token provided"),
            TokenError::InvalidToken(_) => (error_codes::TOKEN_INVALID, "Invalid or expired token"),
        };

        ErrorResponse::new(
            "Unauthorized",
            message,
            StatusCode::UNAUTHORIZED.as_u16(),
            error_kinds::AUTHENTICATION_ERROR,
            code,
        )
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Unauthorized().json(self.to_error_response())
    }
}

/// Bearer token authentication middleware
///
/// Requests without a valid `Authorization: Bearer <token>` header are
/// answered with 401 before reaching the wrapped service.
#[derive(Clone)]
pub struct JwtAuth {
    verifier: Arc<JwtVerifier>,
}

impl JwtAuth {
    pub fn new(verifier: Arc<JwtVerifier>) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = JwtAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    verifier: Arc<JwtVerifier>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        let header_value = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let verified = self.verifier.verify(bearer_token(header_value));

        Box::pin(async move {
            match verified {
                Ok(user_id) => {
                    req.extensions_mut().insert(AuthenticatedUser { user_id });
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(e) => {
                    let request_id = req
                        .extensions()
                        .get::<CurrentRequestId>()
                        .map(|id| id.0.clone())
                        .unwrap_or_default();
                    tracing::warn!(%request_id, path = %req.path(), error = %e, "JWT validation failed");
                    let body = AuthError(e).to_error_response().with_trace_id(request_id);
                    let response = HttpResponse::Unauthorized().json(body);
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

impl actix_web::FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<AuthenticatedUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(AuthError(TokenError::MissingToken).into())),
        }
    }
}
