//! Access log for the HTTP surface
//!
//! One line per request, tagged with the request id and, once `JwtAuth` has
//! run, the authenticated user. Accepted websocket upgrades get their own
//! message since the connection outlives the request.

use crate::jwt_auth::AuthenticatedUser;
use crate::request_id::CurrentRequestId;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::StatusCode,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::time::Instant;

#[derive(Clone, Default)]
pub struct Logging;

impl<S, B> Transform<S, ServiceRequest> for Logging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AccessLogService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AccessLogService { service }))
    }
}

pub struct AccessLogService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AccessLogService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.path().to_string();
        // Empty when RequestId is not wrapped outside this middleware
        let request_id = req
            .extensions()
            .get::<CurrentRequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            let status = res.status();
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let user_id = res
                .request()
                .extensions()
                .get::<AuthenticatedUser>()
                .map(|u| u.user_id.clone())
                .unwrap_or_default();

            if status == StatusCode::SWITCHING_PROTOCOLS {
                tracing::info!(%request_id, %path, "websocket upgrade accepted");
            } else if status.is_server_error() {
                tracing::error!(
                    %request_id,
                    %method,
                    %path,
                    %user_id,
                    status = status.as_u16(),
                    elapsed_ms,
                    "request failed"
                );
            } else {
                tracing::info!(
                    %request_id,
                    %method,
                    %path,
                    %user_id,
                    status = status.as_u16(),
                    elapsed_ms,
                    "request served"
                );
            }

            Ok(res)
        })
    }
}
