//! HTTP metrics
//!
//! Labels use the matched route pattern, never the raw path, so query
//! strings and peer ids cannot blow up cardinality. Upgraded websocket
//! connections are counted separately and kept out of the latency histogram.

use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::StatusCode,
    Error,
};
use futures::future::{ready, Ready};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Instant;

pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "direct_chat_http_requests_total",
        "HTTP requests by route and status class",
        &["method", "route", "status"]
    )
    .expect("direct_chat_http_requests_total metric can be registered")
});

pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "direct_chat_http_request_duration_seconds",
        "HTTP request latency",
        &["method", "route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("direct_chat_http_request_duration_seconds metric can be registered")
});

pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "direct_chat_http_requests_in_flight",
        "HTTP requests currently being served"
    )
    .expect("direct_chat_http_requests_in_flight metric can be registered")
});

pub static WS_UPGRADES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "direct_chat_ws_upgrades_total",
        "Websocket handshakes that switched protocols"
    )
    .expect("direct_chat_ws_upgrades_total metric can be registered")
});

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

// Decrements the in-flight gauge however the request ends
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        HTTP_REQUESTS_IN_FLIGHT.inc();
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        HTTP_REQUESTS_IN_FLIGHT.dec();
    }
}

#[derive(Clone, Default)]
pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = MetricsMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let method = req.method().to_string();
        let route = req
            .match_pattern()
            .unwrap_or_else(|| "unmatched".to_string());

        Box::pin(async move {
            let _in_flight = InFlight::enter();
            let started = Instant::now();
            let res = service.call(req).await?;
            let status = res.status();

            HTTP_REQUESTS_TOTAL
                .with_label_values(&[&method, &route, status_class(status)])
                .inc();

            if status == StatusCode::SWITCHING_PROTOCOLS {
                WS_UPGRADES_TOTAL.inc();
            } else {
                HTTP_REQUEST_DURATION_SECONDS
                    .with_label_values(&[&method, &route])
                    .observe(started.elapsed().as_secs_f64());
            }

            Ok(res)
        })
    }
}
