use actix_web::{http::header, HttpResponse};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder};

pub static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "direct_chat_active_sessions",
        "Realtime sessions currently registered",
    )
    .expect("failed to create direct_chat_active_sessions");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register direct_chat_active_sessions");
    gauge
});

pub static MESSAGES_RELAYED: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "direct_chat_messages_relayed_total",
            "Messages fanned out to live sessions, by origin",
        ),
        &["source"],
    )
    .expect("failed to create direct_chat_messages_relayed_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register direct_chat_messages_relayed_total");
    counter
});

pub static DELIVERIES: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "direct_chat_deliveries_total",
        "Per-session message deliveries",
    )
    .expect("failed to create direct_chat_deliveries_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register direct_chat_deliveries_total");
    counter
});

pub static RELAY_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "direct_chat_relay_errors_total",
            "Relay failures reported back to the sending connection",
        ),
        &["code"],
    )
    .expect("failed to create direct_chat_relay_errors_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register direct_chat_relay_errors_total");
    counter
});

pub async fn metrics_handler() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, encoder.format_type()))
        .body(buffer)
}
