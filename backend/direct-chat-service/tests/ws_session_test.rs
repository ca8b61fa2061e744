// WebSocket session tests
//
// Runs the real routes on a local port and talks to /ws with an awc client,
// so every frame goes through the session actor.

mod common;

use actix_web::{dev::ServerHandle, web, web::Bytes, App, HttpServer};
use awc::{error::WsProtocolError, ws, Client};
use common::{drain, state, token};
use direct_chat_service::{
    models::UserId,
    routes,
    state::AppState,
    websocket::{SessionHandle, WsOutboundEvent},
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(state: web::Data<AppState>) -> std::io::Result<(SocketAddr, ServerHandle)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let server = HttpServer::new(move || {
        let verifier = state.verifier.clone();
        App::new()
            .app_data(state.clone())
            .configure(move |cfg| routes::configure(cfg, verifier))
    })
    .workers(1)
    .listen(listener)?
    .run();

    let handle = server.handle();
    actix_rt::spawn(server);
    Ok((addr, handle))
}

async fn connect(
    addr: SocketAddr,
    user: &str,
) -> impl Stream<Item = Result<ws::Frame, WsProtocolError>>
       + Sink<ws::Message, Error = WsProtocolError>
       + Unpin {
    let (_resp, conn) = Client::new()
        .ws(format!("http://{addr}/ws?token={}", token(user)))
        .connect()
        .await
        .expect("connect websocket client");
    conn
}

async fn next_frame<S>(conn: &mut S) -> ws::Frame
where
    S: Stream<Item = Result<ws::Frame, WsProtocolError>> + Unpin,
{
    loop {
        let frame = actix_rt::time::timeout(WAIT, conn.next())
            .await
            .expect("frame before timeout")
            .expect("connection open")
            .expect("frame data");
        match frame {
            ws::Frame::Ping(_) | ws::Frame::Pong(_) => continue,
            other => return other,
        }
    }
}

async fn next_event<S>(conn: &mut S) -> Value
where
    S: Stream<Item = Result<ws::Frame, WsProtocolError>> + Unpin,
{
    match next_frame(conn).await {
        ws::Frame::Text(bytes) => serde_json::from_slice(&bytes).expect("json event"),
        other => panic!("unexpected frame: {other:?}"),
    }
}

async fn send_json<S>(conn: &mut S, value: Value)
where
    S: Sink<ws::Message, Error = WsProtocolError> + Unpin,
{
    conn.send(ws::Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

async fn open_handle(state: &AppState, user: &str) -> UnboundedReceiver<WsOutboundEvent> {
    let (handle, rx) = SessionHandle::open(user.into());
    state.registry.register(handle).await;
    rx
}

async fn wait_until_gone(state: &AppState, user: &str) -> bool {
    let user = UserId::from(user);
    for _ in 0..50 {
        if state.registry.sessions_for(&user).await.is_empty() {
            return true;
        }
        actix_rt::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[actix_rt::test]
async fn test_connected_is_first_event() {
    let state = state();
    let (addr, handle) = start_server(state.clone()).await.expect("start server");
    let mut conn = connect(addr, "alice").await;

    let event = next_event(&mut conn).await;
    assert_eq!(event["type"], "connected");
    assert_eq!(event["user_id"], "alice");
    assert_eq!(state.registry.sessions_for(&"alice".into()).await.len(), 1);

    handle.stop(true).await;
}

#[actix_rt::test]
async fn test_validation_error_goes_to_origin_only_and_session_stays_open() {
    let state = state();
    let (addr, handle) = start_server(state.clone()).await.expect("start server");
    let mut conn = connect(addr, "alice").await;
    assert_eq!(next_event(&mut conn).await["type"], "connected");

    let mut alice_other = open_handle(&state, "alice").await;
    let mut bob = open_handle(&state, "bob").await;

    send_json(&mut conn, json!({"type": "chat-message", "to": "", "message": "hi"})).await;
    let error = next_event(&mut conn).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "VALIDATION_ERROR");
    assert!(alice_other.try_recv().is_err());
    assert!(bob.try_recv().is_err());

    send_json(&mut conn, json!({"type": "chat-message", "to": "bob", "message": "hello"})).await;
    let echoed = next_event(&mut conn).await;
    assert_eq!(echoed["type"], "chat-message");
    assert_eq!(echoed["sender"], "alice");
    assert_eq!(echoed["receiver"], "bob");
    assert_eq!(echoed["message"], "hello");

    assert_eq!(drain(&mut bob).len(), 1);
    assert_eq!(drain(&mut alice_other).len(), 1);

    handle.stop(true).await;
}

#[actix_rt::test]
async fn test_unknown_event_and_binary_frame_are_invalid() {
    let state = state();
    let (addr, handle) = start_server(state.clone()).await.expect("start server");
    let mut conn = connect(addr, "alice").await;
    assert_eq!(next_event(&mut conn).await["type"], "connected");

    send_json(&mut conn, json!({"type": "typing", "to": "bob"})).await;
    let unknown = next_event(&mut conn).await;
    assert_eq!(unknown["type"], "error");
    assert_eq!(unknown["code"], "INVALID_EVENT");

    conn.send(ws::Message::Binary(Bytes::from_static(b"\x00\x01")))
        .await
        .expect("send frame");
    let binary = next_event(&mut conn).await;
    assert_eq!(binary["type"], "error");
    assert_eq!(binary["code"], "INVALID_EVENT");

    // Still usable afterwards
    send_json(&mut conn, json!({"type": "chat-message", "to": "bob", "message": "still here"})).await;
    assert_eq!(next_event(&mut conn).await["type"], "chat-message");
    assert_eq!(state.registry.sessions_for(&"alice".into()).await.len(), 1);

    handle.stop(true).await;
}

#[actix_rt::test]
async fn test_numeric_recipient_is_delivered() {
    let state = state();
    let (addr, handle) = start_server(state.clone()).await.expect("start server");
    let mut conn = connect(addr, "alice").await;
    assert_eq!(next_event(&mut conn).await["type"], "connected");
    let mut recipient = open_handle(&state, "42").await;

    send_json(&mut conn, json!({"type": "chat-message", "to": 42, "message": "hi"})).await;
    let echoed = next_event(&mut conn).await;
    assert_eq!(echoed["receiver"], "42");

    let delivered = drain(&mut recipient);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].sender, UserId::from("alice"));

    handle.stop(true).await;
}

#[actix_rt::test]
async fn test_logout_closes_normally_and_unregisters() {
    let state = state();
    let (addr, handle) = start_server(state.clone()).await.expect("start server");
    let mut conn = connect(addr, "alice").await;
    assert_eq!(next_event(&mut conn).await["type"], "connected");

    send_json(&mut conn, json!({"type": "logout"})).await;
    match next_frame(&mut conn).await {
        ws::Frame::Close(Some(reason)) => assert_eq!(reason.code, ws::CloseCode::Normal),
        other => panic!("unexpected frame: {other:?}"),
    }

    assert!(wait_until_gone(&state, "alice").await);
    assert_eq!(state.registry.session_count().await, 0);

    handle.stop(true).await;
}

#[actix_rt::test]
async fn test_rejected_handshake_creates_no_session() {
    let state = state();
    let (addr, handle) = start_server(state.clone()).await.expect("start server");

    let missing = Client::new().ws(format!("http://{addr}/ws")).connect().await;
    assert!(missing.is_err());

    let forged = Client::new()
        .ws(format!("http://{addr}/ws?token=not-a-jwt"))
        .connect()
        .await;
    assert!(forged.is_err());

    assert_eq!(state.registry.session_count().await, 0);
    assert!(state
        .store
        .history(&"alice".into(), &"bob".into())
        .await
        .unwrap()
        .is_empty());

    handle.stop(true).await;
}
