use std::time::Duration;

use ee_wire::testing::{MockEngine, Reply, contract_engine};
use ee_wire::{
    EngineConfig, Payload, PingPayload, ProtocolError, SwpClient, WireError, WireMessage,
    WireResponse,
};
use serde_json::json;

fn ping() -> WireMessage {
    WireMessage::new(
        uuid::Uuid::new_v4().to_string(),
        Payload::Ping(PingPayload { timestamp: 42 }),
    )
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_millis(200),
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn sequential_requests_share_one_connection() {
    let engine = MockEngine::spawn(contract_engine).await.unwrap();
    let client = SwpClient::connect(engine.address(), fast_config()).await.unwrap();

    for _ in 0..3 {
        let req = ping();
        let resp = client.send(&req).await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.id, req.id);
        assert_eq!(resp.data, Some(json!({"timestamp": 42})));
    }
    assert_eq!(engine.requests(), 3);
    assert_eq!(engine.connections(), 1);
}

#[tokio::test]
async fn first_attempt_fails_second_succeeds() {
    let engine = MockEngine::spawn(|n, msg| {
        if n == 1 {
            Reply::Hangup
        } else {
            contract_engine(n, msg)
        }
    })
    .await
    .unwrap();
    let client = SwpClient::connect(engine.address(), fast_config()).await.unwrap();

    let req = ping();
    let resp = client.send(&req).await.expect("retry should succeed");
    assert!(resp.success);
    assert_eq!(resp.id, req.id);
    assert_eq!(engine.requests(), 2, "one original attempt plus one retry");
    assert_eq!(engine.connections(), 2);
}

#[tokio::test]
async fn both_attempts_fail_is_terminal() {
    let engine = MockEngine::spawn(|_, _| Reply::Hangup).await.unwrap();
    let client = SwpClient::connect(engine.address(), fast_config()).await.unwrap();

    let err = client.send(&ping()).await.unwrap_err();
    assert!(err.is_transport(), "unexpected error: {err}");
    assert_eq!(engine.requests(), 2, "no third attempt");

    // The client is still usable: the next call dials a fresh connection.
    let err = client.send(&ping()).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(engine.requests(), 4);
}

#[tokio::test]
async fn stalled_engine_hits_deadline_twice() {
    let engine = MockEngine::spawn(|_, _| Reply::Stall).await.unwrap();
    let client = SwpClient::connect(engine.address(), fast_config()).await.unwrap();

    let err = client.send(&ping()).await.unwrap_err();
    assert!(matches!(err, WireError::Timeout { .. }), "unexpected error: {err}");
    assert_eq!(engine.requests(), 2);
}

#[tokio::test]
async fn mismatched_id_is_not_retried() {
    let engine = MockEngine::spawn(|_, msg| {
        let mut resp = WireResponse::ok(msg, json!({}));
        resp.id = "someone-else".into();
        Reply::Respond(resp)
    })
    .await
    .unwrap();
    let client = SwpClient::connect(engine.address(), fast_config()).await.unwrap();

    let err = client.send(&ping()).await.unwrap_err();
    assert!(matches!(
        err,
        WireError::Protocol(ProtocolError::IdMismatch { .. })
    ));
    assert_eq!(engine.requests(), 1);
}

#[tokio::test]
async fn undecodable_response_is_not_retried() {
    let engine = MockEngine::spawn(|_, _| Reply::RawFrame(b"{not json".to_vec()))
        .await
        .unwrap();
    let client = SwpClient::connect(engine.address(), fast_config()).await.unwrap();

    let err = client.send(&ping()).await.unwrap_err();
    assert!(matches!(err, WireError::Protocol(ProtocolError::Json(_))));
    assert_eq!(engine.requests(), 1);
}

#[tokio::test]
async fn engine_failure_is_returned_as_response() {
    let engine = MockEngine::spawn(|_, msg| Reply::Respond(WireResponse::failure(msg, "boom")))
        .await
        .unwrap();
    let client = SwpClient::connect(engine.address(), fast_config()).await.unwrap();

    let resp = client.send(&ping()).await.unwrap();
    assert!(!resp.success);
    assert!(matches!(
        resp.decode_data::<serde_json::Value>(),
        Err(WireError::Engine { .. })
    ));
    assert_eq!(engine.requests(), 1);
}

#[tokio::test]
async fn unreachable_engine_fails_to_connect() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let err = SwpClient::connect(addr, fast_config()).await.unwrap_err();
    assert!(matches!(err, WireError::Connect { .. }));
}
