use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use ee_crypto::LedgerSigner;
use ee_gateway::ContractService;
use ee_gateway::http::{HttpState, app};
use ee_store::MemRepository;
use ee_wire::testing::{MockEngine, contract_engine};
use ee_wire::{EngineConfig, SwpClient};
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "eegw-test-boundary";

async fn router(engine: &MockEngine, token: Option<&str>) -> Router {
    let client = SwpClient::connect(engine.address(), EngineConfig::default())
        .await
        .unwrap();
    let service = ContractService::new(
        Arc::new(client),
        Arc::new(MemRepository::new()),
        LedgerSigner::generate(),
        Duration::from_secs(5),
    );
    app(HttpState::new(Arc::new(service), token.map(str::to_string)))
}

fn multipart(fields: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        if *name == "source" {
            body.extend_from_slice(
                b"Content-Disposition: form-data; name=\"source\"; filename=\"token.src\"\r\n\
                  Content-Type: application/octet-stream\r\n\r\n",
            );
        } else {
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
        }
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn deploy_request(fields: &[(&str, &[u8])], token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/contracts/deploy")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(multipart(fields))).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(resp: axum::response::Response) -> (StatusCode, Value) {
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

const TOKEN_FIELDS: &[(&str, &[u8])] = &[
    ("contract_name", b"token"),
    ("version", b"1"),
    ("owner", b"alice"),
    ("hash", b"0xcaller-chosen"),
    ("source", b"contract token {}"),
];

#[tokio::test]
async fn deploy_execute_audit_over_http() {
    let engine = MockEngine::spawn(contract_engine).await.unwrap();
    let app = router(&engine, None).await;

    let (status, deployed) = read_json(
        app.clone()
            .oneshot(deploy_request(TOKEN_FIELDS, None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{deployed}");
    let id = deployed["contract_hash"].as_str().unwrap().to_string();
    assert_ne!(id, "0xcaller-chosen");
    assert_eq!(deployed["contract_name"], "token");
    assert_eq!(deployed["contract_owner"], "alice");
    assert_eq!(deployed["contract_version"], "1");

    let mut hashes = Vec::new();
    for amount in [5, 7] {
        let (status, executed) = read_json(
            app.clone()
                .oneshot(json_request(
                    "POST",
                    &format!("/contracts/{id}/execute"),
                    json!({ "function": "mint", "args": { "amount": amount } }),
                ))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{executed}");
        assert_eq!(executed["price"], 21);
        assert_eq!(executed["journal"][0]["args"]["amount"], amount);
        hashes.push((
            executed["block"]["hash"].as_str().unwrap().to_string(),
            executed["block"]["previous_hash"].as_str().unwrap().to_string(),
        ));
    }
    assert_eq!(hashes[1].1, hashes[0].0);

    let audit = Request::builder()
        .uri(format!("/contracts/{id}/audit"))
        .body(Body::empty())
        .unwrap();
    let (status, report) = read_json(app.clone().oneshot(audit).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["verified_blocks"], 2);
    assert_eq!(report["tip_hash"], hashes[1].0.as_str());

    let blocks = Request::builder()
        .uri(format!("/contracts/{id}/blocks"))
        .body(Body::empty())
        .unwrap();
    let (status, entries) = read_json(app.oneshot(blocks).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn health_pings_engine() {
    let engine = MockEngine::spawn(contract_engine).await.unwrap();
    let app = router(&engine, Some("s3cret")).await;
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = read_json(app.oneshot(req).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(engine.requests(), 1);
}

#[tokio::test]
async fn contract_routes_require_bearer_token_when_configured() {
    let engine = MockEngine::spawn(contract_engine).await.unwrap();
    let app = router(&engine, Some("s3cret")).await;

    let (status, body) = read_json(
        app.clone()
            .oneshot(deploy_request(TOKEN_FIELDS, None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = read_json(
        app.clone()
            .oneshot(deploy_request(TOKEN_FIELDS, Some("wrong")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(engine.requests(), 0);

    let (status, _) = read_json(
        app.oneshot(deploy_request(TOKEN_FIELDS, Some("s3cret")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn request_errors_map_to_status_codes() {
    let engine = MockEngine::spawn(contract_engine).await.unwrap();
    let app = router(&engine, None).await;

    let (status, body) = read_json(
        app.clone()
            .oneshot(deploy_request(&[("contract_name", &b"token"[..])], None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let (status, body) = read_json(
        app.clone()
            .oneshot(json_request(
                "POST",
                "/contracts/0xmissing/execute",
                json!({ "function": "mint" }),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = read_json(
        app.oneshot(json_request(
            "POST",
            "/contracts/0xmissing/execute",
            json!({ "function": "" }),
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(engine.requests(), 0);
}
