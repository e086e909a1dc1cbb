//! Integration tests for the reqwest-based Service Layer client, against a
//! wiremock stand-in for the vendor API.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use slbridge::clients::HttpServiceLayerClient;
use slbridge::{ServiceLayerClient, ServiceLayerConfig, ServiceSession, SessionTokenManager, SlError};

fn config_for(server: &MockServer) -> ServiceLayerConfig {
    ServiceLayerConfig::new(server.uri(), "SBODEMOUS", "manager", "secret-password")
        .with_request_timeout(Duration::from_millis(500))
}

fn login_body() -> String {
    r#"{"odata.metadata":"https://x/b1s/v1/$metadata#B1Sessions/$entity","SessionId":"6cb375d5-8d16-11ee-8000-6045bde2bd07","Version":"1000191","SessionTimeout":30}"#
        .to_string()
}

#[tokio::test]
async fn login_parses_session_and_route_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Login"))
        .and(body_partial_json(serde_json::json!({
            "CompanyDB": "SBODEMOUS",
            "UserName": "manager",
            "Password": "secret-password",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(login_body(), "application/json")
                .append_header("set-cookie", "B1SESSION=6cb375d5; HttpOnly; Path=/b1s/v1")
                .append_header("set-cookie", "ROUTEID=.node2; Path=/b1s"),
        )
        .mount(&server)
        .await;

    let client = HttpServiceLayerClient::new();
    let reply = client.login(&config_for(&server)).await.unwrap();

    assert_eq!(reply.session_id, "6cb375d5-8d16-11ee-8000-6045bde2bd07");
    assert_eq!(reply.route_id, ".node2");
    assert_eq!(reply.session_timeout, Some(Duration::from_secs(30 * 60)));
}

#[tokio::test]
async fn login_without_route_cookie_is_tolerated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(login_body(), "application/json"))
        .mount(&server)
        .await;

    let client = HttpServiceLayerClient::new();
    let reply = client.login(&config_for(&server)).await.unwrap();
    assert_eq!(reply.route_id, "");
}

#[tokio::test]
async fn rejected_login_maps_to_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Login"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(
            r#"{"error":{"code":301,"message":{"lang":"en-us","value":"Login failed (wrong password)"}}}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = HttpServiceLayerClient::new();
    let err = client.login(&config_for(&server)).await.unwrap_err();

    match err {
        SlError::Authentication(message) => assert!(message.contains("wrong password")),
        other => panic!("expected Authentication, got {:?}", other),
    }
}

#[tokio::test]
async fn malformed_success_body_maps_to_unexpected_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let client = HttpServiceLayerClient::new();
    let err = client.login(&config_for(&server)).await.unwrap_err();
    assert!(matches!(err, SlError::UnexpectedResponse(_)));
    assert!(err.hint().is_some());
}

#[tokio::test]
async fn server_error_maps_to_unexpected_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Login"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = HttpServiceLayerClient::new();
    let err = client.login(&config_for(&server)).await.unwrap_err();
    match err {
        SlError::UnexpectedResponse(message) => assert!(message.contains("503")),
        other => panic!("expected UnexpectedResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn hanging_server_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(login_body(), "application/json")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = HttpServiceLayerClient::new();
    let config = config_for(&server).with_request_timeout(Duration::from_millis(100));
    let err = client.login(&config).await.unwrap_err();
    assert!(matches!(err, SlError::Timeout(_)));
}

#[tokio::test]
async fn unreachable_host_maps_to_network_error() {
    // Nothing listens on this port.
    let config = ServiceLayerConfig::new("http://127.0.0.1:9", "SBODEMOUS", "manager", "pw")
        .with_request_timeout(Duration::from_millis(300));

    let client = HttpServiceLayerClient::new();
    let err = client.login(&config).await.unwrap_err();
    assert!(matches!(err, SlError::Network(_) | SlError::Timeout(_)));
}

#[tokio::test]
async fn logout_sends_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Logout"))
        .and(header("cookie", "B1SESSION=sid-abc; ROUTEID=.node2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpServiceLayerClient::new();
    let session =
        ServiceSession::issue("sid-abc", ".node2", Duration::from_secs(60)).unwrap();
    client
        .logout(&config_for(&server), &session)
        .await
        .unwrap();
}

#[tokio::test]
async fn manager_lifecycle_against_live_wire() {
    let server = MockServer::start().await;

    // First login succeeds, everything after that fails at the wire.
    Mock::given(method("POST"))
        .and(path("/Login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(login_body(), "application/json")
                .append_header("set-cookie", "ROUTEID=.node2; Path=/b1s"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Login"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let manager = SessionTokenManager::new(
        config_for(&server),
        Arc::new(HttpServiceLayerClient::new()),
    )
    .unwrap();

    let installed = manager.reset().await.unwrap();
    assert_eq!(installed.status, slbridge::SessionStatus::Valid);

    // Refresh hits the failing wire; the installed session must survive.
    assert!(manager.refresh().await.is_err());
    let after = manager.status().await;
    assert_eq!(after.status, slbridge::SessionStatus::Valid);
    assert_eq!(after.token, installed.token);
}
