#![allow(clippy::unwrap_used)]
// Integration tests for `LocalClient` using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use meterbridge_api::{Error, FailureKind, LocalClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, LocalClient, String) {
    let server = MockServer::start().await;
    let client = LocalClient::new(&TransportConfig::lan(Duration::from_millis(300))).unwrap();
    let address = server.address().to_string();
    (server, client, address)
}

fn token() -> SecretString {
    SecretString::from("lan-token".to_string())
}

fn meter_body() -> serde_json::Value {
    json!({
        "elec": {
            "power":  { "now": { "value": 410, "time": 1_718_447_400 } },
            "import": { "now": { "value": 1_234_600, "time": 1_718_447_400 } },
            "export": { "now": { "value": 10_000, "time": 1_718_447_400 } }
        }
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_reading_success() {
    let (server, client, address) = setup().await;

    Mock::given(method("GET"))
        .and(path("/meter/now"))
        .and(header("Authorization", "N2G-LAN-USER token=\"lan-token\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(meter_body()))
        .expect(1)
        .mount(&server)
        .await;

    let reading = tokio_test::assert_ok!(client.fetch_reading(&address, &token()).await);

    assert_eq!(reading.instantaneous_power_watts, Some(410.0));
    assert!((reading.consumption_total_kwh - 1234.6).abs() < 1e-9);
    assert_eq!(reading.feed_in_total_kwh, Some(10.0));
    assert_eq!(reading.observed_at.timestamp(), 1_718_447_400);
}

#[tokio::test]
async fn test_rejected_token_is_auth_failure() {
    let (server, client, address) = setup().await;

    Mock::given(method("GET"))
        .and(path("/meter/now"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.fetch_reading(&address, &token()).await.unwrap_err();
    assert!(
        matches!(err, Error::Authentication { .. }),
        "expected Authentication error, got: {err:?}"
    );
    assert_eq!(err.failure_kind(), FailureKind::Auth);
}

#[tokio::test]
async fn test_server_error_is_network_failure() {
    let (server, client, address) = setup().await;

    Mock::given(method("GET"))
        .and(path("/meter/now"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client.fetch_reading(&address, &token()).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, .. }), "got: {err:?}");
    assert_eq!(err.failure_kind(), FailureKind::Network);
}

#[tokio::test]
async fn test_malformed_body_is_parse_failure() {
    let (server, client, address) = setup().await;

    Mock::given(method("GET"))
        .and(path("/meter/now"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>captive portal</html>"))
        .mount(&server)
        .await;

    let err = client.fetch_reading(&address, &token()).await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }), "got: {err:?}");
    assert_eq!(err.failure_kind(), FailureKind::Parse);
}

#[tokio::test]
async fn test_slow_device_times_out() {
    let (server, client, address) = setup().await;

    Mock::given(method("GET"))
        .and(path("/meter/now"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(meter_body())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.fetch_reading(&address, &token()).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got: {err:?}");
    assert_eq!(err.failure_kind(), FailureKind::Network);
}

#[tokio::test]
async fn test_unreachable_device_is_network_failure() {
    let client = LocalClient::new(&TransportConfig::lan(Duration::from_millis(300))).unwrap();

    // Nothing listens on the discard port on loopback.
    let err = client
        .fetch_reading("127.0.0.1:9", &token())
        .await
        .unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::Network, "got: {err:?}");
}
