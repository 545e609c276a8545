#![allow(clippy::unwrap_used)]
// Integration tests for `GatewayClient` using wiremock.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wanwatch_api::{Ack, Error, GatewayClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

const API_KEY: &str = "test-api-key";

async fn setup() -> (MockServer, GatewayClient) {
    let server = MockServer::start().await;
    let key = SecretString::from(API_KEY.to_owned());
    let client = GatewayClient::new(&server.uri(), &key, &TransportConfig::default()).unwrap();
    (server, client)
}

fn site_path(suffix: &str) -> String {
    format!("/proxy/network/api/s/default/{suffix}")
}

fn envelope(data: serde_json::Value) -> serde_json::Value {
    json!({ "meta": { "rc": "ok" }, "data": data })
}

fn gateway_json() -> serde_json::Value {
    json!({
        "_id": "5f1",
        "mac": "AA:BB:CC:00:11:22",
        "type": "udm",
        "model": "UDMPRO",
        "version": "4.0.6.6754",
        "adopted": true,
        "uplink": {
            "up": true,
            "name": "eth8",
            "comment": "Fiber",
            "ip": "203.0.113.7",
            "rx_bytes-r": 1_250_000,
            "tx_bytes-r": 125_000,
            "xput_down": 940.2,
            "xput_up": 38.5,
            "speedtest_ping": 7,
            "speedtest_lastrun": 1_700_000_000
        },
        "wan1": { "up": true, "ip": "203.0.113.7", "ifname": "eth8" },
        "wan2": { "up": false, "ip": "198.51.100.3", "ifname": "eth9" }
    })
}

// ── Full device listing ─────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_full_device_stats_picks_gateway() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(site_path("stat/device")))
        .and(header("X-API-KEY", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([
            { "mac": "11:11:11:11:11:11", "type": "uap", "model": "U6LR" },
            gateway_json(),
            { "mac": "22:22:22:22:22:22", "type": "usw", "model": "USW-24" }
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let gw = client.fetch_full_device_stats("default").await.unwrap();

    assert_eq!(gw.mac.as_deref(), Some("AA:BB:CC:00:11:22"));
    assert_eq!(gw.firmware(), Some("4.0.6.6754"));
    let uplink = gw.uplink.unwrap();
    assert_eq!(uplink.rx_bytes_r, Some(1_250_000.0));
    assert_eq!(uplink.speedtest_lastrun, Some(1_700_000_000));
    assert_eq!(gw.wan2.unwrap().ip.as_deref(), Some("198.51.100.3"));
}

#[tokio::test]
async fn test_fetch_full_device_stats_without_gateway() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(site_path("stat/device")))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([
            { "mac": "11:11:11:11:11:11", "type": "uap" }
        ]))))
        .mount(&server)
        .await;

    let result = client.fetch_full_device_stats("default").await;
    assert!(
        matches!(result, Err(Error::NoGatewayFound { ref site }) if site == "default"),
        "expected NoGatewayFound, got: {result:?}"
    );
}

#[tokio::test]
async fn test_unauthorized_maps_to_invalid_api_key() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(site_path("stat/device")))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = client.fetch_full_device_stats("default").await;
    let err = result.unwrap_err();
    assert!(err.is_auth_failure(), "expected auth failure, got: {err:?}");
}

#[tokio::test]
async fn test_unifi_os_error_body_with_http_200() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(site_path("stat/device")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "code": 401, "message": "Unauthorized" }
        })))
        .mount(&server)
        .await;

    let result = client.fetch_full_device_stats("default").await;
    assert!(matches!(result, Err(Error::InvalidApiKey { .. })));
}

#[tokio::test]
async fn test_server_error_is_http_and_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(site_path("stat/device")))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = client.fetch_full_device_stats("default").await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 502, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_json_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(site_path("stat/device")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = client.fetch_full_device_stats("default").await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

// ── Single device ───────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_gateway_stats_by_mac() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(site_path("stat/device/aa:bb:cc:00:11:22")))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([{
            "mac": "aa:bb:cc:00:11:22",
            "uplink": { "up": true, "rx_bytes-r": 50, "tx_bytes-r": 10, "name": "WAN2" }
        }]))))
        .mount(&server)
        .await;

    let gw = client
        .fetch_gateway_stats("default", "AA:BB:CC:00:11:22")
        .await
        .unwrap();

    let uplink = gw.uplink.unwrap();
    assert_eq!(uplink.up, Some(true));
    assert_eq!(uplink.name.as_deref(), Some("WAN2"));
    assert!(gw.wan1.is_none());
}

#[tokio::test]
async fn test_fetch_gateway_stats_empty_data() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(site_path("stat/device/aa:bb:cc:00:11:22")))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
        .mount(&server)
        .await;

    let result = client.fetch_gateway_stats("default", "aa:bb:cc:00:11:22").await;
    assert!(matches!(result, Err(Error::NoGatewayFound { .. })));
}

// ── Speedtest command ───────────────────────────────────────────────

#[tokio::test]
async fn test_trigger_speedtest_posts_command() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(site_path("cmd/devmgr")))
        .and(body_json(json!({ "cmd": "speedtest", "mac": "aa:bb:cc:00:11:22" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client
        .trigger_speedtest("default", "AA:BB:CC:00:11:22")
        .await
        .unwrap();
    assert_eq!(ack, Ack::Accepted);
}

#[tokio::test]
async fn test_trigger_speedtest_tolerates_empty_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(site_path("cmd/devmgr")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ack = client
        .trigger_speedtest("default", "aa:bb:cc:00:11:22")
        .await
        .unwrap();
    assert_eq!(ack, Ack::Unverified);
}

#[tokio::test]
async fn test_trigger_speedtest_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(site_path("cmd/devmgr")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": { "rc": "error", "msg": "api.err.UnknownDevice" },
            "data": []
        })))
        .mount(&server)
        .await;

    let result = client.trigger_speedtest("default", "aa:bb:cc:00:11:22").await;
    assert!(
        matches!(result, Err(Error::Api { ref message }) if message == "api.err.UnknownDevice"),
        "expected Api error, got: {result:?}"
    );
}
