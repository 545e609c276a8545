#![allow(clippy::unwrap_used)]
// Integration tests for `Monitor` against a wiremock console.
//
// Real time with short intervals: the monitor's HTTP timeouts and the mock
// server do not cooperate with a paused clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use wanwatch_core::{
    ActiveWanId, CoreError, MatchReason, Monitor, MonitorConfig, MonitorSnapshot, SessionState,
    SpeedtestEvent, TriggerOrigin, WanLayout,
};

// ── Helpers ─────────────────────────────────────────────────────────

const MAC: &str = "aa:bb:cc:00:11:22";
const WAIT: Duration = Duration::from_secs(5);

fn site_path(suffix: &str) -> String {
    format!("/proxy/network/api/s/default/{suffix}")
}

fn envelope(data: serde_json::Value) -> serde_json::Value {
    json!({ "meta": { "rc": "ok" }, "data": data })
}

fn gateway(last_run: i64) -> serde_json::Value {
    json!({
        "mac": MAC,
        "type": "udm",
        "model": "UDMPRO",
        "version": "4.0.6",
        "adopted": true,
        "uplink": {
            "up": true,
            "name": "eth8",
            "ip": "203.0.113.7",
            "rx_bytes-r": 1_250_000,
            "tx_bytes-r": 125_000,
            "xput_down": 940.2,
            "xput_up": 38.5,
            "speedtest_ping": 7,
            "speedtest_lastrun": last_run
        },
        "wan1": { "up": true, "ip": "203.0.113.7", "ifname": "eth8" },
        "wan2": { "up": false, "ip": "198.51.100.3", "ifname": "eth9" }
    })
}

fn config(server: &MockServer) -> MonitorConfig {
    let mut config = MonitorConfig::new(server.uri(), SecretString::from("test-api-key".to_owned()));
    config.full_interval = Duration::from_millis(300);
    config.fast_interval = Duration::from_millis(100);
    config.request_timeout = Duration::from_secs(5);
    config.speedtest_timeout = Duration::from_secs(5);
    config.auto_speedtest = false;
    config
}

/// Serves the gateway; `speedtest_lastrun` advances once a speedtest ran.
struct GatewayResponder {
    ran: Arc<AtomicBool>,
    delay: Duration,
}

impl Respond for GatewayResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let last_run = if self.ran.load(Ordering::SeqCst) { 1_050 } else { 1_000 };
        ResponseTemplate::new(200)
            .set_body_json(envelope(json!([gateway(last_run)])))
            .set_delay(self.delay)
    }
}

/// Accepts the speedtest command, optionally marking it as run.
struct TriggerResponder {
    ran: Arc<AtomicBool>,
    completes: bool,
}

impl Respond for TriggerResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        if self.completes {
            self.ran.store(true, Ordering::SeqCst);
        }
        ResponseTemplate::new(200).set_body_json(envelope(json!([])))
    }
}

async fn mount_gateway(server: &MockServer, ran: &Arc<AtomicBool>, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(site_path("stat/device")))
        .respond_with(GatewayResponder {
            ran: Arc::clone(ran),
            delay,
        })
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/stat/device/[0-9a-f:]+$"))
        .respond_with(GatewayResponder {
            ran: Arc::clone(ran),
            delay,
        })
        .mount(server)
        .await;
}

async fn mount_trigger(server: &MockServer, ran: &Arc<AtomicBool>, completes: bool) {
    Mock::given(method("POST"))
        .and(path(site_path("cmd/devmgr")))
        .respond_with(TriggerResponder {
            ran: Arc::clone(ran),
            completes,
        })
        .mount(server)
        .await;
}

async fn started_monitor(server: &MockServer, config: MonitorConfig) -> Monitor {
    let monitor = Monitor::new(config).unwrap();
    monitor.start().await.unwrap();
    assert!(server.received_requests().await.is_some());
    monitor
}

async fn wait_for_snapshot(
    monitor: &Monitor,
    predicate: impl Fn(&MonitorSnapshot) -> bool,
) -> Arc<MonitorSnapshot> {
    let mut stream = monitor.subscribe();
    if predicate(stream.current().as_ref()) {
        return Arc::clone(stream.current());
    }
    tokio::time::timeout(WAIT, async {
        loop {
            let snap = stream.changed().await.unwrap();
            if predicate(snap.as_ref()) {
                return snap;
            }
        }
    })
    .await
    .unwrap()
}

// ── Startup ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_publishes_merged_snapshot() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;

    let monitor = started_monitor(&server, config(&server)).await;
    let snap = monitor.snapshot();

    assert_eq!(snap.device.identity.mac.as_deref(), Some(MAC));
    assert_eq!(snap.device.identity.model.as_deref(), Some("UDMPRO"));
    assert_eq!(snap.device.layout, WanLayout::Dual);
    assert_eq!(snap.active_wan.id, ActiveWanId::Wan1);
    assert_eq!(snap.active_wan.reason, MatchReason::LinkState);
    assert_eq!(snap.device.uplink.speedtest.last_run, Some(1_000));
    assert!(!snap.health.stale);
    assert!(!snap.speedtest.in_progress);

    // The fast timer fires immediately after start.
    let snap = wait_for_snapshot(&monitor, |s| s.device.last_fast_poll_at.is_some()).await;
    assert!((snap.device.uplink.download_mbps() - 10.0).abs() < f64::EPSILON);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_start_surfaces_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(site_path("stat/device")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let monitor = Monitor::new(config(&server)).unwrap();
    let err = monitor.start().await.unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized { .. }), "got {err:?}");
    assert!(err.is_setup_fatal());
}

#[tokio::test]
async fn test_start_surfaces_missing_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(site_path("stat/device")))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([
            { "mac": "11:22:33:44:55:66", "type": "usw", "model": "USW24" }
        ]))))
        .mount(&server)
        .await;

    let monitor = Monitor::new(config(&server)).unwrap();
    let err = monitor.start().await.unwrap_err();
    assert!(matches!(err, CoreError::NoGatewayFound { ref site } if site == "default"));
}

#[tokio::test]
async fn test_validate_settings_returns_identity() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;

    let identity = Monitor::validate_settings(&config(&server)).await.unwrap();
    assert_eq!(identity.mac.as_deref(), Some(MAC));
    assert_eq!(identity.firmware_version.as_deref(), Some("4.0.6"));
    assert!(identity.management_url.unwrap().starts_with("http://"));
}

// ── Tick failures ───────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_tick_keeps_last_known_state() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;
    let monitor = started_monitor(&server, config(&server)).await;

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let snap = wait_for_snapshot(&monitor, |s| s.health.stale).await;
    assert_eq!(snap.device.identity.mac.as_deref(), Some(MAC));
    assert_eq!(snap.active_wan.id, ActiveWanId::Wan1);
    assert!(snap.health.last_error.as_deref().unwrap().contains("502"));

    // The scheduler keeps ticking through failures.
    let snap = wait_for_snapshot(&monitor, |s| s.health.consecutive_failures >= 3).await;
    assert!(snap.health.stale);

    monitor.shutdown().await;
}

// ── Rate bound and shutdown ─────────────────────────────────────────

#[tokio::test]
async fn test_slow_responses_never_overlap() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::from_millis(300)).await;

    let monitor = started_monitor(&server, config(&server)).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    monitor.shutdown().await;

    // One call at a time at 300ms each: the initial poll plus at most
    // four more, instead of one per 100ms fast tick.
    let requests = server.received_requests().await.unwrap();
    assert!(requests.len() <= 6, "{} requests issued", requests.len());
}

#[tokio::test]
async fn test_no_requests_after_shutdown() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;

    let monitor = started_monitor(&server, config(&server)).await;
    monitor.shutdown().await;
    let before = server.received_requests().await.unwrap().len();

    tokio::time::sleep(Duration::from_millis(400)).await;
    let after = server.received_requests().await.unwrap().len();
    assert_eq!(before, after);

    let err = monitor.trigger_speedtest_manually().await.unwrap_err();
    assert!(matches!(err, CoreError::ShutDown));
    // Idempotent.
    monitor.shutdown().await;
}

// ── Speedtest ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_manual_speedtest_completes() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;
    mount_trigger(&server, &ran, true).await;

    let monitor = started_monitor(&server, config(&server)).await;
    let result = tokio::time::timeout(WAIT, monitor.run_speedtest())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.origin, TriggerOrigin::Manual);
    assert_eq!(result.last_run, 1_050);
    assert_eq!(result.download_mbps, Some(940.2));
    assert_eq!(result.upload_mbps, Some(38.5));
    assert_eq!(result.ping_ms, Some(7.0));

    let snap = monitor.snapshot();
    assert_eq!(snap.speedtest.state, SessionState::Idle);
    assert!(!snap.speedtest.in_progress);
    assert_eq!(snap.speedtest.last_result.as_ref(), Some(&result));
    assert_eq!(snap.device.uplink.speedtest.last_run, Some(1_050));

    let posts: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method == wiremock::http::Method::POST)
        .collect();
    assert_eq!(posts.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&posts[0].body).unwrap();
    assert_eq!(body, json!({ "cmd": "speedtest", "mac": MAC }));

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_second_trigger_is_already_running() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;
    mount_trigger(&server, &ran, false).await;

    let monitor = started_monitor(&server, config(&server)).await;
    monitor.trigger_speedtest_manually().await.unwrap();
    assert!(monitor.speedtest_status().in_progress);

    let err = monitor.trigger_speedtest_manually().await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyRunning));
    assert_eq!(monitor.speedtest_status().state, SessionState::Polling);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_speedtest_times_out() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;
    mount_trigger(&server, &ran, false).await;

    let mut cfg = config(&server);
    cfg.speedtest_timeout = Duration::from_millis(400);
    let monitor = started_monitor(&server, cfg).await;

    let err = tokio::time::timeout(WAIT, monitor.run_speedtest())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, CoreError::SpeedtestTimedOut { .. }), "got {err:?}");

    let snap = monitor.snapshot();
    assert!(!snap.speedtest.in_progress);
    assert!(snap.speedtest.last_result.is_none());

    // The orchestrator is idle again and accepts a new trigger.
    monitor.trigger_speedtest_manually().await.unwrap();
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_rejected_trigger_reports_failure() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;
    Mock::given(method("POST"))
        .and(path(site_path("cmd/devmgr")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": { "rc": "error", "msg": "api.err.UnknownDevice" },
            "data": []
        })))
        .mount(&server)
        .await;

    let monitor = started_monitor(&server, config(&server)).await;
    let mut events = monitor.speedtest_events();
    let err = monitor.trigger_speedtest_manually().await.unwrap_err();
    assert!(matches!(err, CoreError::Unexpected { .. }), "got {err:?}");

    assert!(matches!(
        events.recv().await.unwrap(),
        SpeedtestEvent::Started {
            origin: TriggerOrigin::Manual
        }
    ));
    assert!(matches!(events.recv().await.unwrap(), SpeedtestEvent::Failed { .. }));
    assert_eq!(monitor.speedtest_status().state, SessionState::Idle);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_trigger_answered_after_shutdown_is_discarded() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;
    Mock::given(method("POST"))
        .and(path(site_path("cmd/devmgr")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([])))
                .set_delay(Duration::from_millis(600)),
        )
        .mount(&server)
        .await;

    let monitor = started_monitor(&server, config(&server)).await;
    let trigger = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.trigger_speedtest_manually().await }
    });
    wait_for_snapshot(&monitor, |s| s.speedtest.state == SessionState::Triggered).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    monitor.shutdown().await;
    let at_shutdown = monitor.snapshot();

    let result = tokio::time::timeout(WAIT, trigger).await.unwrap().unwrap();
    assert!(matches!(result, Err(CoreError::ShutDown)), "got {result:?}");
    assert_eq!(at_shutdown.speedtest.state, SessionState::Triggered);
    assert!(Arc::ptr_eq(&at_shutdown, &monitor.snapshot()));
}

// ── Runtime configuration ───────────────────────────────────────────

#[tokio::test]
async fn test_enabling_auto_speedtest_at_runtime() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;
    mount_trigger(&server, &ran, true).await;

    let mut cfg = config(&server);
    cfg.auto_speedtest_interval = Duration::from_millis(200);
    let monitor = started_monitor(&server, cfg).await;
    assert!(!monitor.snapshot().auto_speedtest);

    let mut events = monitor.speedtest_events();
    monitor.set_auto_speedtest(true).await.unwrap();
    assert!(monitor.snapshot().auto_speedtest);

    let completed = tokio::time::timeout(WAIT, async {
        loop {
            if let SpeedtestEvent::Completed(result) = events.recv().await.unwrap() {
                return result;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(completed.origin, TriggerOrigin::Automatic);

    monitor.set_auto_speedtest(false).await.unwrap();
    assert!(!monitor.config().await.auto_speedtest);
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_interval_change_keeps_device_state() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;

    let monitor = started_monitor(&server, config(&server)).await;
    let mut cfg = monitor.config().await;
    cfg.fast_interval = Duration::from_millis(150);
    monitor.update_config(cfg).await.unwrap();

    let snap = monitor.snapshot();
    assert_eq!(snap.device.identity.mac.as_deref(), Some(MAC));
    assert_eq!(monitor.config().await.fast_interval, Duration::from_millis(150));

    let mut bad = monitor.config().await;
    bad.full_interval = Duration::ZERO;
    assert!(matches!(
        monitor.update_config(bad).await,
        Err(CoreError::Config { .. })
    ));

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_site_change_forgets_previous_gateway() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;

    let monitor = started_monitor(&server, config(&server)).await;
    let mut cfg = monitor.config().await;
    cfg.site = "branch".into();
    monitor.update_config(cfg).await.unwrap();

    let snap = monitor.snapshot();
    assert!(snap.device.identity.mac.is_none());
    assert_eq!(snap.device.layout, WanLayout::Undetected);

    // Nothing is mounted for the new site, so ticks fail and go stale.
    let snap = wait_for_snapshot(&monitor, |s| s.health.stale).await;
    assert!(snap.device.identity.mac.is_none());

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_site_change_ends_running_speedtest() {
    let server = MockServer::start().await;
    let ran = Arc::new(AtomicBool::new(false));
    mount_gateway(&server, &ran, Duration::ZERO).await;
    mount_trigger(&server, &ran, false).await;

    let mut cfg = config(&server);
    cfg.speedtest_timeout = Duration::from_secs(30);
    let monitor = started_monitor(&server, cfg).await;

    let running = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.run_speedtest().await }
    });
    wait_for_snapshot(&monitor, |s| s.speedtest.state == SessionState::Polling).await;

    let mut cfg = monitor.config().await;
    cfg.site = "branch".into();
    monitor.update_config(cfg).await.unwrap();

    // Well inside the speedtest budget: the session ended, it did not time out.
    let result = tokio::time::timeout(WAIT, running).await.unwrap().unwrap();
    assert!(
        matches!(result, Err(CoreError::Unexpected { ref message }) if message == "configuration changed"),
        "got {result:?}"
    );
    let status = monitor.speedtest_status();
    assert_eq!(status.state, SessionState::Idle);
    assert!(!status.in_progress);

    monitor.shutdown().await;
}
