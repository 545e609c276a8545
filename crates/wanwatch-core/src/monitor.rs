// ── Monitor ──
//
// Lifecycle and scheduling for one gateway: the full and fast poll timers,
// the optional auto-speedtest timer, the speedtest watchdog, and the single
// in-flight gate every outbound call goes through. Poll results are folded
// into the shared state under one lock and published once per cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use strum::Display;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wanwatch_api::GatewayClient;

use crate::config::MonitorConfig;
use crate::convert::DeviceReport;
use crate::error::CoreError;
use crate::gate::InFlightGate;
use crate::merge::merge;
use crate::model::{
    ActiveWanResult, DeviceState, GatewayIdentity, MonitorSnapshot, PollHealth, SpeedtestEvent,
    SpeedtestResult, SpeedtestStatus, TriggerOrigin,
};
use crate::resolver::resolve;
use crate::speedtest::SpeedtestOrchestrator;
use crate::stream::SnapshotStream;

const EVENT_CHANNEL_SIZE: usize = 64;

// ── Poll kinds ───────────────────────────────────────────────────

/// The two request shapes the scheduler issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PollKind {
    /// `stat/device`: identity, slot details, speedtest figures.
    Full,
    /// `stat/device/<mac>`: live rates.
    Fast,
}

/// What to do when the in-flight gate is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateMode {
    Skip,
    Wait,
}

// ── Shared state ─────────────────────────────────────────────────

struct Connection {
    client: GatewayClient,
    site: String,
    generation: u64,
}

struct CoreState {
    device: DeviceState,
    active_wan: ActiveWanResult,
    speedtest: SpeedtestOrchestrator,
    health: PollHealth,
    auto_speedtest: bool,
}

impl CoreState {
    fn new(config: &MonitorConfig, management_url: Option<String>) -> Self {
        Self {
            device: DeviceState::new(management_url),
            active_wan: ActiveWanResult::default(),
            speedtest: SpeedtestOrchestrator::new(config.speedtest_timeout),
            health: PollHealth::default(),
            auto_speedtest: config.auto_speedtest,
        }
    }

    fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            device: self.device.clone(),
            active_wan: self.active_wan.clone(),
            speedtest: self.speedtest.status(),
            health: self.health.clone(),
            auto_speedtest: self.auto_speedtest,
        }
    }
}

struct TimerHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Timers {
    full: Option<TimerHandle>,
    fast: Option<TimerHandle>,
    auto: Option<TimerHandle>,
}

impl Timers {
    fn take_all(&mut self) -> Vec<TimerHandle> {
        [self.full.take(), self.fast.take(), self.auto.take()]
            .into_iter()
            .flatten()
            .collect()
    }
}

// ── Monitor ──────────────────────────────────────────────────────

/// The entry point for consumers.
///
/// Cheaply cloneable via `Arc<MonitorInner>`. Build with
/// [`new()`](Self::new), then [`start()`](Self::start) to run the initial
/// poll and spawn the timers.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    config: Mutex<MonitorConfig>,
    connection: Mutex<Arc<Connection>>,
    generation: AtomicU64,
    gate: InFlightGate,
    state: Mutex<CoreState>,
    snapshot_tx: watch::Sender<Arc<MonitorSnapshot>>,
    event_tx: broadcast::Sender<SpeedtestEvent>,
    cancel: CancellationToken,
    timers: Mutex<Timers>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    shutting_down: AtomicBool,
}

impl Monitor {
    /// Validate `config` and build the HTTP client. Does not touch the network.
    pub fn new(config: MonitorConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let client = build_client(&config)?;
        let state = CoreState::new(&config, Some(client.base_url().to_string()));
        let (snapshot_tx, _) = watch::channel(Arc::new(state.snapshot()));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(MonitorInner {
                connection: Mutex::new(Arc::new(Connection {
                    client,
                    site: config.site.clone(),
                    generation: 0,
                })),
                config: Mutex::new(config),
                generation: AtomicU64::new(0),
                gate: InFlightGate::new(),
                state: Mutex::new(state),
                snapshot_tx,
                event_tx,
                cancel: CancellationToken::new(),
                timers: Mutex::new(Timers::default()),
                task_handles: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
            }),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the first full poll and spawn the timers.
    ///
    /// Setup failures (bad key, no gateway, unreachable console) are
    /// returned here; later tick failures only mark the state stale.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.ensure_running()?;
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("monitor already started");
            return Ok(());
        }

        if let Err(e) = self.poll(PollKind::Full, GateMode::Wait).await {
            self.inner.started.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let config = self.inner.config.lock().await.clone();
        let mut timers = self.inner.timers.lock().await;
        timers.fast = Some(self.spawn_poll_timer(PollKind::Fast, config.fast_interval, true));
        timers.full = Some(self.spawn_poll_timer(PollKind::Full, config.full_interval, false));
        if config.auto_speedtest {
            timers.auto = Some(self.spawn_auto_timer(config.auto_speedtest_interval));
        }

        info!(
            host = %config.host,
            site = %config.site,
            full_secs = config.full_interval.as_secs_f64(),
            fast_secs = config.fast_interval.as_secs_f64(),
            auto_speedtest = config.auto_speedtest,
            "monitor started"
        );
        Ok(())
    }

    /// Stop every timer and background task.
    ///
    /// Calls already on the wire finish, but their results are discarded.
    /// Idempotent.
    pub async fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.gate.close();

        let timers = self.inner.timers.lock().await.take_all();
        for timer in timers {
            let _ = timer.handle.await;
        }
        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        info!("monitor shut down");
    }

    /// Apply new settings, restarting only the timers they affect.
    ///
    /// A new host, site, key, or TLS policy rebuilds the client and restarts
    /// every timer; a new host or site also forgets the previous gateway.
    pub async fn update_config(&self, new: MonitorConfig) -> Result<(), CoreError> {
        new.validate()?;
        self.ensure_running()?;

        let mut config = self.inner.config.lock().await;
        let old = config.clone();
        let reconnect = !old.same_connection(&new);
        let retarget = !old.same_target(&new);

        let mut management_url = None;
        if reconnect {
            let client = build_client(&new)?;
            management_url = Some(client.base_url().to_string());
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *self.inner.connection.lock().await = Arc::new(Connection {
                client,
                site: new.site.clone(),
                generation,
            });
        }

        {
            let mut state = self.inner.state.lock().await;
            if retarget {
                // The running session targets the old gateway; end it before
                // forgetting it so waiters see an outcome.
                let abandoned = state.speedtest.abandon("configuration changed");
                *state = CoreState::new(&new, management_url);
                if let Some(event) = abandoned {
                    let _ = self.inner.event_tx.send(event);
                }
            } else {
                state.speedtest.set_timeout(new.speedtest_timeout);
                state.auto_speedtest = new.auto_speedtest;
                if let Some(url) = management_url {
                    state.device.identity.management_url = Some(url);
                }
            }
            self.publish(&state);
        }

        *config = new.clone();
        drop(config);

        if self.inner.started.load(Ordering::SeqCst) {
            self.restart_timers(&old, &new, reconnect).await;
        }

        info!(reconnect, retarget, "monitor configuration updated");
        Ok(())
    }

    /// Runtime switch for the automatic speedtest timer.
    pub async fn set_auto_speedtest(&self, enabled: bool) -> Result<(), CoreError> {
        let mut config = self.config().await;
        config.auto_speedtest = enabled;
        self.update_config(config).await
    }

    /// One trial full fetch with `config`, independent of any running monitor.
    pub async fn validate_settings(config: &MonitorConfig) -> Result<GatewayIdentity, CoreError> {
        config.validate()?;
        let client = build_client(config)?;
        let device = client.fetch_full_device_stats(&config.site).await?;
        let report = DeviceReport::from(&device);
        debug!(mac = ?report.mac, model = ?report.model, "settings validated");
        Ok(GatewayIdentity {
            mac: report.mac,
            model: report.model,
            firmware_version: report.firmware_version,
            name: report.name,
            management_url: Some(client.base_url().to_string()),
        })
    }

    // ── Observation ──────────────────────────────────────────────

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<MonitorSnapshot> {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.snapshot_tx.subscribe())
    }

    pub fn speedtest_events(&self) -> broadcast::Receiver<SpeedtestEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn speedtest_status(&self) -> SpeedtestStatus {
        self.snapshot().speedtest.clone()
    }

    pub async fn config(&self) -> MonitorConfig {
        self.inner.config.lock().await.clone()
    }

    // ── Operations ───────────────────────────────────────────────

    /// One fast and one full poll, out of band. Waits for the gate.
    pub async fn refresh_now(&self) -> Result<(), CoreError> {
        let first = self.poll(PollKind::Fast, GateMode::Wait).await?;
        // A fast poll without a known MAC already ran as a full one.
        let second = match first {
            Some(PollKind::Full) => PollKind::Fast,
            _ => PollKind::Full,
        };
        self.poll(second, GateMode::Wait).await.map(drop)
    }

    /// Trigger a speedtest on behalf of a user.
    ///
    /// Returns once the gateway acknowledged the command; completion arrives
    /// as a [`SpeedtestEvent`] and in the published snapshot.
    pub async fn trigger_speedtest_manually(&self) -> Result<(), CoreError> {
        self.trigger_speedtest(TriggerOrigin::Manual).await
    }

    /// Trigger a speedtest and wait for its result.
    pub async fn run_speedtest(&self) -> Result<SpeedtestResult, CoreError> {
        let mut events = self.speedtest_events();
        self.trigger_speedtest_manually().await?;

        loop {
            let event = tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => return Err(CoreError::ShutDown),
                event = events.recv() => event,
            };
            match event {
                Ok(SpeedtestEvent::Completed(result)) => return Ok(result),
                Ok(SpeedtestEvent::TimedOut { after_secs, .. }) => {
                    return Err(CoreError::SpeedtestTimedOut { after_secs });
                }
                Ok(SpeedtestEvent::Failed { reason, .. }) => {
                    return Err(CoreError::Unexpected { message: reason });
                }
                Ok(SpeedtestEvent::Started { .. }) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Err(CoreError::ShutDown),
            }
        }
    }

    async fn trigger_speedtest(&self, origin: TriggerOrigin) -> Result<(), CoreError> {
        self.ensure_running()?;

        let mac = match self.known_mac().await {
            Some(mac) => mac,
            None => {
                self.poll(PollKind::Full, GateMode::Wait).await?;
                match self.known_mac().await {
                    Some(mac) => mac,
                    None => {
                        let site = self.inner.connection.lock().await.site.clone();
                        return Err(CoreError::NoGatewayFound { site });
                    }
                }
            }
        };

        let deadline = {
            let mut state = self.inner.state.lock().await;
            self.ensure_running()?;
            let baseline = state.device.uplink.speedtest.last_run;
            let started = state.speedtest.begin(origin, baseline, Instant::now())?;
            let deadline = state.speedtest.deadline();
            self.publish(&state);
            let _ = self.inner.event_tx.send(started);
            deadline
        };
        if let Some(deadline) = deadline {
            self.spawn_watchdog(deadline).await;
        }

        let conn = Arc::clone(&*self.inner.connection.lock().await);
        let outcome = match self.inner.gate.enter().await {
            Ok(_permit) => conn
                .client
                .trigger_speedtest(&conn.site, &mac)
                .await
                .map_err(CoreError::from),
            Err(e) => Err(e),
        };

        let mut state = self.inner.state.lock().await;
        if self.is_shutting_down() {
            debug!(%origin, "discarding speedtest trigger outcome after shutdown");
            return Err(CoreError::ShutDown);
        }
        match outcome {
            Ok(ack) => {
                if state.speedtest.acknowledge() {
                    debug!(?ack, %origin, "speedtest command accepted");
                    self.publish(&state);
                }
                drop(state);
                self.spawn_followup_cycle().await;
                Ok(())
            }
            Err(e) => {
                if let Some(event) = state.speedtest.fail(e.to_string()) {
                    self.publish(&state);
                    let _ = self.inner.event_tx.send(event);
                }
                Err(e)
            }
        }
    }

    // ── Polling ──────────────────────────────────────────────────

    /// Issue one poll and fold its result into the state.
    ///
    /// Returns the kind that actually ran, or `None` when a `Skip` tick
    /// found the gate held.
    async fn poll(&self, kind: PollKind, mode: GateMode) -> Result<Option<PollKind>, CoreError> {
        let _permit = match mode {
            GateMode::Skip => {
                let Some(permit) = self.inner.gate.try_enter() else {
                    debug!(%kind, "request in flight, skipping tick");
                    return Ok(None);
                };
                permit
            }
            GateMode::Wait => self.inner.gate.enter().await?,
        };
        self.ensure_running()?;

        let conn = Arc::clone(&*self.inner.connection.lock().await);
        let mac = self.known_mac().await;

        let (ran, fetched) = match (kind, mac) {
            (PollKind::Fast, Some(mac)) => (
                PollKind::Fast,
                conn.client.fetch_gateway_stats(&conn.site, &mac).await,
            ),
            _ => (
                PollKind::Full,
                conn.client.fetch_full_device_stats(&conn.site).await,
            ),
        };
        let outcome = fetched
            .map(|device| DeviceReport::from(&device))
            .map_err(CoreError::from);

        self.apply(ran, conn.generation, outcome).await?;
        Ok(Some(ran))
    }

    async fn apply(
        &self,
        kind: PollKind,
        generation: u64,
        outcome: Result<DeviceReport, CoreError>,
    ) -> Result<(), CoreError> {
        let mut state = self.inner.state.lock().await;
        if self.is_shutting_down() {
            debug!(%kind, "discarding poll result after shutdown");
            return Err(CoreError::ShutDown);
        }
        if generation != self.inner.generation.load(Ordering::SeqCst) {
            debug!(%kind, "discarding poll result from previous connection");
            return Ok(());
        }

        let now = Utc::now();
        let mut events = Vec::new();
        let result = match outcome {
            Ok(report) => {
                let (full, fast) = match kind {
                    PollKind::Full => (Some(&report), None),
                    PollKind::Fast => (None, Some(&report)),
                };
                state.device = merge(&state.device, full, fast, now);
                state.health.record_success(now);

                let event = match report.speedtest() {
                    Some(figures) => {
                        let event = state.speedtest.observe(figures, Instant::now());
                        if matches!(event, Some(SpeedtestEvent::Completed(_))) {
                            state.device.uplink.speedtest = figures.clone();
                        }
                        event
                    }
                    None => state.speedtest.check_deadline(Instant::now()),
                };
                events.extend(event);
                debug!(%kind, "poll merged");
                Ok(())
            }
            Err(e) => {
                warn!(%kind, error = %e, "poll failed, keeping last known state");
                state.health.record_failure(&e);
                events.extend(state.speedtest.check_deadline(Instant::now()));
                Err(e)
            }
        };

        state.active_wan = resolve(&state.device);
        self.publish(&state);
        for event in events {
            let _ = self.inner.event_tx.send(event);
        }
        result
    }

    async fn check_speedtest_deadline(&self) {
        let mut state = self.inner.state.lock().await;
        if self.is_shutting_down() {
            return;
        }
        if let Some(event) = state.speedtest.check_deadline(Instant::now()) {
            self.publish(&state);
            let _ = self.inner.event_tx.send(event);
        }
    }

    // ── Background tasks ─────────────────────────────────────────

    fn spawn_poll_timer(&self, kind: PollKind, period: Duration, immediate: bool) -> TimerHandle {
        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(poll_task(self.clone(), kind, period, immediate, cancel.clone()));
        TimerHandle { cancel, handle }
    }

    fn spawn_auto_timer(&self, period: Duration) -> TimerHandle {
        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(auto_speedtest_task(self.clone(), period, cancel.clone()));
        TimerHandle { cancel, handle }
    }

    async fn spawn_watchdog(&self, deadline: Instant) {
        let monitor = self.clone();
        let cancel = self.inner.cancel.clone();
        self.track(tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep_until(deadline) => monitor.check_speedtest_deadline().await,
            }
        }))
        .await;
    }

    /// Out-of-band fast+full cycle after a speedtest ack.
    async fn spawn_followup_cycle(&self) {
        if self.is_shutting_down() {
            return;
        }
        let monitor = self.clone();
        let cancel = self.inner.cancel.clone();
        self.track(tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                result = monitor.refresh_now() => {
                    if let Err(e) = result {
                        debug!(error = %e, "post-speedtest refresh failed");
                    }
                }
            }
        }))
        .await;
    }

    async fn track(&self, handle: JoinHandle<()>) {
        let mut handles = self.inner.task_handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    async fn restart_timers(&self, old: &MonitorConfig, new: &MonitorConfig, reconnect: bool) {
        let mut timers = self.inner.timers.lock().await;
        let mut replaced = Vec::new();

        if reconnect || old.fast_interval != new.fast_interval {
            replaced.extend(timers.fast.take());
            timers.fast = Some(self.spawn_poll_timer(PollKind::Fast, new.fast_interval, true));
            debug!(secs = new.fast_interval.as_secs_f64(), "fast poll timer restarted");
        }
        if reconnect || old.full_interval != new.full_interval {
            replaced.extend(timers.full.take());
            timers.full = Some(self.spawn_poll_timer(PollKind::Full, new.full_interval, reconnect));
            debug!(secs = new.full_interval.as_secs_f64(), "full poll timer restarted");
        }
        let auto_changed = old.auto_speedtest != new.auto_speedtest
            || old.auto_speedtest_interval != new.auto_speedtest_interval;
        if reconnect || auto_changed {
            replaced.extend(timers.auto.take());
            if new.auto_speedtest {
                timers.auto = Some(self.spawn_auto_timer(new.auto_speedtest_interval));
            }
            debug!(enabled = new.auto_speedtest, "auto speedtest timer updated");
        }
        drop(timers);

        // Replaced timers may be mid-call; shutdown still awaits them.
        for timer in replaced {
            timer.cancel.cancel();
            self.track(timer.handle).await;
        }
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn publish(&self, state: &CoreState) {
        self.inner.snapshot_tx.send_replace(Arc::new(state.snapshot()));
    }

    async fn known_mac(&self) -> Option<String> {
        self.inner.state.lock().await.device.identity.mac.clone()
    }

    fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), CoreError> {
        if self.is_shutting_down() {
            Err(CoreError::ShutDown)
        } else {
            Ok(())
        }
    }
}

fn build_client(config: &MonitorConfig) -> Result<GatewayClient, CoreError> {
    Ok(GatewayClient::new(
        config.host.trim(),
        &config.api_key,
        &config.transport(),
    )?)
}

// ── Timer tasks ──────────────────────────────────────────────────

async fn poll_task(
    monitor: Monitor,
    kind: PollKind,
    period: Duration,
    immediate: bool,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    if !immediate {
        interval.tick().await; // consume the immediate first tick
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                // Failures are logged and recorded in the snapshot by `apply`.
                if let Err(CoreError::ShutDown) = monitor.poll(kind, GateMode::Skip).await {
                    break;
                }
            }
        }
    }
}

async fn auto_speedtest_task(monitor: Monitor, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match monitor.trigger_speedtest(TriggerOrigin::Automatic).await {
                    Ok(()) => {}
                    Err(CoreError::AlreadyRunning) => {
                        debug!("speedtest already running, skipping automatic trigger");
                    }
                    Err(CoreError::ShutDown) => break,
                    Err(e) => warn!(error = %e, "automatic speedtest failed"),
                }
            }
        }
    }
}
