// ── Speedtest orchestrator ──
//
// State machine for one gateway's speedtest:
//
//   Idle -> Triggered -> Polling -> Completed -> Idle
//                |           `-> TimedOut  -> Idle
//                `-> Failed -> Idle
//
// Pure: callers pass the current `Instant` and poll figures in, and receive
// the `SpeedtestEvent` to broadcast. The `Monitor` owns the async driving.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{
    SessionState, SpeedtestEvent, SpeedtestFigures, SpeedtestResult, SpeedtestStatus,
    TriggerOrigin,
};

/// The one speedtest currently in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedtestSession {
    pub origin: TriggerOrigin,
    pub triggered_at: Instant,
    pub deadline: Instant,
    /// `speedtest_lastrun` seen at trigger time; a larger value means done.
    pub baseline_last_run: i64,
}

#[derive(Debug, Clone)]
pub struct SpeedtestOrchestrator {
    state: SessionState,
    session: Option<SpeedtestSession>,
    timeout: Duration,
    last_outcome: Option<SessionState>,
    last_result: Option<SpeedtestResult>,
    /// Highest `speedtest_lastrun` seen in any poll, full or fast.
    latest_last_run: Option<i64>,
}

impl SpeedtestOrchestrator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: SessionState::Idle,
            session: None,
            timeout,
            last_outcome: None,
            last_result: None,
            latest_last_run: None,
        }
    }

    /// Applies to sessions started after the call.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn in_progress(&self) -> bool {
        self.state.is_in_progress()
    }

    pub fn session(&self) -> Option<&SpeedtestSession> {
        self.session.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.session.as_ref().map(|s| s.deadline)
    }

    /// Terminal state the most recent session passed through.
    pub fn last_outcome(&self) -> Option<SessionState> {
        self.last_outcome
    }

    pub fn last_result(&self) -> Option<&SpeedtestResult> {
        self.last_result.as_ref()
    }

    pub fn status(&self) -> SpeedtestStatus {
        SpeedtestStatus {
            state: self.state,
            in_progress: self.in_progress(),
            origin: self.session.as_ref().map(|s| s.origin),
            last_result: self.last_result.clone(),
        }
    }

    /// Open a session. Fails with `AlreadyRunning` unless idle; the running
    /// session is left untouched.
    ///
    /// The baseline is the larger of `baseline_last_run` and the newest
    /// timestamp any poll has reported.
    pub fn begin(
        &mut self,
        origin: TriggerOrigin,
        baseline_last_run: Option<i64>,
        now: Instant,
    ) -> Result<SpeedtestEvent, CoreError> {
        if self.state != SessionState::Idle {
            return Err(CoreError::AlreadyRunning);
        }
        let baseline_last_run = baseline_last_run
            .max(self.latest_last_run)
            .unwrap_or(0);
        self.session = Some(SpeedtestSession {
            origin,
            triggered_at: now,
            deadline: now + self.timeout,
            baseline_last_run,
        });
        self.state = SessionState::Triggered;
        info!(%origin, baseline_last_run, "speedtest triggered");
        Ok(SpeedtestEvent::Started { origin })
    }

    /// The gateway accepted the command. Returns `false` if no session was
    /// waiting for an ack (e.g. it already timed out).
    pub fn acknowledge(&mut self) -> bool {
        if self.state != SessionState::Triggered {
            return false;
        }
        self.state = SessionState::Polling;
        debug!("speedtest acknowledged, polling for completion");
        true
    }

    /// The trigger command failed.
    pub fn fail(&mut self, reason: impl Into<String>) -> Option<SpeedtestEvent> {
        if self.state != SessionState::Triggered {
            return None;
        }
        let origin = self.session.as_ref()?.origin;
        let reason = reason.into();
        warn!(%origin, %reason, "speedtest trigger failed");
        self.finish(SessionState::Failed);
        Some(SpeedtestEvent::Failed { origin, reason })
    }

    /// Inspect one poll outcome for completion.
    pub fn observe(&mut self, figures: &SpeedtestFigures, now: Instant) -> Option<SpeedtestEvent> {
        self.latest_last_run = self.latest_last_run.max(figures.last_run);
        if let Some(event) = self.check_deadline(now) {
            return Some(event);
        }
        if self.state != SessionState::Polling {
            return None;
        }
        let session = self.session.as_ref()?;
        let last_run = figures.last_run?;
        if last_run <= session.baseline_last_run {
            return None;
        }

        let result = SpeedtestResult {
            origin: session.origin,
            download_mbps: figures.download_mbps,
            upload_mbps: figures.upload_mbps,
            ping_ms: figures.ping_ms,
            last_run,
            last_run_at: figures.last_run_at(),
        };
        info!(
            origin = %result.origin,
            download = ?result.download_mbps,
            upload = ?result.upload_mbps,
            ping = ?result.ping_ms,
            "speedtest completed"
        );
        self.last_result = Some(result.clone());
        self.finish(SessionState::Completed);
        Some(SpeedtestEvent::Completed(result))
    }

    /// End a running session that can no longer complete.
    pub fn abandon(&mut self, reason: impl Into<String>) -> Option<SpeedtestEvent> {
        if !self.in_progress() {
            return None;
        }
        let origin = self.session.as_ref()?.origin;
        let reason = reason.into();
        warn!(%origin, %reason, "speedtest abandoned");
        self.finish(SessionState::Failed);
        Some(SpeedtestEvent::Failed { origin, reason })
    }

    /// Time out the session if its deadline has passed.
    pub fn check_deadline(&mut self, now: Instant) -> Option<SpeedtestEvent> {
        if !self.in_progress() {
            return None;
        }
        let session = self.session.as_ref()?;
        if now < session.deadline {
            return None;
        }
        let origin = session.origin;
        let after_secs = self.timeout.as_secs();
        warn!(%origin, after_secs, "speedtest timed out");
        self.finish(SessionState::TimedOut);
        Some(SpeedtestEvent::TimedOut { origin, after_secs })
    }

    /// Drop any session without reporting it.
    pub fn reset(&mut self) {
        self.session = None;
        self.state = SessionState::Idle;
    }

    fn finish(&mut self, outcome: SessionState) {
        self.state = outcome;
        self.last_outcome = Some(outcome);
        self.reset();
    }
}

impl Default for SpeedtestOrchestrator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SPEEDTEST_TIMEOUT)
    }
}
