// wanwatch-core: State reconciliation between wanwatch-api and consumers (CLI).

pub mod config;
pub mod convert;
pub mod error;
pub mod gate;
pub mod merge;
pub mod model;
pub mod monitor;
pub mod resolver;
pub mod speedtest;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_SPEEDTEST_TIMEOUT, MonitorConfig, TlsVerification};
pub use convert::DeviceReport;
pub use error::CoreError;
pub use gate::InFlightGate;
pub use merge::merge;
pub use monitor::{Monitor, PollKind};
pub use resolver::resolve;
pub use speedtest::{SpeedtestOrchestrator, SpeedtestSession};
pub use stream::{SnapshotStream, SnapshotWatchStream};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Device state
    DeviceState, GatewayIdentity, SpeedtestFigures, Uplink, WanLayout, WanSection, WanSlot,
    // Derived facts
    ActiveWanId, ActiveWanResult, MatchReason,
    // Speedtest
    SessionState, SpeedtestEvent, SpeedtestResult, SpeedtestStatus, TriggerOrigin,
    // Published state
    MonitorSnapshot, PollHealth,
    bytes_to_mbps,
};
