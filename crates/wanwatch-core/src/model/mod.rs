// ── Domain model ──
//
// Normalized types consumers see. Nothing here knows about HTTP or the
// vendor's JSON field names.

pub mod active_wan;
pub mod device;
pub mod snapshot;
pub mod speedtest;

pub use active_wan::{ActiveWanId, ActiveWanResult, MatchReason};
pub use device::{
    DeviceState, GatewayIdentity, SpeedtestFigures, Uplink, WanLayout, WanSection, WanSlot,
    bytes_to_mbps,
};
pub use snapshot::{MonitorSnapshot, PollHealth};
pub use speedtest::{
    SessionState, SpeedtestEvent, SpeedtestResult, SpeedtestStatus, TriggerOrigin,
};
