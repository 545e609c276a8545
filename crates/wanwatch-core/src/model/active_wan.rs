// ── Active WAN projection ──

use serde::{Deserialize, Serialize};
use strum::Display;

use super::device::WanSlot;

/// Which WAN link is carrying traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum ActiveWanId {
    #[strum(serialize = "WAN1")]
    #[serde(rename = "WAN1")]
    Wan1,
    #[strum(serialize = "WAN2")]
    #[serde(rename = "WAN2")]
    Wan2,
    #[strum(serialize = "WAN")]
    #[serde(rename = "WAN")]
    Wan,
    #[default]
    #[strum(serialize = "unknown")]
    #[serde(rename = "unknown")]
    Unknown,
}

impl From<WanSlot> for ActiveWanId {
    fn from(slot: WanSlot) -> Self {
        match slot {
            WanSlot::Wan1 => Self::Wan1,
            WanSlot::Wan2 => Self::Wan2,
            WanSlot::Wan => Self::Wan,
        }
    }
}

/// Which heuristic rule produced the answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    #[strum(serialize = "link state")]
    LinkState,
    #[strum(serialize = "ip match")]
    IpMatch,
    #[strum(serialize = "interface match")]
    InterfaceMatch,
    #[strum(serialize = "legacy single-WAN")]
    LegacySingleWan,
    #[default]
    #[strum(serialize = "no signal matched")]
    NoSignal,
}

/// Derived answer to "which WAN is active", recomputed on every merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWanResult {
    pub id: ActiveWanId,
    pub name: Option<String>,
    pub ip: Option<String>,
    pub reason: MatchReason,
}
