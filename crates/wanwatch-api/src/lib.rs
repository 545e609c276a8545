// wanwatch-api: Async client for the UniFi Network legacy device endpoints.
//
// Three operations are exposed: the full `stat/device` listing, the
// single-gateway `stat/device/<mac>` fetch, and the `cmd/devmgr` speedtest
// command. Everything else about the console is out of scope here.

pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod transport;

pub use client::GatewayClient;
pub use devices::{Ack, GATEWAY_TYPES, select_gateway};
pub use error::Error;
pub use models::{GatewayDevice, Ipv6Field, UplinkStats, WanStats};
pub use transport::{TlsMode, TransportConfig};
