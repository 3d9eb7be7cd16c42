pub mod client;
pub mod config;
pub mod network;
pub mod output;
pub mod panel;
pub mod protocol;
pub mod server;
pub mod transport;
pub mod utils;
pub mod xray;

pub use client::XuiClient;
pub use config::ClientConfig;
#[cfg(any(test, feature = "testing"))]
pub use network::MemoryPanel;
pub use network::{Reply, Transport};
pub use output::{Outcome, OutputFormat, Rendered};
pub use protocol::{InboundConfig, Outbound, OutboundConfig, Protocol};
pub use utils::error::{Result, XuiError};
