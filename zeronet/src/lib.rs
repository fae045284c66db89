//! Zeronet stations.
//!
//! Stations exchange self-describing multi-part messages (see
//! [`zeronet_wire`]) over a message transport. This crate manages socket
//! lifecycles, performs requests with bounded retries, and implements
//! publish/subscribe through a relay station.
//!
//! ```text
//!   station ──REQ──▶ relay ──PUB──▶ subscribers
//!           ◀─ack──
//! ```
#![cfg_attr(not(test), warn(clippy::unwrap_used))]

pub extern crate zeronet_wire as wire;

pub mod call;
pub mod config;
pub mod context;
#[cfg(feature = "logger")]
pub mod logger;
pub mod pubsub;
pub mod socket;
pub mod transport;

pub use call::Retry;
pub use config::Config;
pub use context::Context;
pub use socket::{Handle, OptionSet, Role};
pub use transport::{Socket, SocketKind, SocketOption, Transport};
pub use wire::{Message, PublishItem, ResultData, State, Tag};
