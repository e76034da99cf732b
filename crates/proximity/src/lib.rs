//! Proximity attendance transport for the Moim study-group app.
//!
//! A host device opens a discoverable service under a fixed service UUID
//! and accepts one connection at a time; each client discovers the host
//! among its paired endpoints, connects, writes one attendance assertion
//! line, and closes. The exchange is one-directional and fire-and-forget.
//!
//! The platform proximity socket is modeled as a `tokio` TCP stream and
//! the paired-device table as an explicit [`PairedRegistry`], which keeps
//! the host/client state machines and the wire contract intact without a
//! radio stack in the loop.

mod client;
mod error;
mod host;
mod radio;
mod registry;
mod sink;

pub use client::{ClientOptions, ProximityClient};
pub use error::TransportError;
pub use host::{HostOptions, HostState, TransportHost};
pub use radio::{AlwaysOnRadio, RadioAdapter};
pub use registry::{PairedEndpoint, PairedRegistry};
pub use sink::AssertionSink;
