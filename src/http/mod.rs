//! HTTP plumbing
//!
//! Scheme/port resolution and the transport that carries probe bodies to
//! the target.

mod protocol;
mod transport;

pub use protocol::Protocol;
pub use transport::{HttpTransport, Transport, TransportConfig, TransportRequest, TransportResponse};
