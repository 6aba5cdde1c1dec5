//! Host-Side Components
//!
//! The transports that reach the grading service and the client façade
//! that submits work and polls for reports.

pub mod client;
pub mod transport;

pub use client::GradingClient;
pub use transport::{EndpointConfig, HttpTransport, MockTransport, Transport, TransportError};
