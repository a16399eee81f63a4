//! Error types shared by the configuration, transport and codec layers.

use std::fmt;
use std::io;

/// Everything that can go wrong outside of the protocol state machine itself.
///
/// Protocol-level outcomes (timeout, no-majority, malformed frame) are modeled as
/// ordinary return values rather than errors, per the error handling policy: only
/// conditions a node cannot recover from on its own surface here.
#[derive(Debug)]
pub enum PaxosError {
    /// Failed to bind the node's datagram endpoint.
    Bind(io::Error),
    /// A `send` call failed at the OS level (e.g. destination unreachable).
    Send(io::Error),
    /// Configuration could not be parsed or failed validation (e.g. even `TOTAL_PROCESSOS_NUM`).
    Config(String),
}

impl fmt::Display for PaxosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaxosError::Bind(e) => write!(f, "could not bind node endpoint: {}", e),
            PaxosError::Send(e) => write!(f, "could not send message: {}", e),
            PaxosError::Config(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for PaxosError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PaxosError::Bind(e) | PaxosError::Send(e) => Some(e),
            PaxosError::Config(_) => None,
        }
    }
}
