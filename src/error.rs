//! Error handling for the Moim attendance core

use std::fmt;
use thiserror::Error;

/// Unified error type over the member crates
#[derive(Error, Debug)]
pub enum Error {
    /// Wire codec errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] moim_protocol::ProtocolError),

    /// Proximity transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] moim_proximity::TransportError),

    /// Document store errors
    #[error("Store error: {0}")]
    Store(#[from] moim_store::StoreError),

    /// Attendance commit errors
    #[error("Attendance error: {0}")]
    Attendance(#[from] moim_attendance::AttendanceError),

    /// Settlement job errors
    #[error("Settlement error: {0}")]
    Settlement(#[from] moim_settlement::SettlementError),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }
}
