use thiserror::Error;

/// エラー型
///
/// Everything here is non-fatal to the host loop and terminal for the one
/// client exchange it occurred in; there is no built-in retry anywhere.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Proximity radio is disabled")]
    RadioDisabled,

    #[error("Connect permission not granted")]
    PermissionDenied,

    #[error("No paired endpoint advertising the attendance service")]
    HostNotFound,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Payload exceeds {} bytes", moim_protocol::MAX_LINE_BYTES)]
    PayloadTooLarge,

    #[error("Codec error: {0}")]
    Codec(#[from] moim_protocol::ProtocolError),
}
