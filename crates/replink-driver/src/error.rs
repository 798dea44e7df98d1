use replink_frame::ResultCode;

/// Errors that tear down a driver session.
///
/// Every variant is a session-fatal fault: the supervisor answers all of
/// them with the same fail-safe-and-reconnect path.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Transport-level error (I/O failure, device disappearance).
    #[error("transport error: {0}")]
    Transport(#[from] replink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] replink_frame::FrameError),

    /// A packet was delivered with a non-Ok result code.
    #[error("protocol fault: {code:?} (wire value {value})", code = .0, value = .0.value())]
    Protocol(ResultCode),

    /// The pending-handler queue exceeded its ceiling. The bus or the
    /// device is stuck, not making progress.
    #[error("pending queue overflow ({0} handlers outstanding)")]
    QueueOverflow(usize),
}

pub type Result<T> = std::result::Result<T, DriverError>;
