/// Errors that can occur while encoding packets or pumping the framer.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Appending the byte would exceed the 255-byte wire content limit.
    #[error("packet content full ({len} bytes, max {max})")]
    PacketTooBig { len: usize, max: usize },

    /// Transport-level failure while reading or writing frames.
    #[error("transport error: {0}")]
    Transport(#[from] replink_transport::TransportError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
