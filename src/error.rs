use thiserror::Error as ThisError;

/// Errors raised by the transport and the [crate::Session] lifecycle.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Device or socket could not be opened
    #[error("failed to connect to {name}: {cause}")]
    Connection { name: String, cause: String },

    /// Hard read/write failure mid-stream
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection, device was removed or file was consumed
    #[error("end of stream")]
    EndOfStream,

    #[error("session is already running")]
    AlreadyRunning,

    #[error("session is not running")]
    NotRunning,

    /// Connection was already closed
    #[error("not connected")]
    NotConnected,

    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),

    #[error("invalid source descriptor \"{0}\"")]
    InvalidDescriptor(String),
}

pub type Result<T> = std::result::Result<T, Error>;

// io::Error is not Clone: kind and message are preserved
impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Self::Connection { name, cause } => Self::Connection {
                name: name.clone(),
                cause: cause.clone(),
            },
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
            Self::EndOfStream => Self::EndOfStream,
            Self::AlreadyRunning => Self::AlreadyRunning,
            Self::NotRunning => Self::NotRunning,
            Self::NotConnected => Self::NotConnected,
            Self::UnsupportedTransport(s) => Self::UnsupportedTransport(s.clone()),
            Self::InvalidDescriptor(s) => Self::InvalidDescriptor(s.clone()),
        }
    }
}
