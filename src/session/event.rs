use crate::{
    decoder::{DecodedMessage, FrameWarning},
    error::Error,
};

/// Notifications forwarded to the session owner
#[derive(Debug)]
pub enum Event {
    /// New message was decoded
    Message(DecodedMessage),

    /// Frame was rejected, decoding carries on
    Warning(FrameWarning),

    /// Connection reached its end. The partially assembled frame, if any, is dropped.
    EndOfStream {
        name: String,
        /// Stream offset at which the connection ended
        offset: u64,
        /// Size of the dropped partial frame
        discarded: usize,
    },

    /// Fatal error, the session is torn down
    Error {
        name: String,
        /// Stream offset at the time of the error
        offset: u64,
        error: Error,
    },
}

impl Event {
    /// True for events that terminate the session
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EndOfStream { .. } | Self::Error { .. })
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(msg) => write!(f, "{}", msg),
            Self::Warning(warning) => write!(f, "warning: {}", warning),
            Self::EndOfStream {
                name,
                offset,
                discarded,
            } => {
                write!(f, "{} - end of stream at byte offset {}", name, offset)?;
                if *discarded > 0 {
                    write!(f, " ({} bytes of incomplete frame dropped)", discarded)?;
                }
                Ok(())
            },
            Self::Error {
                name,
                offset,
                error,
            } => write!(f, "{} - error at byte offset {}: {}", name, offset, error),
        }
    }
}
