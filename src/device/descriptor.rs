use std::{fmt, path::PathBuf, str::FromStr};

use crate::error::Error;

/// Baud rate used when the serial descriptor does not specify one
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// [SourceDescriptor] designates the byte source a session is attached to.
/// Exactly one medium is described, there is no way to build a descriptor
/// that holds both a serial port and a network address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// Serial device, for example /dev/ttyUSB0 or COM4
    Serial { port: String, baud_rate: u32 },

    /// TCP stream to a remote host
    Network { host: String, port: u16 },

    /// Recorded stream, replayed once.
    /// Files terminated by ".gz" are gzip decompressed on the fly.
    File { path: PathBuf },
}

impl SourceDescriptor {
    pub fn serial(port: &str, baud_rate: u32) -> Self {
        Self::Serial {
            port: port.to_string(),
            baud_rate,
        }
    }

    pub fn network(host: &str, port: u16) -> Self {
        Self::Network {
            host: host.to_string(),
            port,
        }
    }

    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self::File { path: path.into() }
    }

    /// True for media that reach an end (files)
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::File { .. })
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { port, baud_rate } => write!(f, "{}@{}", port, baud_rate),
            Self::Network { host, port } => {
                if host.contains(':') {
                    write!(f, "tcp://[{}]:{}", host, port)
                } else {
                    write!(f, "tcp://{}:{}", host, port)
                }
            },
            Self::File { path } => write!(f, "file://{}", path.display()),
        }
    }
}

fn parse_host_port(s: &str) -> Option<(String, u16)> {
    let (host, port) = s.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;

    let host = host.trim_start_matches('[').trim_end_matches(']');

    if host.is_empty() {
        None
    } else {
        Some((host.to_string(), port))
    }
}

impl FromStr for SourceDescriptor {
    type Err = Error;

    /// Parses
    /// - "tcp://host:port" or "host:port": [SourceDescriptor::Network]
    /// - "file://path": [SourceDescriptor::File]
    /// - "port" or "port@baud": [SourceDescriptor::Serial]
    ///
    /// "udp://" is identified but rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() {
            return Err(Error::InvalidDescriptor(s.to_string()));
        }

        if let Some(address) = s.strip_prefix("udp://") {
            return Err(Error::UnsupportedTransport(format!("udp://{}", address)));
        }

        if let Some(address) = s.strip_prefix("tcp://") {
            let (host, port) =
                parse_host_port(address).ok_or(Error::InvalidDescriptor(s.to_string()))?;
            return Ok(Self::Network { host, port });
        }

        if let Some(path) = s.strip_prefix("file://") {
            if path.is_empty() {
                return Err(Error::InvalidDescriptor(s.to_string()));
            }
            return Ok(Self::file(path));
        }

        // device paths never look like host:port
        if !s.starts_with('/') {
            if let Some((host, port)) = parse_host_port(s) {
                return Ok(Self::Network { host, port });
            }
        }

        match s.rsplit_once('@') {
            Some((port, baud)) => {
                let baud_rate = baud
                    .parse::<u32>()
                    .map_err(|_| Error::InvalidDescriptor(s.to_string()))?;

                if port.is_empty() || baud_rate == 0 {
                    return Err(Error::InvalidDescriptor(s.to_string()));
                }

                Ok(Self::serial(port, baud_rate))
            },
            None => Ok(Self::serial(s, DEFAULT_BAUD_RATE)),
        }
    }
}
