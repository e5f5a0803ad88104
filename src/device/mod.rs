use log::{debug, info};

mod descriptor;
mod interface;

pub use descriptor::{DEFAULT_BAUD_RATE, SourceDescriptor};
pub use interface::Interface;

use std::{
    fs::File,
    io::{ErrorKind, Read},
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use crate::error::{Error, Result};

/// Default read timeout, bounds the latency of a stop request
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on TCP connection establishment
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Lists the serial ports available on this system
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(std::io::Error::from)?;
    Ok(ports.into_iter().map(|info| info.port_name).collect())
}

/// [Device] is the exclusively owned connection to the byte source.
/// It is created by [Device::connect] and released by [Device::close].
pub struct Device {
    name: String,
    interface: Option<Interface>,
}

impl Device {
    /// Opens the connection described by [SourceDescriptor].
    /// Reads are bounded by `read_timeout` (serial and network medium),
    /// no retry is performed at this level.
    pub fn connect(descriptor: &SourceDescriptor, read_timeout: Duration) -> Result<Self> {
        let name = descriptor.to_string();

        let connection_error = |cause: String| Error::Connection {
            name: name.clone(),
            cause,
        };

        let interface = match descriptor {
            SourceDescriptor::Serial { port, baud_rate } => {
                let port = serialport::new(port, *baud_rate)
                    .timeout(read_timeout)
                    .open()
                    .map_err(|e| connection_error(e.to_string()))?;

                Interface::from_serial_port(port)
            },
            SourceDescriptor::Network { host, port } => {
                let addresses = (host.as_str(), *port)
                    .to_socket_addrs()
                    .map_err(|e| connection_error(e.to_string()))?;

                let mut last_error = None;
                let mut stream = None;

                for addr in addresses {
                    debug!("{} - trying {}", name, addr);
                    match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                        Ok(s) => {
                            stream = Some(s);
                            break;
                        },
                        Err(e) => last_error = Some(e),
                    }
                }

                let stream = stream.ok_or_else(|| match last_error {
                    Some(e) => connection_error(e.to_string()),
                    None => connection_error("no address resolved".to_string()),
                })?;

                stream
                    .set_read_timeout(Some(read_timeout))
                    .map_err(|e| connection_error(e.to_string()))?;

                Interface::from_tcp_stream(stream)
            },
            SourceDescriptor::File { path } => {
                let handle = File::open(path).map_err(|e| connection_error(e.to_string()))?;

                if path.extension().is_some_and(|ext| ext == "gz") {
                    Interface::from_gzip_file_handle(handle)
                } else {
                    Interface::from_file_handle(handle)
                }
            },
        };

        info!("{} - connected", name);

        Ok(Self {
            name,
            interface: Some(interface),
        })
    }

    /// Wraps any [Read]er as a read-only [Device].
    /// The reader's end of file is interpreted as end of stream,
    /// [ErrorKind::TimedOut] and [ErrorKind::WouldBlock] as "no data yet".
    pub fn from_reader(name: &str, reader: Box<dyn Read + Send>) -> Self {
        Self {
            name: name.to_string(),
            interface: Some(Interface::ReadOnly(reader)),
        }
    }

    /// Readable name of this connection
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads available bytes, converting timeouts into "No Data Received",
    /// which is most convenient for real-time perpertual hardware application like this one.
    ///
    /// ## Returns
    /// - Ok(0) when no data was received within the read timeout
    /// - Ok(n) with n=number of bytes received
    /// - Err([Error::EndOfStream]) once the peer closed, the device was removed,
    /// or the file was entirely consumed
    /// - Err([Error::Io]) on any other I/O error
    pub fn read(&mut self, output: &mut [u8]) -> Result<usize> {
        let interface = self.interface.as_mut().ok_or(Error::NotConnected)?;

        match interface.read(output) {
            Ok(0) => match interface {
                Interface::Port(_) => Ok(0),
                Interface::Tcp(_) | Interface::ReadOnly(_) => Err(Error::EndOfStream),
            },
            Ok(n) => Ok(n),
            Err(e) => match e.kind() {
                ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => Ok(0),
                ErrorKind::BrokenPipe
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::UnexpectedEof
                | ErrorKind::NotConnected => {
                    debug!("{} - {}", self.name, e);
                    Err(Error::EndOfStream)
                },
                _ => Err(Error::Io(e)),
            },
        }
    }

    /// Releases the connection. Calling this more than once is harmless,
    /// the underlying handle is released exactly once.
    pub fn close(&mut self) {
        if let Some(mut interface) = self.interface.take() {
            if let Err(e) = interface.shutdown() {
                // peer may have closed already
                debug!("{} - shutdown: {}", self.name, e);
            }
            info!("{} - disconnected", self.name);
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.close();
    }
}
