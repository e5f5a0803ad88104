use flate2::read::GzDecoder;
use serialport::SerialPort;

use std::{
    fs::File,
    io::Read,
    net::{Shutdown, TcpStream},
};

/// [Interface] to the RTCM stream
pub enum Interface {
    /// [Interface::ReadOnly] is dedicated to read only input,
    /// mainly File inputs (stream replay).
    ReadOnly(Box<dyn Read + Send>),

    /// [Interface::Port] is used to connect to a physical port.
    Port(Box<dyn SerialPort>),

    /// [Interface::Tcp] stream socket
    Tcp(TcpStream),
}

impl Interface {
    /// Creates a new [SerialPort] interface
    pub fn from_serial_port(port: Box<dyn SerialPort>) -> Self {
        Self::Port(port)
    }

    /// Creates a new TCP interface
    pub fn from_tcp_stream(stream: TcpStream) -> Self {
        Self::Tcp(stream)
    }

    /// Creates a new Read-Only interface
    pub fn from_file_handle(handle: File) -> Self {
        Self::ReadOnly(Box::new(handle))
    }

    /// Creates a new Read-Only interface, from gzip compressed file.
    pub fn from_gzip_file_handle(handle: File) -> Self {
        Self::ReadOnly(Box::new(GzDecoder::new(handle)))
    }

    /// Releases OS level resources that are not released on drop.
    pub fn shutdown(&mut self) -> std::io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Both),
            _ => Ok(()),
        }
    }
}

impl std::io::Read for Interface {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::ReadOnly(r) => r.read(buf),
            Self::Port(port) => port.read(buf),
            Self::Tcp(stream) => stream.read(buf),
        }
    }
}
