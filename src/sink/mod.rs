use std::{
    fs::{File, create_dir_all},
    io::Write,
    path::{Path, PathBuf},
};

use hifitime::Epoch;
use log::debug;
use serde_json::json;

mod fd;
mod settings;

use fd::FileDescriptor;
pub use settings::{Format, Settings};

use crate::{decoder::DecodedMessage, error::Result, runtime::Runtime};

/// [LogSink] is the append-only, newline delimited session log.
/// Each record is flushed right away, so content survives abrupt termination.
pub struct LogSink {
    path: PathBuf,
    format: Format,
    fd: FileDescriptor,
    records: u64,
}

impl LogSink {
    /// Creates (truncates) the log file, and its parent directories when missing.
    /// Paths terminated by ".gz" are gzip compressed.
    pub fn create<P: AsRef<Path>>(path: P, format: Format) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                create_dir_all(parent)?;
                debug!("created \"{}\"", parent.display());
            }
        }

        let gzip = path.extension().is_some_and(|ext| ext == "gz");
        let fd = FileDescriptor::new(gzip, File::create(&path)?);

        debug!("logging to \"{}\"", path.display());

        Ok(Self {
            path,
            format,
            fd,
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    fn append(&mut self, line: &str) -> Result<()> {
        self.fd.write_all(line.as_bytes())?;
        self.fd.write_all(b"\n")?;
        self.fd.flush()?;
        self.records += 1;
        Ok(())
    }

    pub fn message(&mut self, msg: &DecodedMessage) -> Result<()> {
        let line = match self.format {
            Format::Text => format!("{} @{} {}", msg.received, msg.offset, msg),
            Format::Json => json!({
                "received": msg.received.to_string(),
                "offset": msg.offset,
                "type": msg.message_type,
                "description": msg.description(),
                "length": msg.length,
                "body": msg.body,
            })
            .to_string(),
        };
        self.append(&line)
    }

    /// Appends a textual warning
    pub fn warning(&mut self, t: Epoch, warning: &str) -> Result<()> {
        let line = match self.format {
            Format::Text => format!("{} WARNING {}", t, warning),
            Format::Json => json!({ "received": t.to_string(), "warning": warning }).to_string(),
        };
        self.append(&line)
    }

    /// Appends a textual error
    pub fn error(&mut self, t: Epoch, error: &str) -> Result<()> {
        let line = match self.format {
            Format::Text => format!("{} ERROR {}", t, error),
            Format::Json => json!({ "received": t.to_string(), "error": error }).to_string(),
        };
        self.append(&line)
    }

    /// Appends the closing statistics
    pub fn summary(&mut self, t: Epoch, rtm: &Runtime) -> Result<()> {
        let line = match self.format {
            Format::Text => format!("{} END {}", t, rtm),
            Format::Json => json!({
                "received": t.to_string(),
                "summary": {
                    "deployed": rtm.deploy_time().to_string(),
                    "bytes": rtm.bytes,
                    "messages": rtm.messages,
                    "warnings": rtm.warnings,
                    "discarded": rtm.discarded,
                    "uptime": rtm.uptime.to_string(),
                }
            })
            .to_string(),
        };
        self.append(&line)
    }

    /// Flushes and closes the log. The file handle itself is released on drop.
    pub fn close(&mut self) -> Result<()> {
        debug!("\"{}\": {} records", self.path.display(), self.records);
        self.fd.finish()?;
        Ok(())
    }
}
