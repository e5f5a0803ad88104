use clap::{Arg, ArgAction, ArgMatches, ColorChoice, Command};
use std::{path::PathBuf, str::FromStr, time::Duration};

use rtcm_logger::{
    device::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT, SourceDescriptor},
    error::Error,
    sink::{Format, Settings as LogSettings},
};

pub struct Cli {
    /// Arguments passed by user
    matches: ArgMatches,
}

impl Cli {
    /// Build new command line interface
    pub fn new() -> Self {
        Self {
            matches: Self::command().get_matches(),
        }
    }

    fn command() -> Command {
        Command::new("rtcm-logger")
            .author("Guillaume W. Bres, <guillaume.bressaix@gmail.com>")
            .version(env!("CARGO_PKG_VERSION"))
            .about("RTCM3 stream decoder and logger")
            .color(ColorChoice::Always)
            .arg_required_else_help(true)
            .next_help_heading("Serial port (local RTCM source)")
            .arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .value_name("PORT")
                    .required_unless_present_any(["tcp", "file", "list-ports"])
                    .conflicts_with_all(["tcp", "file"])
                    .help("Define serial port. Example /dev/ttyUSB0 on Linux, COM4 on Windows")
            )
            .arg(
                Arg::new("baudrate")
                    .short('b')
                    .long("baud")
                    .required(false)
                    .value_name("Baudrate (u32)")
                    .requires("port")
                    .help("Define serial port baud rate. By default we use 9600"),
            )
            .arg(
                Arg::new("list-ports")
                    .long("list-ports")
                    .action(ArgAction::SetTrue)
                    .help("List available serial ports and exit"),
            )
            .next_help_heading("Network (remote RTCM source)")
            .arg(
                Arg::new("tcp")
                    .short('t')
                    .long("tcp")
                    .value_name("HOST:PORT")
                    .conflicts_with("file")
                    .help("Connect to a TCP stream. For example 192.168.1.10:2101. UDP is not supported.")
            )
            .next_help_heading("File interface (replay)")
            .arg(
                Arg::new("file")
                    .long("file")
                    .short('f')
                    .value_name("FILENAME")
                    .help("Replay a recorded RTCM stream. Gzip files are supported but they must be terminated with '.gz'")
            )
            .next_help_heading("Logging")
            .arg(
                Arg::new("prefix")
                    .long("prefix")
                    .required(false)
                    .help("Custom directory prefix for output logs. Default is \"logs\"."),
            )
            .arg(
                Arg::new("output")
                    .short('o')
                    .long("output")
                    .value_name("FILENAME")
                    .help("Custom log file. By default the log is named after the deployment time.")
            )
            .arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Log one JSON object per line, instead of readable text")
            )
            .arg(
                Arg::new("gzip")
                    .long("gzip")
                    .action(ArgAction::SetTrue)
                    .help("Gzip compress the output log.")
            )
            .arg(
                Arg::new("timeout")
                    .long("timeout")
                    .value_name("MILLISECONDS")
                    .help("Read timeout. Bounds the reaction time to a stop request. Default is 1000ms.")
            )
            .arg(
                Arg::new("quiet")
                    .short('q')
                    .long("quiet")
                    .action(ArgAction::SetTrue)
                    .help("Do not print decoded messages to the console")
            )
    }

    pub fn list_ports(&self) -> bool {
        self.matches.get_flag("list-ports")
    }

    pub fn quiet(&self) -> bool {
        self.matches.get_flag("quiet")
    }

    /// Returns User baud rate specification
    fn baud_rate(&self) -> Result<u32, Error> {
        match self.matches.get_one::<String>("baudrate") {
            Some(baud) => baud
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::InvalidDescriptor(baud.to_string())),
            None => Ok(DEFAULT_BAUD_RATE),
        }
    }

    /// Returns the selected byte source
    pub fn descriptor(&self) -> Result<SourceDescriptor, Error> {
        if let Some(port) = self.matches.get_one::<String>("port") {
            Ok(SourceDescriptor::serial(port, self.baud_rate()?))
        } else if let Some(address) = self.matches.get_one::<String>("tcp") {
            if address.starts_with("udp://") || address.starts_with("tcp://") {
                SourceDescriptor::from_str(address)
            } else {
                SourceDescriptor::from_str(&format!("tcp://{}", address))
            }
        } else if let Some(path) = self.matches.get_one::<String>("file") {
            Ok(SourceDescriptor::file(path))
        } else {
            Err(Error::InvalidDescriptor(String::default()))
        }
    }

    pub fn read_timeout(&self) -> Duration {
        match self.matches.get_one::<String>("timeout") {
            Some(timeout) => match timeout.trim().parse::<u64>() {
                Ok(0) | Err(_) => DEFAULT_READ_TIMEOUT,
                Ok(ms) => Duration::from_millis(ms),
            },
            None => DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            prefix: Some(
                self.matches
                    .get_one::<String>("prefix")
                    .cloned()
                    .unwrap_or("logs".to_string()),
            ),
            format: if self.matches.get_flag("json") {
                Format::Json
            } else {
                Format::Text
            },
            gzip: self.matches.get_flag("gzip"),
        }
    }

    /// Custom log path, if any. The ".gz" suffix is appended
    /// when compression is requested.
    pub fn output(&self) -> Option<PathBuf> {
        let output = self.matches.get_one::<String>("output")?;

        if self.matches.get_flag("gzip") && !output.ends_with(".gz") {
            Some(PathBuf::from(format!("{}.gz", output)))
        } else {
            Some(PathBuf::from(output))
        }
    }
}
