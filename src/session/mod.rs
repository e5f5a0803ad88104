use std::{
    path::Path,
    sync::{
        Arc, Mutex, MutexGuard, OnceLock, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use hifitime::Epoch;
use log::{debug, error, info, warn};

mod event;

pub use event::Event;

use crate::{
    decoder::Decoder,
    device::{DEFAULT_READ_TIMEOUT, Device, SourceDescriptor},
    error::{Error, Result},
    runtime::Runtime,
    sink::{Format, LogSink},
    utils::now,
};

/// Default size of a single read
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// [SessionState] only moves forward, a [Session] is never reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Idle,
    Connecting,
    Running,
    Stopping,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Epoch of deployment, used to name the log and compute uptime
    pub deploy_time: Epoch,

    /// Bounds the latency between [Session::stop] and the end of the session
    pub read_timeout: Duration,

    /// Size of a single read
    pub chunk_size: usize,

    /// Log record layout
    pub format: Format,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            deploy_time: now(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            format: Format::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(deploy_time: Epoch) -> Self {
        Self {
            deploy_time,
            ..Default::default()
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}

/// State shared between the owner and the run loop
#[derive(Debug)]
struct Shared {
    state: Mutex<SessionState>,
    stop: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves forward to `state`, never backwards.
    fn advance(&self, state: SessionState) {
        let mut current = self.lock();
        if state > *current {
            debug!("session: {} -> {}", *current, state);
            *current = state;
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// [Session] attaches to one byte source, decodes the RTCM stream it carries
/// and logs every message, on a dedicated thread.
pub struct Session {
    config: SessionConfig,
    shared: Arc<Shared>,
    descriptor: OnceLock<SourceDescriptor>,
    handle: Mutex<Option<JoinHandle<Runtime>>>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            descriptor: OnceLock::new(),
            handle: Mutex::new(None),
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::Idle),
                stop: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.shared.lock()
    }

    /// [SourceDescriptor] this session was started on
    pub fn descriptor(&self) -> Option<&SourceDescriptor> {
        self.descriptor.get()
    }

    /// Leaves [SessionState::Idle], or reports [Error::AlreadyRunning].
    fn leave_idle(&self) -> Result<()> {
        let mut state = self.shared.lock();
        if *state != SessionState::Idle {
            return Err(Error::AlreadyRunning);
        }
        *state = SessionState::Connecting;
        Ok(())
    }

    /// Connects to `descriptor`, creates the log at `log_path` and deploys the run loop.
    /// Every decoded message, warning and fatal error is forwarded to `on_event`,
    /// connection and log creation failures included.
    ///
    /// ## Errors
    /// - [Error::AlreadyRunning] if this session was started already
    /// - [Error::Connection] if the source cannot be opened
    /// - [Error::Io] if the log cannot be created
    pub fn start<P, F>(
        &self,
        descriptor: SourceDescriptor,
        log_path: P,
        mut on_event: F,
    ) -> Result<()>
    where
        P: AsRef<Path>,
        F: FnMut(Event) + Send + 'static,
    {
        self.leave_idle()?;

        let descriptor = self.descriptor.get_or_init(|| descriptor);

        info!("{} - connecting", descriptor);

        let device = match Device::connect(descriptor, self.config.read_timeout) {
            Ok(device) => device,
            Err(e) => {
                error!("{}", e);
                on_event(Event::Error {
                    name: descriptor.to_string(),
                    offset: 0,
                    error: e.clone(),
                });
                self.shared.advance(SessionState::Closed);
                return Err(e);
            },
        };

        self.deploy(device, log_path.as_ref(), on_event)
    }

    /// Same as [Session::start], on a [Device] that was opened already.
    pub fn attach<P, F>(&self, device: Device, log_path: P, on_event: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: FnMut(Event) + Send + 'static,
    {
        self.leave_idle()?;
        self.deploy(device, log_path.as_ref(), on_event)
    }

    fn deploy<F>(&self, mut device: Device, log_path: &Path, mut on_event: F) -> Result<()>
    where
        F: FnMut(Event) + Send + 'static,
    {
        let sink = match LogSink::create(log_path, self.config.format) {
            Ok(sink) => sink,
            Err(e) => {
                error!("failed to create \"{}\": {}", log_path.display(), e);
                device.close();
                on_event(Event::Error {
                    name: log_path.display().to_string(),
                    offset: 0,
                    error: e.clone(),
                });
                self.shared.advance(SessionState::Closed);
                return Err(e);
            },
        };

        self.shared.advance(SessionState::Running);

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();

        let handle = std::thread::Builder::new()
            .name("rtcm-session".to_string())
            .spawn(move || run(config, shared, device, sink, on_event));

        match handle {
            Ok(handle) => {
                *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(())
            },
            Err(e) => {
                error!("failed to deploy session: {}", e);
                self.shared.advance(SessionState::Closed);
                Err(Error::Io(e))
            },
        }
    }

    /// Requests the run loop to exit after its current read/decode cycle.
    /// Calling this on a stopping or closed session has no effect.
    ///
    /// ## Errors
    /// - [Error::NotRunning] if the session was never started
    pub fn stop(&self) -> Result<()> {
        let mut state = self.shared.lock();
        match *state {
            SessionState::Idle => Err(Error::NotRunning),
            SessionState::Connecting => {
                self.shared.stop.store(true, Ordering::Release);
                Ok(())
            },
            SessionState::Running => {
                self.shared.stop.store(true, Ordering::Release);
                debug!("session: {} -> {}", *state, SessionState::Stopping);
                *state = SessionState::Stopping;
                Ok(())
            },
            SessionState::Stopping | SessionState::Closed => Ok(()),
        }
    }

    /// Waits for the run loop to complete and returns its statistics.
    ///
    /// ## Errors
    /// - [Error::NotRunning] if no run loop was deployed, or it was already waited for
    pub fn wait(&self) -> Result<Runtime> {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(Error::NotRunning)?;

        handle
            .join()
            .map_err(|_| Error::Io(std::io::Error::other("session thread panicked")))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self
            .handle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = handle.join();
        }
    }
}

/// Resources of a deployed session. Dropping the guard tears the session down,
/// on every exit path of [run], unwinding included.
struct Teardown {
    shared: Arc<Shared>,
    device: Device,
    sink: LogSink,
    decoder: Decoder,
    rtm: Runtime,
    released: bool,
}

impl Teardown {
    /// Closes the connection, appends the summary and closes the log.
    fn release(&mut self) -> Result<()> {
        self.released = true;
        self.shared.advance(SessionState::Stopping);

        self.device.close();

        self.rtm.discarded = self.decoder.discarded();
        self.rtm.new_epoch(now());

        let summary = self.sink.summary(now(), &self.rtm);
        let closed = self.sink.close();
        summary.and(closed)
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if !self.released {
            warn!("{} - session aborted", self.device.name());
            if let Err(e) = self.release() {
                error!("{} - {}", self.sink.path().display(), e);
            }
        }
        self.shared.advance(SessionState::Closed);
    }
}

/// Read-decode-log loop. Owns the connection, the decoder and the log.
fn run<F>(
    config: SessionConfig,
    shared: Arc<Shared>,
    device: Device,
    sink: LogSink,
    mut on_event: F,
) -> Runtime
where
    F: FnMut(Event),
{
    let mut buffer = vec![0u8; config.chunk_size.max(1)];

    let name = device.name().to_string();

    let mut session = Teardown {
        shared,
        device,
        sink,
        decoder: Decoder::new(),
        rtm: Runtime::new(config.deploy_time),
        released: false,
    };

    info!("{} - session deployed", name);

    'session: while !session.shared.stop_requested() {
        let size = match session.device.read(&mut buffer) {
            Ok(0) => continue,
            Ok(size) => size,
            Err(Error::EndOfStream) => {
                let discarded = session.decoder.reset();
                let offset = session.decoder.offset();

                if discarded > 0 {
                    warn!("{} - dropping {} bytes of incomplete frame", name, discarded);
                }

                let event = Event::EndOfStream {
                    name: name.clone(),
                    offset,
                    discarded,
                };

                info!("{}", event);

                if let Err(e) = session.sink.warning(now(), &event.to_string()) {
                    error!("{} - {}", session.sink.path().display(), e);
                }

                on_event(event);
                break 'session;
            },
            Err(e) => {
                let event = Event::Error {
                    name: name.clone(),
                    offset: session.decoder.offset() + session.decoder.pending() as u64,
                    error: e,
                };

                error!("{}", event);

                if let Err(e) = session.sink.error(now(), &event.to_string()) {
                    error!("{} - {}", session.sink.path().display(), e);
                }

                on_event(event);
                break 'session;
            },
        };

        session.rtm.bytes += size as u64;

        for item in session.decoder.consume(&buffer[..size]) {
            let written = match item {
                Ok(msg) => {
                    session.rtm.new_message(msg.received);
                    let written = session.sink.message(&msg);
                    on_event(Event::Message(msg));
                    written
                },
                Err(warning) => {
                    session.rtm.warnings += 1;
                    warn!("{} - {}", name, warning);
                    let written = session.sink.warning(now(), &warning.to_string());
                    on_event(Event::Warning(warning));
                    written
                },
            };

            if let Err(e) = written {
                let event = Event::Error {
                    name: session.sink.path().display().to_string(),
                    offset: session.rtm.bytes,
                    error: e,
                };
                error!("{}", event);
                on_event(event);
                break 'session;
            }
        }
    }

    if let Err(e) = session.release() {
        let event = Event::Error {
            name: session.sink.path().display().to_string(),
            offset: session.rtm.bytes,
            error: e,
        };
        error!("{}", event);
        on_event(event);
    }

    info!("{} - session closed: {}", name, session.rtm);

    session.rtm.clone()
}
