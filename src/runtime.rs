use hifitime::prelude::{Duration, Epoch, TimeScale};

/// Statistics of one session run
#[derive(Debug, Clone)]
pub struct Runtime {
    /// Epoch of latest receipt
    pub epoch: Epoch,

    /// Epoch of deployment
    deploy_time: Epoch,

    /// Uptime as [Duration]
    pub uptime: Duration,

    /// Total bytes read from the connection
    pub bytes: u64,

    /// Total messages decoded
    pub messages: u64,

    /// Total frame warnings
    pub warnings: u64,

    /// Noise bytes dropped while resynchronizing
    pub discarded: u64,
}

impl Runtime {
    pub fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            deploy_time: epoch,
            uptime: Duration::ZERO,
            bytes: 0,
            messages: 0,
            warnings: 0,
            discarded: 0,
        }
    }

    /// Update latest epoch
    pub fn new_epoch(&mut self, epoch: Epoch) {
        self.epoch = epoch.to_time_scale(TimeScale::UTC);
        self.uptime = self.epoch - self.deploy_time;
    }

    /// Latch a new decoded message
    pub fn new_message(&mut self, received: Epoch) {
        self.messages += 1;
        self.new_epoch(received);
    }

    /// Returns epoch of deployment
    pub fn deploy_time(&self) -> Epoch {
        self.deploy_time
    }

    /// Returns current epoch in [TimeScale::UTC]
    pub fn utc_time(&self) -> Epoch {
        self.epoch.to_time_scale(TimeScale::UTC)
    }
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} bytes, {} messages, {} warnings, {} noise bytes, uptime {}",
            self.bytes,
            self.messages,
            self.warnings,
            self.discarded,
            self.uptime.round(Duration::from_seconds(1.0))
        )
    }
}
