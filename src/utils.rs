use hifitime::prelude::{Epoch, TimeScale};
use log::error;

/// Current [Epoch] expressed in [TimeScale::UTC]
pub fn now() -> Epoch {
    match Epoch::now() {
        Ok(t) => t.to_time_scale(TimeScale::UTC),
        Err(e) => {
            error!("failed to determine system time: {}", e);
            Epoch::from_unix_seconds(0.0)
        },
    }
}

/// Compact "YYYYmmddHHMMSS" representation, used in file names
pub fn compact_timestamp(t: Epoch) -> String {
    let (y, m, d, hh, mm, ss, _) = t.to_gregorian_utc();
    format!("{:04}{:02}{:02}{:02}{:02}{:02}", y, m, d, hh, mm, ss)
}
