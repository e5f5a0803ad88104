use std::path::PathBuf;

use hifitime::Epoch;

use crate::utils::compact_timestamp;

/// Record layout
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub enum Format {
    /// One readable line per record
    #[default]
    Text,

    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Custom directory prefix
    pub prefix: Option<String>,

    /// Record layout
    pub format: Format,

    /// GZIP compression
    pub gzip: bool,
}

impl Settings {
    /// Log file path for a session deployed at `t`
    pub fn filename(&self, t: Epoch) -> PathBuf {
        let mut filename = format!("{}_rtcm_log", compact_timestamp(t));

        match self.format {
            Format::Text => filename.push_str(".csv"),
            Format::Json => filename.push_str(".jsonl"),
        }

        if self.gzip {
            filename.push_str(".gz");
        }

        match &self.prefix {
            Some(prefix) => PathBuf::from(prefix).join(filename),
            None => PathBuf::from(filename),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn filenames() {
        let t = Epoch::from_gregorian_utc(2025, 1, 30, 14, 0, 59, 0);

        let settings = Settings::default();
        assert_eq!(
            settings.filename(t),
            PathBuf::from("20250130140059_rtcm_log.csv")
        );

        let settings = Settings {
            prefix: Some("logs".to_string()),
            format: Format::Json,
            gzip: true,
        };

        assert_eq!(
            settings.filename(t),
            PathBuf::from("logs/20250130140059_rtcm_log.jsonl.gz")
        );
    }
}
