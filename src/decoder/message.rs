use gnss::prelude::Constellation;
use hifitime::Epoch;
use itertools::Itertools;
use serde::{Serialize, Serializer};

use super::bits::BitReader;

fn constellation<S: Serializer>(c: &Constellation, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(c)
}

/// GPS (1001-1004) and Glonass (1009-1012) legacy observation header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observables {
    #[serde(serialize_with = "constellation")]
    pub constellation: Constellation,
    pub station_id: u16,
    /// GPS time of week or Glonass time of day, in milliseconds
    pub epoch_ms: u32,
    /// More messages of the same epoch follow
    pub synchronous: bool,
    pub satellites: u8,
    pub smoothing: bool,
    pub smoothing_interval: u8,
}

/// Stationary antenna reference point (1005, 1006)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferencePoint {
    pub station_id: u16,
    pub itrf_year: u8,
    pub gps: bool,
    pub glonass: bool,
    pub galileo: bool,
    pub reference_station: bool,
    /// ECEF coordinates in meters
    pub ecef_x: f64,
    pub ecef_y: f64,
    pub ecef_z: f64,
    /// Antenna height in meters (1006 only)
    pub height: Option<f64>,
}

/// Antenna and receiver descriptors (1007, 1008, 1033)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Descriptors {
    pub station_id: u16,
    pub antenna: String,
    pub setup_id: u8,
    pub antenna_serial: Option<String>,
    pub receiver: Option<String>,
    pub firmware: Option<String>,
    pub receiver_serial: Option<String>,
}

/// System parameters (1013)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemParameters {
    pub station_id: u16,
    pub mjd: u16,
    pub seconds_of_day: u32,
    pub leap_seconds: u8,
}

/// Broadcast ephemeris identification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ephemeris {
    #[serde(serialize_with = "constellation")]
    pub constellation: Constellation,
    pub prn: u8,
    pub week: Option<u16>,
}

/// Unicode text string (1029)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub station_id: u16,
    pub mjd: u16,
    pub seconds_of_day: u32,
    pub text: String,
}

/// Multiple Signal Message header, common to MSM1 to MSM7
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Msm {
    #[serde(serialize_with = "constellation")]
    pub constellation: Constellation,
    /// 1 (MSM1) to 7 (MSM7)
    pub level: u8,
    pub station_id: u16,
    /// Time of week (time of day for Glonass) in milliseconds
    pub epoch_ms: u32,
    /// Glonass day of week
    pub glonass_day: Option<u8>,
    pub multiple_message: bool,
    pub iods: u8,
    /// Satellite IDs (1 based position in the satellite mask)
    pub satellites: Vec<u8>,
    /// Signal IDs (1 based position in the signal mask)
    pub signals: Vec<u8>,
    /// Number of satellite/signal cells carried
    pub cells: usize,
}

/// Content of a decoded frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Body {
    Observables(Observables),
    ReferencePoint(ReferencePoint),
    Descriptors(Descriptors),
    SystemParameters(SystemParameters),
    Ephemeris(Ephemeris),
    Text(Text),
    Msm(Msm),
    /// Message type we do not interprate, or payload too short
    /// for its catalog entry.
    Raw,
}

/// [DecodedMessage] is a CRC validated RTCM frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// 12 bit message type. 0 for empty (null) frames.
    pub message_type: u16,
    /// Payload length in bytes
    pub length: usize,
    /// Stream offset of the preamble byte
    pub offset: u64,
    /// Epoch of receipt
    pub received: Epoch,
    pub body: Body,
}

impl DecodedMessage {
    pub(crate) fn new(offset: u64, payload: &[u8], received: Epoch) -> Self {
        let mut reader = BitReader::new(payload);
        let message_type = reader.u(12).unwrap_or_default() as u16;

        let body = if payload.len() < 2 {
            Body::Raw
        } else {
            decode_body(message_type, &mut reader).unwrap_or(Body::Raw)
        };

        Self {
            message_type,
            length: payload.len(),
            offset,
            received,
            body,
        }
    }

    pub fn station_id(&self) -> Option<u16> {
        match &self.body {
            Body::Observables(obs) => Some(obs.station_id),
            Body::ReferencePoint(arp) => Some(arp.station_id),
            Body::Descriptors(desc) => Some(desc.station_id),
            Body::SystemParameters(params) => Some(params.station_id),
            Body::Text(text) => Some(text.station_id),
            Body::Msm(msm) => Some(msm.station_id),
            Body::Ephemeris(_) | Body::Raw => None,
        }
    }

    pub fn satellite_count(&self) -> Option<usize> {
        match &self.body {
            Body::Observables(obs) => Some(obs.satellites as usize),
            Body::Msm(msm) => Some(msm.satellites.len()),
            _ => None,
        }
    }

    /// Epoch carried by observation messages, in milliseconds
    pub fn epoch_ms(&self) -> Option<u32> {
        match &self.body {
            Body::Observables(obs) => Some(obs.epoch_ms),
            Body::Msm(msm) => Some(msm.epoch_ms),
            _ => None,
        }
    }

    pub fn constellation(&self) -> Option<Constellation> {
        match &self.body {
            Body::Observables(obs) => Some(obs.constellation),
            Body::Ephemeris(eph) => Some(eph.constellation),
            Body::Msm(msm) => Some(msm.constellation),
            _ => msm_constellation(self.message_type),
        }
    }

    /// Readable description of this message type
    pub fn description(&self) -> String {
        describe(self.message_type)
    }
}

impl std::fmt::Display for DecodedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RTCM{} ({}) len={}", self.message_type, self.description(), self.length)?;

        match &self.body {
            Body::Observables(obs) => write!(
                f,
                " station={} epoch={}ms sync={} sats={}",
                obs.station_id, obs.epoch_ms, obs.synchronous, obs.satellites
            ),
            Body::ReferencePoint(arp) => {
                write!(
                    f,
                    " station={} itrf={} x={:.4} y={:.4} z={:.4}",
                    arp.station_id, arp.itrf_year, arp.ecef_x, arp.ecef_y, arp.ecef_z
                )?;
                if let Some(height) = arp.height {
                    write!(f, " height={:.4}", height)?;
                }
                Ok(())
            },
            Body::Descriptors(desc) => {
                write!(
                    f,
                    " station={} antenna=\"{}\" setup={}",
                    desc.station_id, desc.antenna, desc.setup_id
                )?;
                if let Some(serial) = &desc.antenna_serial {
                    write!(f, " antenna_sn=\"{}\"", serial)?;
                }
                if let Some(receiver) = &desc.receiver {
                    write!(f, " receiver=\"{}\"", receiver)?;
                }
                if let Some(firmware) = &desc.firmware {
                    write!(f, " firmware=\"{}\"", firmware)?;
                }
                if let Some(serial) = &desc.receiver_serial {
                    write!(f, " receiver_sn=\"{}\"", serial)?;
                }
                Ok(())
            },
            Body::SystemParameters(params) => write!(
                f,
                " station={} mjd={} sod={} leap={}",
                params.station_id, params.mjd, params.seconds_of_day, params.leap_seconds
            ),
            Body::Ephemeris(eph) => {
                write!(f, " {} prn={}", eph.constellation, eph.prn)?;
                if let Some(week) = eph.week {
                    write!(f, " week={}", week)?;
                }
                Ok(())
            },
            Body::Text(text) => write!(
                f,
                " station={} mjd={} sod={} \"{}\"",
                text.station_id, text.mjd, text.seconds_of_day, text.text
            ),
            Body::Msm(msm) => {
                write!(f, " station={} epoch=", msm.station_id)?;
                if let Some(day) = msm.glonass_day {
                    write!(f, "d{}+", day)?;
                }
                write!(
                    f,
                    "{}ms sats={} [{}] signals=[{}] cells={}",
                    msm.epoch_ms,
                    msm.satellites.len(),
                    msm.satellites.iter().join(","),
                    msm.signals.iter().join(","),
                    msm.cells
                )?;
                if msm.multiple_message {
                    write!(f, " (more to follow)")?;
                }
                Ok(())
            },
            Body::Raw => Ok(()),
        }
    }
}

/// Constellation of MSM message types
fn msm_constellation(message_type: u16) -> Option<Constellation> {
    if !(1071..=1137).contains(&message_type) {
        return None;
    }

    let level = message_type % 10;
    if !(1..=7).contains(&level) {
        return None;
    }

    match message_type / 10 {
        107 => Some(Constellation::GPS),
        108 => Some(Constellation::Glonass),
        109 => Some(Constellation::Galileo),
        110 => Some(Constellation::SBAS),
        111 => Some(Constellation::QZSS),
        112 => Some(Constellation::BeiDou),
        113 => Some(Constellation::IRNSS),
        _ => None,
    }
}

fn describe(message_type: u16) -> String {
    if let Some(constellation) = msm_constellation(message_type) {
        return format!("{} MSM{}", constellation, message_type % 10);
    }

    let desc = match message_type {
        0 => "Empty",
        1001 => "GPS L1 observables",
        1002 => "GPS extended L1 observables",
        1003 => "GPS L1/L2 observables",
        1004 => "GPS extended L1/L2 observables",
        1005 => "Reference station ARP",
        1006 => "Reference station ARP + height",
        1007 => "Antenna descriptor",
        1008 => "Antenna descriptor + serial number",
        1009 => "Glonass L1 observables",
        1010 => "Glonass extended L1 observables",
        1011 => "Glonass L1/L2 observables",
        1012 => "Glonass extended L1/L2 observables",
        1013 => "System parameters",
        1019 => "GPS ephemeris",
        1020 => "Glonass ephemeris",
        1029 => "Unicode text string",
        1033 => "Receiver and antenna descriptors",
        1042 => "BDS ephemeris",
        1044 => "QZSS ephemeris",
        1045 => "Galileo F/NAV ephemeris",
        1046 => "Galileo I/NAV ephemeris",
        1230 => "Glonass code-phase biases",
        4001..=4095 => "Proprietary",
        _ => "Unknown",
    };

    desc.to_string()
}

fn decode_body(message_type: u16, r: &mut BitReader) -> Option<Body> {
    match message_type {
        1001..=1004 => {
            let station_id = r.u(12)? as u16;
            let epoch_ms = r.u(30)? as u32;
            Some(Body::Observables(Observables {
                constellation: Constellation::GPS,
                station_id,
                epoch_ms,
                synchronous: r.bit()?,
                satellites: r.u(5)? as u8,
                smoothing: r.bit()?,
                smoothing_interval: r.u(3)? as u8,
            }))
        },
        1009..=1012 => {
            let station_id = r.u(12)? as u16;
            let epoch_ms = r.u(27)? as u32;
            Some(Body::Observables(Observables {
                constellation: Constellation::Glonass,
                station_id,
                epoch_ms,
                synchronous: r.bit()?,
                satellites: r.u(5)? as u8,
                smoothing: r.bit()?,
                smoothing_interval: r.u(3)? as u8,
            }))
        },
        1005 | 1006 => {
            let station_id = r.u(12)? as u16;
            let itrf_year = r.u(6)? as u8;
            let gps = r.bit()?;
            let glonass = r.bit()?;
            let galileo = r.bit()?;
            let reference_station = r.bit()?;
            let ecef_x = r.i(38)? as f64 * 1.0E-4;
            r.skip(2)?; // single receiver oscillator, reserved
            let ecef_y = r.i(38)? as f64 * 1.0E-4;
            r.skip(2)?; // quarter cycle indicator
            let ecef_z = r.i(38)? as f64 * 1.0E-4;

            let height = if message_type == 1006 {
                Some(r.u(16)? as f64 * 1.0E-4)
            } else {
                None
            };

            Some(Body::ReferencePoint(ReferencePoint {
                station_id,
                itrf_year,
                gps,
                glonass,
                galileo,
                reference_station,
                ecef_x,
                ecef_y,
                ecef_z,
                height,
            }))
        },
        1007 | 1008 | 1033 => {
            let mut desc = Descriptors {
                station_id: r.u(12)? as u16,
                ..Default::default()
            };

            let n = r.u(8)? as usize;
            desc.antenna = r.string(n)?;
            desc.setup_id = r.u(8)? as u8;

            if message_type != 1007 {
                let n = r.u(8)? as usize;
                desc.antenna_serial = Some(r.string(n)?);
            }

            if message_type == 1033 {
                let n = r.u(8)? as usize;
                desc.receiver = Some(r.string(n)?);
                let n = r.u(8)? as usize;
                desc.firmware = Some(r.string(n)?);
                let n = r.u(8)? as usize;
                desc.receiver_serial = Some(r.string(n)?);
            }

            Some(Body::Descriptors(desc))
        },
        1013 => {
            let station_id = r.u(12)? as u16;
            let mjd = r.u(16)? as u16;
            let seconds_of_day = r.u(17)? as u32;
            r.skip(5)?; // message announcements count
            let leap_seconds = r.u(8)? as u8;
            Some(Body::SystemParameters(SystemParameters {
                station_id,
                mjd,
                seconds_of_day,
                leap_seconds,
            }))
        },
        1019 => Some(Body::Ephemeris(Ephemeris {
            constellation: Constellation::GPS,
            prn: r.u(6)? as u8,
            week: Some(r.u(10)? as u16),
        })),
        1020 => Some(Body::Ephemeris(Ephemeris {
            constellation: Constellation::Glonass,
            prn: r.u(6)? as u8,
            week: None,
        })),
        1042 => Some(Body::Ephemeris(Ephemeris {
            constellation: Constellation::BeiDou,
            prn: r.u(6)? as u8,
            week: Some(r.u(13)? as u16),
        })),
        1044 => Some(Body::Ephemeris(Ephemeris {
            constellation: Constellation::QZSS,
            prn: r.u(4)? as u8,
            week: None,
        })),
        1045 | 1046 => Some(Body::Ephemeris(Ephemeris {
            constellation: Constellation::Galileo,
            prn: r.u(6)? as u8,
            week: Some(r.u(12)? as u16),
        })),
        1029 => {
            let station_id = r.u(12)? as u16;
            let mjd = r.u(16)? as u16;
            let seconds_of_day = r.u(17)? as u32;
            r.skip(7)?; // number of characters
            let units = r.u(8)? as usize;

            let mut bytes = Vec::with_capacity(units);
            for _ in 0..units {
                bytes.push(r.u(8)? as u8);
            }

            Some(Body::Text(Text {
                station_id,
                mjd,
                seconds_of_day,
                text: String::from_utf8_lossy(&bytes).to_string(),
            }))
        },
        _ => {
            let constellation = msm_constellation(message_type)?;
            decode_msm(constellation, (message_type % 10) as u8, r).map(Body::Msm)
        },
    }
}

fn decode_msm(constellation: Constellation, level: u8, r: &mut BitReader) -> Option<Msm> {
    let station_id = r.u(12)? as u16;

    let (glonass_day, epoch_ms) = if constellation == Constellation::Glonass {
        let day = r.u(3)? as u8;
        (Some(day), r.u(27)? as u32)
    } else {
        (None, r.u(30)? as u32)
    };

    let multiple_message = r.bit()?;
    let iods = r.u(3)? as u8;
    // reserved, clock steering, external clock, smoothing indicator and interval
    r.skip(7 + 2 + 2 + 1 + 3)?;

    let sat_mask = r.u(64)?;
    let sig_mask = r.u(32)?;

    let satellites = (0..64u8)
        .filter(|i| sat_mask & (1u64 << (63 - i)) != 0)
        .map(|i| i + 1)
        .collect::<Vec<_>>();

    let signals = (0..32u8)
        .filter(|i| sig_mask & (1u64 << (31 - i)) != 0)
        .map(|i| i + 1)
        .collect::<Vec<_>>();

    let mask_len = satellites.len() * signals.len();
    if mask_len > 64 {
        return None;
    }

    let cells = r.u(mask_len)?.count_ones() as usize;

    Some(Msm {
        constellation,
        level,
        station_id,
        epoch_ms,
        glonass_day,
        multiple_message,
        iods,
        satellites,
        signals,
        cells,
    })
}
