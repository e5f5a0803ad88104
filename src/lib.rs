#![doc(
    html_logo_url = "https://raw.githubusercontent.com/nav-solutions/.github/master/logos/logo2.jpg"
)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

/*
 * RTCM-LOGGER is part of the nav-solutions framework.
 * Authors: Guillaume W. Bres <guillaume.bressaix@gmail.com> et al,
 * (cf. https://github.com/nav-solutions/rtcm-logger/graphs/contributors)
 * This framework is shipped under Mozilla Public V2 license.
 */

extern crate gnss_rs as gnss;

pub mod decoder;
pub mod device;
pub mod error;
pub mod runtime;
pub mod session;
pub mod sink;
pub mod utils;

pub mod prelude {
    pub use crate::decoder::{Body, DecodedMessage, Decoder, FrameWarning};
    pub use crate::device::{Device, SourceDescriptor, list_ports};
    pub use crate::error::{Error, Result};
    pub use crate::runtime::Runtime;
    pub use crate::session::{Event, Session, SessionConfig, SessionState};
    pub use crate::sink::{Format, LogSink, Settings as LogSettings};
    // re-export
    pub use hifitime::{Duration, Epoch};
}

pub use session::{Event, Session, SessionConfig, SessionState};
