use hifitime::Epoch;
use log::{debug, trace};
use thiserror::Error as ThisError;

mod bits;
mod crc;
mod message;

pub use crc::crc24q;
pub use message::{
    Body, DecodedMessage, Descriptors, Ephemeris, Msm, Observables, ReferencePoint,
    SystemParameters, Text,
};

use crate::utils::now;

/// RTCM3 frame preamble
pub const PREAMBLE: u8 = 0xD3;

/// Preamble + reserved bits and length
const HEADER_SIZE: usize = 3;

const CRC_SIZE: usize = 3;

/// Largest payload the 10 bit length field may describe
pub const MAX_PAYLOAD_SIZE: usize = 1023;

/// Recoverable frame-level anomalies. Decoding carries on.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum FrameWarning {
    #[error("crc mismatch at byte offset {offset}: expected {expected:06X}, computed {computed:06X} (len={length})")]
    Crc {
        /// Stream offset of the rejected preamble
        offset: u64,
        /// Payload length announced by the frame header
        length: usize,
        expected: u32,
        computed: u32,
    },
}

/// [Decoder] reframes a byte stream into [DecodedMessage]s.
/// It owns its buffer: each [Decoder::consume] call resumes where the
/// previous call stopped, partial frames are kept until completed.
#[derive(Debug, Default)]
pub struct Decoder {
    buffer: Vec<u8>,
    /// Stream offset of buffer[0]
    offset: u64,
    /// Noise bytes skipped while searching for a preamble
    discarded: u64,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `data` to the internal buffer, and returns an iterator-like object
    /// we can use to process the completed frames.
    pub fn consume(&mut self, data: &[u8]) -> DecodeIter<'_> {
        self.buffer.extend_from_slice(data);
        DecodeIter { decoder: self }
    }

    /// Number of buffered bytes not yet assembled into a frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Absolute stream offset of the next byte to be processed
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total number of noise bytes dropped so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Drops the partially assembled frame, if any.
    /// Returns the number of bytes that were dropped.
    pub fn reset(&mut self) -> usize {
        let size = self.buffer.len();
        self.drain(size);
        size
    }

    fn drain(&mut self, size: usize) {
        self.buffer.drain(..size);
        self.offset += size as u64;
    }

    /// Drops noise ahead of the next preamble.
    /// Returns false when the buffer holds no preamble at all.
    fn synchronize(&mut self) -> bool {
        match self.buffer.iter().position(|b| *b == PREAMBLE) {
            Some(0) => true,
            Some(pos) => {
                trace!("skipping {} bytes at offset {}", pos, self.offset);
                self.discarded += pos as u64;
                self.drain(pos);
                true
            },
            None => {
                self.discarded += self.buffer.len() as u64;
                let size = self.buffer.len();
                self.drain(size);
                false
            },
        }
    }

    fn next_frame(&mut self) -> Option<Result<DecodedMessage, FrameWarning>> {
        loop {
            if !self.synchronize() {
                return None;
            }

            if self.buffer.len() < HEADER_SIZE {
                return None;
            }

            // upper 6 bits are reserved: a non zero value designates a false preamble
            if self.buffer[1] & 0xFC != 0 {
                trace!("false preamble at offset {}", self.offset);
                self.discarded += 1;
                self.drain(1);
                continue;
            }

            let length = (((self.buffer[1] & 0x03) as usize) << 8) | self.buffer[2] as usize;
            let total = HEADER_SIZE + length + CRC_SIZE;

            if self.buffer.len() < total {
                // await more bytes
                return None;
            }

            let end = HEADER_SIZE + length;

            let computed = crc24q(&self.buffer[..end]);
            let expected = ((self.buffer[end] as u32) << 16)
                | ((self.buffer[end + 1] as u32) << 8)
                | self.buffer[end + 2] as u32;

            if computed != expected {
                let warning = FrameWarning::Crc {
                    offset: self.offset,
                    length,
                    expected,
                    computed,
                };

                debug!("{}", warning);

                // resume right after this preamble, a genuine frame may start within
                self.drain(1);
                return Some(Err(warning));
            }

            let message = DecodedMessage::new(self.offset, &self.buffer[HEADER_SIZE..end], now());

            trace!("{}", message);

            self.drain(total);
            return Some(Ok(message));
        }
    }
}

/// Iterates over the frames completed by the last [Decoder::consume] call
pub struct DecodeIter<'a> {
    decoder: &'a mut Decoder,
}

impl Iterator for DecodeIter<'_> {
    type Item = Result<DecodedMessage, FrameWarning>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.next_frame()
    }
}

/// Wraps `payload` into a complete RTCM3 frame.
/// Returns None when `payload` exceeds [MAX_PAYLOAD_SIZE].
pub fn encode_frame(payload: &[u8]) -> Option<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return None;
    }

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.push(PREAMBLE);
    frame.push((payload.len() >> 8) as u8 & 0x03);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);

    let crc = crc24q(&frame);
    frame.extend_from_slice(&[(crc >> 16) as u8, (crc >> 8) as u8, crc as u8]);
    Some(frame)
}

#[cfg(test)]
mod test {
    use super::*;

    /// 1005 message type header followed by padding
    fn payload(message_type: u16, size: usize) -> Vec<u8> {
        let mut payload = vec![0u8; size];
        payload[0] = (message_type >> 4) as u8;
        payload[1] = ((message_type & 0x0f) << 4) as u8;
        payload
    }

    fn collect(decoder: &mut Decoder, data: &[u8]) -> (Vec<DecodedMessage>, Vec<FrameWarning>) {
        let mut messages = Vec::new();
        let mut warnings = Vec::new();
        for item in decoder.consume(data) {
            match item {
                Ok(msg) => messages.push(msg),
                Err(w) => warnings.push(w),
            }
        }
        (messages, warnings)
    }

    #[test]
    fn single_frame() {
        let frame = encode_frame(&payload(1005, 4)).unwrap();
        assert_eq!(&frame[..3], &[0xd3, 0x00, 0x04]);

        let mut decoder = Decoder::new();
        let (messages, warnings) = collect(&mut decoder, &frame);

        assert!(warnings.is_empty());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].length, 4);
        assert_eq!(messages[0].message_type, 1005);
        assert_eq!(messages[0].offset, 0);
        assert_eq!(decoder.pending(), 0);
        assert_eq!(decoder.offset(), frame.len() as u64);
    }

    #[test]
    fn corrupted_crc_bytes() {
        let frame = encode_frame(&payload(1005, 4)).unwrap();

        for idx in frame.len() - 3..frame.len() {
            let mut corrupt = frame.clone();
            corrupt[idx] ^= 0x01;

            let mut decoder = Decoder::new();
            let (messages, warnings) = collect(&mut decoder, &corrupt);

            assert!(messages.is_empty());
            assert_eq!(warnings.len(), 1);

            match &warnings[0] {
                FrameWarning::Crc { offset, length, .. } => {
                    assert_eq!(*offset, 0);
                    assert_eq!(*length, 4);
                },
            }
        }
    }

    #[test]
    fn frames_within_noise() {
        let noise = [0x00, 0xff, 0x12, 0xd3, 0xfc, 0x55, 0xd3];
        let mut stream = Vec::new();

        for (i, msg) in [1005u16, 1077, 1230, 1033].iter().enumerate() {
            stream.extend_from_slice(&noise[..(i + 2).min(noise.len())]);
            stream.extend_from_slice(&encode_frame(&payload(*msg, 8 + i)).unwrap());
        }
        stream.extend_from_slice(&noise);

        let mut decoder = Decoder::new();
        let (messages, _) = collect(&mut decoder, &stream);

        let types = messages.iter().map(|m| m.message_type).collect::<Vec<_>>();
        assert_eq!(types, vec![1005, 1077, 1230, 1033]);

        for window in messages.windows(2) {
            assert!(window[0].offset < window[1].offset);
        }
    }

    #[test]
    fn byte_by_byte_assembly() {
        let mut stream = encode_frame(&payload(1006, 21)).unwrap();
        stream.extend_from_slice(&encode_frame(&payload(1008, 10)).unwrap());

        let mut decoder = Decoder::new();
        let mut messages = Vec::new();

        for byte in stream.iter() {
            for item in decoder.consume(&[*byte]) {
                messages.push(item.unwrap());
            }
        }

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message_type, 1006);
        assert_eq!(messages[1].message_type, 1008);
        assert_eq!(messages[1].offset, 27);
    }

    #[test]
    fn partial_frame_is_kept() {
        let frame = encode_frame(&payload(1005, 19)).unwrap();

        let mut decoder = Decoder::new();
        let (messages, warnings) = collect(&mut decoder, &frame[..10]);
        assert!(messages.is_empty());
        assert!(warnings.is_empty());
        assert_eq!(decoder.pending(), 10);

        let (messages, _) = collect(&mut decoder, &frame[10..]);
        assert_eq!(messages.len(), 1);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn reset_drops_partial_frame() {
        let frame = encode_frame(&payload(1005, 19)).unwrap();

        let mut decoder = Decoder::new();
        let _ = collect(&mut decoder, &frame[..8]);
        assert_eq!(decoder.reset(), 8);
        assert_eq!(decoder.pending(), 0);
        assert_eq!(decoder.offset(), 8);
    }

    #[test]
    fn false_preamble_resync() {
        // reserved bits set: not a frame, no warning either
        let mut stream = vec![0xd3, 0xff, 0x00];
        stream.extend_from_slice(&encode_frame(&payload(1005, 4)).unwrap());

        let mut decoder = Decoder::new();
        let (messages, warnings) = collect(&mut decoder, &stream);

        assert!(warnings.is_empty());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].offset, 3);
        assert_eq!(decoder.discarded(), 3);
    }

    #[test]
    fn frame_hidden_behind_false_preamble() {
        // a false preamble whose announced length swallows a genuine frame
        let genuine = encode_frame(&payload(1005, 4)).unwrap();
        let mut stream = vec![0xd3, 0x00, 0x08];
        stream.extend_from_slice(&genuine);
        stream.extend_from_slice(&[0x00; 4]);

        let mut decoder = Decoder::new();
        let (messages, warnings) = collect(&mut decoder, &stream);

        assert_eq!(warnings.len(), 1);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].offset, 3);
        assert_eq!(messages[0].length, 4);
    }

    #[test]
    fn empty_frame() {
        let mut decoder = Decoder::new();
        let (messages, warnings) = collect(&mut decoder, &[0xd3, 0x00, 0x00, 0x47, 0xea, 0x4b]);

        assert!(warnings.is_empty());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].length, 0);
        assert_eq!(messages[0].body, Body::Raw);
    }

    #[test]
    fn oversized_payload() {
        assert!(encode_frame(&[0u8; MAX_PAYLOAD_SIZE + 1]).is_none());

        let frame = encode_frame(&[0u8; MAX_PAYLOAD_SIZE]).unwrap();
        assert_eq!(&frame[..3], &[0xd3, 0x03, 0xff]);
        assert_eq!(frame.len(), HEADER_SIZE + MAX_PAYLOAD_SIZE + CRC_SIZE);
    }

    #[test]
    fn noise_only() {
        let mut decoder = Decoder::new();
        let (messages, warnings) = collect(&mut decoder, &[0x01, 0x02, 0x03]);

        assert!(messages.is_empty());
        assert!(warnings.is_empty());
        assert_eq!(decoder.pending(), 0);
        assert_eq!(decoder.discarded(), 3);
    }
}
