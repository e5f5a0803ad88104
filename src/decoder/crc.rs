//! CRC-24Q (Qualcomm), protecting every RTCM3 frame.
//! Polynomial 0x1864CFB, zero init, no reflection: catalogued as CRC-24/LTE-A.

use crc::{CRC_24_LTE_A, Crc};

const CRC24Q: Crc<u32> = Crc::<u32>::new(&CRC_24_LTE_A);

/// Computes the 24 bit CRC of `data`
pub fn crc24q(data: &[u8]) -> u32 {
    CRC24Q.checksum(data)
}
