/// Big endian bit cursor over an RTCM payload.
/// Every accessor returns None once the payload is exhausted.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of bits left to read
    pub fn remaining(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    /// Reads an unsigned field of `len` bits (up to 64)
    pub fn u(&mut self, len: usize) -> Option<u64> {
        if len > 64 || self.remaining() < len {
            return None;
        }

        let mut value = 0u64;
        for _ in 0..len {
            let byte = self.data[self.pos / 8];
            let bit = (byte >> (7 - (self.pos % 8))) & 0x01;
            value = (value << 1) | bit as u64;
            self.pos += 1;
        }

        Some(value)
    }

    /// Reads a two's complement signed field of `len` bits (up to 64)
    pub fn i(&mut self, len: usize) -> Option<i64> {
        if len == 0 {
            return Some(0);
        }

        let raw = self.u(len)?;

        if len == 64 {
            return Some(raw as i64);
        }

        let sign = 1u64 << (len - 1);
        if raw & sign != 0 {
            Some((raw | !((1u64 << len) - 1)) as i64)
        } else {
            Some(raw as i64)
        }
    }

    pub fn bit(&mut self) -> Option<bool> {
        self.u(1).map(|b| b == 1)
    }

    pub fn skip(&mut self, len: usize) -> Option<()> {
        if self.remaining() < len {
            return None;
        }
        self.pos += len;
        Some(())
    }

    /// Reads `count` 8 bit characters
    pub fn string(&mut self, count: usize) -> Option<String> {
        let mut bytes = Vec::with_capacity(count);
        for _ in 0..count {
            bytes.push(self.u(8)? as u8);
        }
        Some(String::from_utf8_lossy(&bytes).trim_end().to_string())
    }
}
