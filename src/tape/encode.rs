use crate::error::TapeError;
use crate::tape::constants::{
    CHKSUM_LEN, FRAME_BYTE, INITIAL_SYNC_LEN, MAX_LEVEL, PAD_BYTE, RECORD_LEN, SAMPLE_RATE,
    SYMBOL_LEN,
};
use crate::tape::records::record_checksum;

/// Result of tape synthesis: PCM samples + metadata.
pub struct EncodedTape {
    /// Mono i16 samples at [`EncodedTape::sample_rate`].
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Total duration in seconds.
    pub duration: f32,
}

/// Encodes a byte stream into a TI-99/4A tape waveform.
pub struct TapeEncoder {
    high_pass: bool,
}

/// Square-wave synthesis state: the output level toggles at every symbol
/// start, and once more at the midpoint for a 1 bit.
struct SampleWriter {
    samples: Vec<i16>,
    level: i16,
    high_pass: bool,
    last_level: f64,
    last_filtered: f64,
}

impl SampleWriter {
    fn new(capacity: usize, high_pass: bool) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            level: MAX_LEVEL,
            high_pass,
            last_level: f64::from(MAX_LEVEL),
            last_filtered: 0.0,
        }
    }

    fn push_level(&mut self) {
        let sample = if self.high_pass {
            let filtered =
                0.800 * (self.last_filtered + f64::from(self.level) - self.last_level);
            self.last_filtered = filtered;
            self.last_level = f64::from(self.level);
            (filtered / 2.0) as i16
        } else {
            self.level
        };
        self.samples.push(sample);
    }

    fn write_byte(&mut self, byte: u8) {
        let mut b = byte;
        for _ in 0..8 {
            self.level = -self.level;
            for _ in 0..SYMBOL_LEN / 2 {
                self.push_level();
            }
            if b & 0x80 != 0 {
                self.level = -self.level;
            }
            for _ in 0..SYMBOL_LEN / 2 {
                self.push_level();
            }
            b <<= 1;
        }
    }
}

impl TapeEncoder {
    pub fn new() -> Self {
        Self { high_pass: false }
    }

    /// Enable the output high-pass filter
    /// (`y[n] = 0.8 * (y[n-1] + x[n] - x[n-1])`, output `y / 2`).
    pub fn with_high_pass(high_pass: bool) -> Self {
        Self { high_pass }
    }

    /// Encode `data` as tape audio.
    ///
    /// Input shorter than a record multiple is padded with 0x80 bytes; the
    /// padding is indistinguishable from payload, so consumers that rely on
    /// exact byte counts must supply data that is already a multiple of 64.
    pub fn encode(&self, data: &[u8]) -> Result<EncodedTape, TapeError> {
        if data.is_empty() {
            return Err(TapeError::EmptyInput);
        }

        let mut padded = data.to_vec();
        let rem = padded.len() % RECORD_LEN;
        if rem != 0 {
            padded.resize(padded.len() + RECORD_LEN - rem, PAD_BYTE);
        }
        let nrecords = padded.len() / RECORD_LEN;
        if nrecords > 0xFF {
            return Err(TapeError::TooManyRecords(nrecords));
        }

        let total_bytes = INITIAL_SYNC_LEN
            + 3
            + nrecords * 2 * (8 + 1 + RECORD_LEN + CHKSUM_LEN);
        let mut w = SampleWriter::new(total_bytes * 8 * SYMBOL_LEN, self.high_pass);

        for _ in 0..INITIAL_SYNC_LEN {
            w.write_byte(0x00);
        }

        w.write_byte(FRAME_BYTE);
        w.write_byte(nrecords as u8);
        w.write_byte(nrecords as u8);

        for record in padded.chunks(RECORD_LEN) {
            for _ in 0..2 {
                for _ in 0..8 {
                    w.write_byte(0x00);
                }
                w.write_byte(FRAME_BYTE);
                for &b in record {
                    w.write_byte(b);
                }
                w.write_byte(record_checksum(record));
            }
        }

        let duration = w.samples.len() as f32 / SAMPLE_RATE as f32;
        Ok(EncodedTape {
            samples: w.samples,
            sample_rate: SAMPLE_RATE,
            duration,
        })
    }
}

impl Default for TapeEncoder {
    fn default() -> Self {
        Self::new()
    }
}
