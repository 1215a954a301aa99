use serde::{Deserialize, Serialize};

use crate::error::TapeError;

/// Tuning parameters for the tape signal decoder.
///
/// A profile is threaded into each pipeline stage at construction; there is
/// no process-wide decoder configuration. Two built-in profiles ship
/// ([`PEAK1`] and [`EDGE1`]); custom profiles can be deserialized from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecoderProfile {
    /// Use the tracked peak position instead of the threshold crossing as
    /// the symbol-boundary timestamp.
    pub use_peak: bool,
    /// Consecutive matching inter-edge intervals required before the pilot
    /// training completes. Kept well above `(64 + 1 + 1) * 2` so record
    /// content cannot retrigger training, and large enough that tape decks
    /// finish their volume ramp before the symbol clock is frozen.
    pub training_threshold: u32,
    /// Lower bound on an accepted symbol length, in samples.
    pub min_bit_len: f64,
    /// Hysteresis band as a fraction of half the dynamic range (0..1).
    pub hysteresis: f64,
    /// Tolerance on symbol boundary placement as a fraction of the symbol
    /// length.
    pub max_bit_diff: f64,
    /// Per-sample decay factor of the tracked amplitude envelope.
    pub range_decay: f64,
    /// Re-anchor the symbol clock to every detected boundary. Required for
    /// tapes with speed drift, since there is no inter-record retraining.
    pub continuous_resync: bool,
}

/// Peak-detection based decoding, the default profile.
pub const PEAK1: DecoderProfile = DecoderProfile {
    use_peak: true,
    training_threshold: 400,
    min_bit_len: 10.0,
    hysteresis: 0.50,
    max_bit_diff: 0.24,
    range_decay: 0.990,
    continuous_resync: true,
};

/// Edge-detection based decoding.
pub const EDGE1: DecoderProfile = DecoderProfile {
    use_peak: false,
    training_threshold: 400,
    min_bit_len: 10.0,
    hysteresis: 0.80,
    max_bit_diff: 0.24,
    range_decay: 0.995,
    continuous_resync: true,
};

impl DecoderProfile {
    /// Look up a built-in profile by name.
    pub fn named(name: &str) -> Result<DecoderProfile, TapeError> {
        match name {
            "peak1" => Ok(PEAK1),
            "edge1" => Ok(EDGE1),
            _ => Err(TapeError::UnknownProfile(name.to_string())),
        }
    }

    /// Names and descriptions of the built-in profiles.
    pub fn builtin() -> &'static [(&'static str, &'static str)] {
        &[
            ("peak1", "Basic peak detection based decoder (default)"),
            ("edge1", "Basic edge detection based decoder"),
        ]
    }
}

impl Default for DecoderProfile {
    fn default() -> Self {
        PEAK1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_lookup() {
        assert_eq!(DecoderProfile::named("peak1").unwrap(), PEAK1);
        assert_eq!(DecoderProfile::named("edge1").unwrap(), EDGE1);
        assert!(DecoderProfile::named("peak2").is_err());
    }

    #[test]
    fn json_roundtrip() {
        let json = serde_json::to_string(&EDGE1).unwrap();
        let back: DecoderProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EDGE1);
    }
}
