use log::{debug, warn};

use crate::profile::DecoderProfile;
use crate::tape::constants::{
    CHKSUM_LEN, END_OF_SYNC_SYMBOLS, MAX_INITIAL_SYNC_SYMBOLS, MAX_RECORD_SYNC_SYMBOLS,
    RECORD_LEN,
};
use crate::tape::records::{ByteAction, ByteSink};
use crate::tape::signal::Edge;

/// When the peak of a run lags this many symbol lengths behind the edge, the
/// signal has died out and the peak is amplifier overshoot; fall back to the
/// edge timestamp.
const PEAK_LAG_SYMBOLS: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Training,
    Resync,
    Active,
}

/// Turns signal edges into bytes.
///
/// The tape phase-encodes each bit: one edge per symbol period means 0, two
/// edges mean 1, so the bit is the parity of the intra-symbol edge count.
/// The decoder first measures the symbol length from the pilot tone
/// (training), then waits for the 0xFF byte that terminates each sync run
/// (resync), then shifts a bit per symbol boundary into a byte register
/// (active), synthesizing error-flagged 0 bits for missed symbols so the
/// record layer can attempt reconstruction.
pub struct BitDecoder {
    profile: DecoderProfile,
    phase: Phase,
    last_edge_frame: u64,

    // Training
    match_count: u32,
    last_match_frame: u64,

    // Symbol clock
    training_start: u64,
    edge_cnt: u64,
    symbol_len: f64,

    // Resync
    resync_start: u64,
    resync_max_symbols: u64,

    // Byte assembly
    edges_within_symbol: u32,
    byte: u8,
    error_mask: u8,
    bit_cnt: u8,
}

impl BitDecoder {
    pub fn new(profile: DecoderProfile) -> Self {
        Self {
            profile,
            phase: Phase::Training,
            last_edge_frame: 0,
            match_count: 0,
            last_match_frame: 0,
            training_start: 0,
            edge_cnt: 0,
            symbol_len: 0.0,
            resync_start: 0,
            resync_max_symbols: 0,
            edges_within_symbol: 0,
            byte: 0,
            error_mask: 0,
            bit_cnt: 0,
        }
    }

    /// The symbol length estimated during training, in samples. Zero until
    /// training has completed.
    pub fn symbol_len(&self) -> f64 {
        self.symbol_len
    }

    /// Process one edge, handing completed bytes to `sink`.
    pub fn process_edge(&mut self, edge: Edge, sink: &mut dyn ByteSink) {
        let mut frame = if self.profile.use_peak {
            edge.peak_frame
        } else {
            edge.edge_frame
        };
        if self.profile.use_peak
            && edge.edge_frame as f64 > edge.peak_frame as f64 + self.symbol_len * PEAK_LAG_SYMBOLS
        {
            frame = edge.edge_frame;
        }

        let level_len = frame as i64 - self.last_edge_frame as i64;
        self.last_edge_frame = frame;

        match self.phase {
            Phase::Training => self.train(frame, level_len),
            Phase::Resync => self.resync(frame, level_len, sink),
            Phase::Active => self.active(frame, sink),
        }
    }

    /// Propagate end-of-input and reset to training.
    pub fn process_eof(&mut self, sink: &mut dyn ByteSink) {
        sink.process_eof();
        self.clear_state();
    }

    fn clear_state(&mut self) {
        self.phase = Phase::Training;
        self.last_edge_frame = 0;
        self.match_count = 0;
        self.last_match_frame = 0;
        self.training_start = 0;
        self.edge_cnt = 0;
        self.symbol_len = 0.0;
        self.resync_start = 0;
        self.resync_max_symbols = 0;
        self.edges_within_symbol = 0;
        self.byte = 0;
        self.error_mask = 0;
        self.bit_cnt = 0;
    }

    fn start_resync(&mut self, frame: u64, max_symbols: u64) {
        self.phase = Phase::Resync;
        self.resync_start = frame;
        // Slack for the 0xFF terminator plus some symbol-length fluctuation.
        self.resync_max_symbols = max_symbols + END_OF_SYNC_SYMBOLS + 8;
        self.byte = 0;
        self.bit_cnt = 0;
        self.error_mask = 0;
        self.edges_within_symbol = 0;
    }

    /// Pilot training: wait for `training_threshold` consecutive inter-edge
    /// intervals that agree, then freeze the symbol length as their mean.
    fn train(&mut self, frame: u64, level_len: i64) {
        let tol = self.symbol_len * self.profile.max_bit_diff;
        if (level_len as f64 - self.symbol_len).abs() < tol {
            self.match_count += 1;
            self.last_match_frame = frame;
        } else {
            self.symbol_len = level_len as f64;
            self.training_start = frame;
            self.match_count = 0;
        }

        if self.match_count == self.profile.training_threshold
            && self.symbol_len > self.profile.min_bit_len
        {
            // The mean over the whole match run is more accurate than the
            // first interval that seeded the candidate.
            self.symbol_len =
                (self.last_match_frame - self.training_start) as f64 / f64::from(self.match_count);

            if self.profile.continuous_resync {
                self.training_start = frame;
                self.edge_cnt = 0;
            }
            self.match_count = 0;
            self.edges_within_symbol = 0;

            debug!(
                "training complete at frame {}, symbol length {:.3}",
                frame, self.symbol_len
            );
            self.start_resync(
                frame,
                MAX_INITIAL_SYNC_SYMBOLS - u64::from(self.profile.training_threshold),
            );
        }
    }

    /// Align the symbol clock to the sync run and wait for its 0xFF
    /// terminator.
    fn resync(&mut self, frame: u64, level_len: i64, sink: &mut dyn ByteSink) {
        // Deadline: no 0xFF within the sync budget.
        loop {
            let deadline =
                self.resync_start as f64 + self.resync_max_symbols as f64 * self.symbol_len;
            if (frame as f64) <= deadline {
                break;
            }
            warn!(
                "failed to resync before deadline (frame {} > {} + {} symbols)",
                frame, self.resync_start, self.resync_max_symbols
            );
            if sink.resync_failed() {
                // Skip one record copy: sync run, framing byte, payload and
                // checksum, plus one byte of slack in case we land halfway
                // into the next sync run.
                let skip = (MAX_RECORD_SYNC_SYMBOLS
                    + END_OF_SYNC_SYMBOLS
                    + ((RECORD_LEN + CHKSUM_LEN) as u64) * 8
                    + 8) as f64
                    * self.symbol_len;
                self.resync_start += skip as u64;
                if self.resync_start >= frame {
                    return;
                }
            } else {
                self.clear_state();
                return;
            }
        }

        let expected = (self.training_start as f64 + (self.edge_cnt + 1) as f64 * self.symbol_len)
            .round() as i64;
        let tol = self.symbol_len * self.profile.max_bit_diff;
        let frame_i = frame as i64;

        if ((frame_i - expected).abs() as f64) < tol {
            // Symbol boundary. An even intra-symbol edge count is taken as a
            // momentary signal drop, not a 1 bit.
            let bit = (self.edges_within_symbol % 2) as u8;
            self.byte = (self.byte << 1) | bit;

            if self.resync_start > frame {
                // Still inside a skipped record; keep slewing the clock but
                // ignore framing bytes that belong to the skipped copy.
            } else if self.byte == 0xFF {
                self.phase = Phase::Active;
            }

            if self.profile.continuous_resync {
                self.training_start = frame;
                self.edge_cnt = 0;
            } else {
                self.edge_cnt += 1;
            }
            self.edges_within_symbol = 0;
        } else if frame_i < expected {
            self.edges_within_symbol += 1;
        } else {
            // Missed symbols; sync bytes are all zero, so restart the byte.
            self.byte = 0;
            self.edges_within_symbol = 0;
            let missed = ((level_len as f64 + tol) / self.symbol_len).round() as u64;
            if self.profile.continuous_resync {
                self.training_start = frame;
                self.edge_cnt = 0;
            } else {
                self.edge_cnt += missed;
            }
        }
    }

    /// Decode data symbols. Missed boundaries synthesize a 0 bit with the
    /// matching error-mask bit set, then the residual interval is
    /// re-presented until the clock catches up with the edge; the loop keeps
    /// long dropouts off the call stack.
    fn active(&mut self, frame: u64, sink: &mut dyn ByteSink) {
        let frame_i = frame as i64;
        loop {
            let expected = (self.training_start as f64
                + (self.edge_cnt + 1) as f64 * self.symbol_len)
                .round() as i64;
            let tol = self.symbol_len * self.profile.max_bit_diff;

            let (bit, bit_error, missed) = if ((frame_i - expected).abs() as f64) < tol {
                let bit = (self.edges_within_symbol % 2) as u8;
                self.edges_within_symbol = 0;
                (bit, 0u8, false)
            } else if frame_i < expected {
                self.edges_within_symbol += 1;
                return;
            } else {
                // Missed boundary: synthesize a 0 so reconstruction knows
                // which bits to distrust.
                self.edges_within_symbol = 0;
                (0u8, 1u8, true)
            };

            self.edge_cnt += 1;
            self.byte = (self.byte << 1) | bit;
            self.error_mask = (self.error_mask << 1) | bit_error;
            self.bit_cnt += 1;

            if self.bit_cnt == 8 {
                let action = sink.process_byte(self.byte, self.error_mask);
                self.bit_cnt = 0;
                self.byte = 0;
                self.error_mask = 0;
                match action {
                    ByteAction::Continue => {}
                    ByteAction::RequestResync => {
                        self.start_resync(frame, MAX_RECORD_SYNC_SYMBOLS);
                    }
                    ByteAction::Done => {
                        // The next program starts with its own pilot; any
                        // residual interval is stale.
                        self.clear_state();
                        return;
                    }
                }
            }

            if self.profile.continuous_resync {
                self.training_start = if missed { expected as u64 } else { frame };
                self.edge_cnt = 0;
            }
            if !missed {
                return;
            }
        }
    }
}
