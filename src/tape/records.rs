use log::{debug, error, warn};
use serde::Serialize;

use crate::tape::constants::{CHKSUM_LEN, RECORD_LEN};

/// Reply from the record layer for each completed byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteAction {
    /// Keep decoding bits.
    Continue,
    /// Re-align on the next sync run before decoding further bytes.
    RequestResync,
    /// The current program is finished (or abandoned); wait for a new pilot.
    Done,
}

/// Consumer of decoded bytes; the contract between the bit layer and the
/// record layer.
pub trait ByteSink {
    fn process_byte(&mut self, value: u8, error_mask: u8) -> ByteAction;

    /// Called when resynchronization missed its deadline. Returns `true` if
    /// the bit layer should skip the current record copy and try the next
    /// one, `false` to abandon the current program.
    fn resync_failed(&mut self) -> bool;

    /// Called when the input stream ends.
    fn process_eof(&mut self);
}

/// Sum-mod-256 checksum over a record payload.
pub fn record_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn verify_record(buf: &[u8]) -> bool {
    buf.len() == RECORD_LEN + CHKSUM_LEN && record_checksum(&buf[..RECORD_LEN]) == buf[RECORD_LEN]
}

/// A fully recovered program payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedProgram {
    pub record_count: u8,
    /// `64 * record_count` payload bytes.
    pub data: Vec<u8>,
}

/// Counters describing a decode run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub programs_emitted: u32,
    pub programs_failed: u32,
    /// Records whose primary copy failed but whose secondary validated.
    pub records_from_secondary: u32,
    /// Records rebuilt by merging two corrupt copies.
    pub records_reconstructed: u32,
}

/// Assembles bytes into checksummed records and records into programs,
/// reconciling the two transmitted copies of every record.
///
/// Owns no I/O: completed programs accumulate until drained with
/// [`RecordAssembler::take_programs`]; impairments are logged.
pub struct RecordAssembler {
    buf: Vec<u8>,
    mask: Vec<u8>,

    read_header: bool,
    rec_cnt: usize,
    rec_idx: usize,
    rec_primary: bool,
    rec_processed: bool,

    primary_buf: Vec<u8>,
    primary_mask: Vec<u8>,

    data: Vec<u8>,
    data_corrupt: bool,

    programs: Vec<DecodedProgram>,
    stats: DecodeStats,
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            mask: Vec::new(),
            read_header: true,
            rec_cnt: 0,
            rec_idx: 0,
            rec_primary: true,
            rec_processed: false,
            primary_buf: Vec::new(),
            primary_mask: Vec::new(),
            data: Vec::new(),
            data_corrupt: false,
            programs: Vec::new(),
            stats: DecodeStats::default(),
        }
    }

    /// Drain the programs completed so far.
    pub fn take_programs(&mut self) -> Vec<DecodedProgram> {
        std::mem::take(&mut self.programs)
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    fn clear_state(&mut self) {
        self.buf.clear();
        self.mask.clear();
        self.read_header = true;
        self.rec_cnt = 0;
        self.rec_idx = 0;
        self.rec_primary = true;
        self.rec_processed = false;
        self.primary_buf.clear();
        self.primary_mask.clear();
        self.data.clear();
        self.data_corrupt = false;
    }

    fn process_header(&mut self) -> ByteAction {
        if self.buf.len() < 2 {
            return ByteAction::Continue;
        }
        if self.buf[0] != self.buf[1] {
            error!(
                "header record count mismatch ({} vs {})",
                self.buf[0], self.buf[1]
            );
            self.stats.programs_failed += 1;
            self.clear_state();
            return ByteAction::Done;
        }
        if self.buf[0] == 0 {
            error!("header record count is zero");
            self.stats.programs_failed += 1;
            self.clear_state();
            return ByteAction::Done;
        }

        self.rec_cnt = usize::from(self.buf[0]);
        self.rec_idx = 0;
        self.read_header = false;
        self.buf.clear();
        self.mask.clear();
        debug!("header parsed, record count = {}", self.rec_cnt);
        ByteAction::RequestResync
    }

    /// Close out the current record copy. The buffer may be short or empty
    /// when synchronization on this copy failed.
    fn finish_record(&mut self) -> ByteAction {
        let copy = if self.rec_primary { 'a' } else { 'b' };
        let record_valid = if self.buf.is_empty() {
            warn!("record {}{}: synchronization failed", self.rec_idx + 1, copy);
            false
        } else if !verify_record(&self.buf) {
            warn!("record {}{}: incorrect checksum", self.rec_idx + 1, copy);
            false
        } else {
            true
        };

        if self.rec_primary {
            if record_valid {
                self.data.extend_from_slice(&self.buf[..RECORD_LEN]);
                self.rec_processed = true;
            } else {
                // Keep the corrupt copy as the reconstruction basis.
                self.primary_buf = std::mem::take(&mut self.buf);
                self.primary_mask = std::mem::take(&mut self.mask);
            }
            self.rec_primary = false;
        } else {
            let mut record_corrupt = false;
            if !self.rec_processed {
                if record_valid {
                    self.data.extend_from_slice(&self.buf[..RECORD_LEN]);
                    self.stats.records_from_secondary += 1;
                } else if let Some(rebuilt) = self.reconstruct() {
                    debug!("record {}: reconstructed from both copies", self.rec_idx + 1);
                    self.data.extend_from_slice(&rebuilt[..RECORD_LEN]);
                    self.stats.records_reconstructed += 1;
                } else {
                    error!(
                        "record {}: both copies corrupt, reconstruction failed",
                        self.rec_idx + 1
                    );
                    record_corrupt = true;
                }
            } else if record_valid {
                // Both copies validated; they must agree.
                let start = self.data.len() - RECORD_LEN;
                if self.data[start..] != self.buf[..RECORD_LEN] {
                    error!(
                        "record {}: primary and secondary copies don't match",
                        self.rec_idx + 1
                    );
                    record_corrupt = true;
                }
            }

            if record_corrupt {
                self.data_corrupt = true;
            } else {
                debug!("record {} received", self.rec_idx + 1);
            }

            self.rec_primary = true;
            self.rec_processed = false;
            self.rec_idx += 1;
        }

        self.buf.clear();
        self.mask.clear();

        if self.rec_idx == self.rec_cnt {
            self.complete_program();
            self.clear_state();
            return ByteAction::Done;
        }
        ByteAction::RequestResync
    }

    /// Merge the two corrupt copies. Works only when no bit position is
    /// suspect in both copies; suspect bits are 0 in the value, so OR
    /// restores them from the other copy.
    fn reconstruct(&self) -> Option<Vec<u8>> {
        if self.primary_buf.len() != RECORD_LEN + CHKSUM_LEN
            || self.buf.len() != self.primary_buf.len()
        {
            return None;
        }
        let mut rebuilt = Vec::with_capacity(self.buf.len());
        for i in 0..self.buf.len() {
            if self.primary_mask[i] & self.mask[i] != 0 {
                return None;
            }
            rebuilt.push(self.primary_buf[i] | self.buf[i]);
        }
        if verify_record(&rebuilt) {
            Some(rebuilt)
        } else {
            None
        }
    }

    fn complete_program(&mut self) {
        if self.data_corrupt {
            error!("program received but corrupt; not emitted");
            self.stats.programs_failed += 1;
            return;
        }
        debug!(
            "program complete: {} records, {} bytes",
            self.rec_cnt,
            self.data.len()
        );
        self.programs.push(DecodedProgram {
            record_count: self.rec_cnt as u8,
            data: std::mem::take(&mut self.data),
        });
        self.stats.programs_emitted += 1;
    }
}

impl Default for RecordAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSink for RecordAssembler {
    fn process_byte(&mut self, value: u8, error_mask: u8) -> ByteAction {
        self.buf.push(value);
        self.mask.push(error_mask);

        if self.read_header {
            self.process_header()
        } else if self.buf.len() == RECORD_LEN + CHKSUM_LEN {
            self.finish_record()
        } else {
            ByteAction::Continue
        }
    }

    fn resync_failed(&mut self) -> bool {
        if !self.read_header {
            // Whatever is buffered cannot pass its checksum; run it through
            // record completion so the pair bookkeeping stays consistent.
            if self.finish_record() == ByteAction::RequestResync {
                return true;
            }
        }
        false
    }

    fn process_eof(&mut self) {
        if !self.read_header {
            if self.rec_idx + 1 == self.rec_cnt && self.rec_processed {
                // The final record's primary copy was already accepted; the
                // stream ended during its secondary.
                self.complete_program();
            } else {
                error!(
                    "end of input with {}/{} records received",
                    self.rec_idx, self.rec_cnt
                );
                self.stats.programs_failed += 1;
            }
        }
        self.clear_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_law() {
        let payload: Vec<u8> = (0u8..64).collect();
        let sum = record_checksum(&payload);
        assert_eq!(sum, (0..64u32).sum::<u32>() as u8);
        let mut rec = payload.clone();
        rec.push(sum);
        assert!(verify_record(&rec));
        rec[10] ^= 0x01;
        assert!(!verify_record(&rec));
    }

    #[test]
    fn header_then_clean_pair_emits_program() {
        let mut asm = RecordAssembler::new();
        assert_eq!(asm.process_byte(1, 0), ByteAction::Continue);
        assert_eq!(asm.process_byte(1, 0), ByteAction::RequestResync);

        let payload = [0x11u8; RECORD_LEN];
        let chk = record_checksum(&payload);
        for &b in &payload {
            assert_eq!(asm.process_byte(b, 0), ByteAction::Continue);
        }
        assert_eq!(asm.process_byte(chk, 0), ByteAction::RequestResync);
        for &b in &payload {
            asm.process_byte(b, 0);
        }
        assert_eq!(asm.process_byte(chk, 0), ByteAction::Done);

        let programs = asm.take_programs();
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].record_count, 1);
        assert_eq!(programs[0].data, payload);
        assert_eq!(asm.stats().programs_emitted, 1);
    }

    #[test]
    fn header_mismatch_abandons_program() {
        let mut asm = RecordAssembler::new();
        assert_eq!(asm.process_byte(3, 0), ByteAction::Continue);
        assert_eq!(asm.process_byte(4, 0), ByteAction::Done);
        assert!(asm.take_programs().is_empty());
        assert_eq!(asm.stats().programs_failed, 1);
    }

    #[test]
    fn zero_record_count_abandons_program() {
        let mut asm = RecordAssembler::new();
        asm.process_byte(0, 0);
        assert_eq!(asm.process_byte(0, 0), ByteAction::Done);
        assert!(asm.take_programs().is_empty());
    }

    #[test]
    fn secondary_recovers_corrupt_primary() {
        let mut asm = RecordAssembler::new();
        asm.process_byte(1, 0);
        asm.process_byte(1, 0);

        let payload = [0x22u8; RECORD_LEN];
        let chk = record_checksum(&payload);

        // Primary with a flipped byte.
        let mut bad = payload;
        bad[5] ^= 0xFF;
        for &b in &bad {
            asm.process_byte(b, 0);
        }
        assert_eq!(asm.process_byte(chk, 0), ByteAction::RequestResync);

        for &b in &payload {
            asm.process_byte(b, 0);
        }
        assert_eq!(asm.process_byte(chk, 0), ByteAction::Done);

        let programs = asm.take_programs();
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].data, payload);
        assert_eq!(asm.stats().records_from_secondary, 1);
    }

    #[test]
    fn disjoint_masks_reconstruct_record() {
        let mut asm = RecordAssembler::new();
        asm.process_byte(1, 0);
        asm.process_byte(1, 0);

        let mut truth = [0u8; RECORD_LEN];
        for (i, b) in truth.iter_mut().enumerate() {
            *b = 0xFF ^ (i as u8);
        }
        let chk = record_checksum(&truth);

        // Copy a: bits 5 and 17 dropped (byte 0 bit 2, byte 2 bit 6).
        // Copy b: bit 42 dropped (byte 5 bit 2).
        // Bit k counts from the MSB of byte 0, matching the wire order.
        let mut a = truth;
        let mut a_mask = [0u8; RECORD_LEN + CHKSUM_LEN];
        a[0] &= !(1 << 2);
        a_mask[0] = 1 << 2;
        a[2] &= !(1 << 6);
        a_mask[2] = 1 << 6;

        let mut b = truth;
        let mut b_mask = [0u8; RECORD_LEN + CHKSUM_LEN];
        b[5] &= !(1 << 5);
        b_mask[5] = 1 << 5;

        for i in 0..RECORD_LEN {
            asm.process_byte(a[i], a_mask[i]);
        }
        assert_eq!(asm.process_byte(chk, 0), ByteAction::RequestResync);

        for i in 0..RECORD_LEN {
            asm.process_byte(b[i], b_mask[i]);
        }
        assert_eq!(asm.process_byte(chk, 0), ByteAction::Done);

        let programs = asm.take_programs();
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].data, truth);
        assert_eq!(asm.stats().records_reconstructed, 1);
    }

    #[test]
    fn overlapping_masks_are_unrecoverable() {
        let mut asm = RecordAssembler::new();
        asm.process_byte(1, 0);
        asm.process_byte(1, 0);

        let truth = [0xFFu8; RECORD_LEN];
        let chk = record_checksum(&truth);

        // Both copies lost the same bit.
        let mut bad = truth;
        bad[7] &= !(1 << 3);
        for _ in 0..2 {
            for &byte in &bad {
                asm.process_byte(byte, if byte == bad[7] { 1 << 3 } else { 0 });
            }
            asm.process_byte(chk, 0);
        }

        assert!(asm.take_programs().is_empty());
        assert_eq!(asm.stats().programs_failed, 1);
    }

    #[test]
    fn valid_copies_that_disagree_mark_program_corrupt() {
        let mut asm = RecordAssembler::new();
        asm.process_byte(1, 0);
        asm.process_byte(1, 0);

        let a = [0x01u8; RECORD_LEN];
        let mut b = a;
        b[0] = 0x03;
        b[1] = 0xFF;
        // Same checksum, different content.
        assert_eq!(record_checksum(&a), record_checksum(&b));

        for &byte in &a {
            asm.process_byte(byte, 0);
        }
        asm.process_byte(record_checksum(&a), 0);
        for &byte in &b {
            asm.process_byte(byte, 0);
        }
        assert_eq!(asm.process_byte(record_checksum(&b), 0), ByteAction::Done);

        assert!(asm.take_programs().is_empty());
        assert_eq!(asm.stats().programs_failed, 1);
    }

    #[test]
    fn eof_after_final_primary_emits_program() {
        let mut asm = RecordAssembler::new();
        asm.process_byte(1, 0);
        asm.process_byte(1, 0);

        let payload = [0x5Au8; RECORD_LEN];
        for &b in &payload {
            asm.process_byte(b, 0);
        }
        assert_eq!(
            asm.process_byte(record_checksum(&payload), 0),
            ByteAction::RequestResync
        );

        asm.process_eof();
        let programs = asm.take_programs();
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].data, payload);
    }

    #[test]
    fn eof_mid_record_reports_incomplete() {
        let mut asm = RecordAssembler::new();
        asm.process_byte(2, 0);
        asm.process_byte(2, 0);
        for _ in 0..10 {
            asm.process_byte(0xAB, 0);
        }
        asm.process_eof();
        assert!(asm.take_programs().is_empty());
        assert_eq!(asm.stats().programs_failed, 1);
    }

    #[test]
    fn resync_failure_on_primary_skips_to_secondary() {
        let mut asm = RecordAssembler::new();
        asm.process_byte(1, 0);
        asm.process_byte(1, 0);

        // Primary sync never arrived: empty buffer, skip requested.
        assert!(asm.resync_failed());

        let payload = [0x77u8; RECORD_LEN];
        for &b in &payload {
            asm.process_byte(b, 0);
        }
        assert_eq!(
            asm.process_byte(record_checksum(&payload), 0),
            ByteAction::Done
        );

        let programs = asm.take_programs();
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].data, payload);
        assert_eq!(asm.stats().records_from_secondary, 1);
    }

    #[test]
    fn resync_failure_on_final_secondary_reports_abandon() {
        let mut asm = RecordAssembler::new();
        asm.process_byte(1, 0);
        asm.process_byte(1, 0);

        let payload = [0x10u8; RECORD_LEN];
        for &b in &payload {
            asm.process_byte(b, 0);
        }
        asm.process_byte(record_checksum(&payload), 0);

        // Secondary of the only record never synced: the pair closes, the
        // program completes, and the bit layer must not skip further.
        assert!(!asm.resync_failed());
        assert_eq!(asm.take_programs().len(), 1);
    }
}
