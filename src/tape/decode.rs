use crate::profile::DecoderProfile;
use crate::tape::bits::BitDecoder;
use crate::tape::records::{DecodeStats, DecodedProgram, RecordAssembler};
use crate::tape::signal::EdgeDetector;

/// Decodes a stream of signed 16-bit samples into tape programs.
///
/// A push-driven, single-threaded pipeline: the edge detector turns samples
/// into edges, the bit decoder turns edges into bytes, the record assembler
/// turns bytes into validated programs. All downstream effects of sample `n`
/// complete before sample `n + 1` is presented. Samples must arrive
/// gap-free at the tape sample rate.
pub struct TapeDecoder {
    signal: EdgeDetector,
    bits: BitDecoder,
    records: RecordAssembler,
}

impl TapeDecoder {
    pub fn new(profile: DecoderProfile) -> Self {
        Self {
            signal: EdgeDetector::new(&profile),
            bits: BitDecoder::new(profile),
            records: RecordAssembler::new(),
        }
    }

    /// Feed one sample through the whole pipeline.
    pub fn push_sample(&mut self, sample: i16) {
        if let Some(edge) = self.signal.push_sample(sample) {
            self.bits.process_edge(edge, &mut self.records);
        }
    }

    /// Signal end of input. May complete one final program whose last
    /// record was already reconstructed from its primary copy.
    pub fn finish(&mut self) {
        self.bits.process_eof(&mut self.records);
    }

    /// Drain the programs recovered so far.
    pub fn take_programs(&mut self) -> Vec<DecodedProgram> {
        self.records.take_programs()
    }

    pub fn stats(&self) -> DecodeStats {
        self.records.stats()
    }

    /// Decode a complete sample buffer in one call.
    pub fn decode(&mut self, samples: &[i16]) -> Vec<DecodedProgram> {
        for &s in samples {
            self.push_sample(s);
        }
        self.finish();
        self.take_programs()
    }
}
