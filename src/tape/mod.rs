pub mod bits;
pub mod constants;
pub mod decode;
pub mod encode;
pub mod records;
pub mod signal;

pub use constants::*;
pub use bits::BitDecoder;
pub use decode::TapeDecoder;
pub use encode::{EncodedTape, TapeEncoder};
pub use records::{record_checksum, ByteAction, ByteSink, DecodeStats, DecodedProgram, RecordAssembler};
pub use signal::{Edge, EdgeDetector, Level};
