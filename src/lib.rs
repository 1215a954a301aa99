pub mod basic;
pub mod error;
pub mod profile;
pub mod tape;
pub mod tifiles;

#[cfg(feature = "audio")]
pub mod wav;

#[cfg(feature = "audio-live")]
pub mod live;

// Re-exports for convenience
pub use error::TapeError;
pub use profile::DecoderProfile;
pub use tape::{
    record_checksum, DecodeStats, DecodedProgram, EncodedTape, TapeDecoder, TapeEncoder,
};
pub use basic::{decode_line, list_program, parse_header, ImageHeader, ListedLine};
pub use tifiles::wrap_tifiles;

#[cfg(feature = "audio")]
pub use wav::{read_wav, write_wav};

#[cfg(feature = "audio-live")]
pub use live::{play_samples, record_samples};
