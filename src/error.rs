use std::fmt;

/// Errors that can occur while encoding tapes or listing BASIC programs.
///
/// Decoder-side impairments (checksum failures, resync timeouts, corrupt
/// records) are diagnostics, not errors: they are logged and the pipeline
/// keeps going, biased toward emitting whatever can still be recovered.
#[derive(Debug, Clone, PartialEq)]
pub enum TapeError {
    EmptyInput,
    TooManyRecords(usize),
    ImageTooShort { len: usize },
    HeaderChecksum { expected: u16, actual: u16 },
    LineTableLength { len: usize },
    LineTableOutOfBounds { table_len: usize, image_len: usize },
    InvalidToken { offset: usize, token: u8 },
    InvalidLineEnd { offset: usize, found: u8 },
    TruncatedLine { offset: usize },
    UnknownProfile(String),
    WavError(String),
    AudioError(String),
}

impl fmt::Display for TapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapeError::EmptyInput => write!(f, "No input data to encode"),
            TapeError::TooManyRecords(n) => {
                write!(f, "Too many records: {} (maximum 255)", n)
            }
            TapeError::ImageTooShort { len } => {
                write!(f, "Program image too short for header: {} bytes", len)
            }
            TapeError::HeaderChecksum { expected, actual } => {
                write!(
                    f,
                    "Program header checksum failure: expected 0x{:04X}, got 0x{:04X}",
                    expected, actual
                )
            }
            TapeError::LineTableLength { len } => {
                write!(f, "Line table length {} is not a positive multiple of 4", len)
            }
            TapeError::LineTableOutOfBounds { table_len, image_len } => {
                write!(
                    f,
                    "Line table ({} bytes) does not fit a {}-byte image",
                    table_len, image_len
                )
            }
            TapeError::InvalidToken { offset, token } => {
                write!(f, "[offset {}] Invalid token 0x{:02X}", offset, token)
            }
            TapeError::InvalidLineEnd { offset, found } => {
                write!(f, "[offset {}] Invalid end-of-line byte 0x{:02X}", offset, found)
            }
            TapeError::TruncatedLine { offset } => {
                write!(f, "[offset {}] Line data extends beyond the image", offset)
            }
            TapeError::UnknownProfile(name) => write!(f, "Unknown decoder profile: {}", name),
            TapeError::WavError(msg) => write!(f, "WAV error: {}", msg),
            TapeError::AudioError(msg) => write!(f, "Audio error: {}", msg),
        }
    }
}

impl std::error::Error for TapeError {}
