/// Tape protocol constants for the TI-99/4A cassette format.

// ── Timing ──

/// Sample rate contract with the outer audio layer (Hz).
pub const SAMPLE_RATE: u32 = 44100;

/// Samples per bit period at [`SAMPLE_RATE`] (~1378 Hz base frequency).
pub const SYMBOL_LEN: usize = 32;

// ── Framing ──

/// Byte terminating every synchronization run.
pub const FRAME_BYTE: u8 = 0xFF;

/// Payload bytes per record.
pub const RECORD_LEN: usize = 64;

/// Checksum bytes per record.
pub const CHKSUM_LEN: usize = 1;

/// Zero bytes the encoder writes ahead of the header. Real tapes carry
/// roughly this much; a little more does not hurt.
pub const INITIAL_SYNC_LEN: usize = 768;

/// Byte used to pad encoder input up to a record boundary.
pub const PAD_BYTE: u8 = 0x80;

/// Peak output level of the synthesized square wave.
pub const MAX_LEVEL: i16 = 0x7FFF;

// ── Decoder sync budgets ──

/// Upper bound on initial synchronization symbols. Slightly above the
/// nominal pilot length; some decks write more.
pub const MAX_INITIAL_SYNC_SYMBOLS: u64 = 800 * 8;

/// Synchronization symbols between record copies (8 zero bytes).
pub const MAX_RECORD_SYNC_SYMBOLS: u64 = 8 * 8;

/// Symbols in the [`FRAME_BYTE`] that terminates a sync run.
pub const END_OF_SYNC_SYMBOLS: u64 = 8;
