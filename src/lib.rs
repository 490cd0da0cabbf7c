//! Phonetic text encoding for character-level models.
//!
//! Dictionary words are replaced by their ARPAbet transcription, written with
//! a block of reserved codepoints that never occur in the corpus, and the
//! result is packed into fixed-length `u8` records.

pub mod alphabet;
pub mod cache;
pub mod codebook;
pub mod codec;
pub mod config;
pub mod corpus;
pub mod dictionary;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod validation;

pub use alphabet::{allocate_reserved, is_word_char, ControlSymbols, SymbolSpace};
pub use cache::{BuildLock, CodebookCache, JsonFileCache, MemoryCache};
pub use codebook::{Codebook, CodebookArtifacts};
pub use codec::{decode, encode, truncate_at_word_boundary, CodeTable, DecodedRecord};
pub use config::{CodebookInputs, PipelineConfig};
pub use corpus::ObservedChars;
pub use dictionary::{load_phoneme_symbols, read_phoneme_symbols, ParseStats, Pronunciations};
pub use error::CodecError;
pub use matcher::LongestMatcher;
pub use pipeline::PhoneticEncoder;
pub use validation::{verify_lines, verify_records, RoundTripReport};

/// Static constants shared by the allocator and the code table.
pub mod constants {
    /// Default record length, matching the character CNN input width.
    pub const DEFAULT_MAXLEN: usize = 1014;
    /// First codepoint considered for reserved symbols (U+00C0).
    pub const CODEPOINT_OFFSET: u32 = 192;
    /// Control symbols appended after the phonetic block: padding, end, unknown.
    pub const N_CONTROL_SYMBOLS: usize = 3;
    /// Characters accepted verbatim in encoded text.
    pub const PRINTABLE_ALPHABET: &str =
        " abcdefghijklmnopqrstuvwxyz0123456789-,;.!?:'\"/|_#$%^&*~+=<>()[]{}";
    /// Records are `u8`, so the code table holds at most 256 symbols.
    pub const MAX_ALPHABET_SIZE: usize = 256;

    pub const PADDING_CODE: u8 = 0;
    pub const END_CODE: u8 = 1;
    pub const UNKNOWN_CODE: u8 = 2;
}
