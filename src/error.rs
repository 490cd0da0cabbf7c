//! Structured error type for failures callers may want to match on.
//!
//! Library functions return `anyhow::Result`; these variants are raised as the
//! root cause so they can be recovered with `downcast_ref::<CodecError>()`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("codepoint space exhausted: needed {needed} reserved symbols, found {found}")]
    AllocationExhausted { needed: usize, found: usize },

    #[error("alphabet has {size} symbols, more than the {max} a u8 record can hold")]
    AlphabetTooLarge { size: usize, max: usize },

    #[error("symbol {symbol:?} (U+{code:04X}) appears in more than one alphabet class")]
    DuplicateSymbol { symbol: char, code: u32 },

    #[error("Invalid maxlen {0}: records need room for at least the end marker")]
    InvalidMaxlen(usize),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl CodecError {
    pub fn duplicate(symbol: char) -> Self {
        CodecError::DuplicateSymbol {
            symbol,
            code: symbol as u32,
        }
    }

    /// Find a `CodecError` anywhere in an `anyhow` chain.
    pub fn find(err: &anyhow::Error) -> Option<&CodecError> {
        err.chain().find_map(|cause| cause.downcast_ref::<CodecError>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_find_through_context() {
        let result: anyhow::Result<()> = Err(CodecError::InvalidMaxlen(0)).context("encoding line");
        let err = result.unwrap_err();
        assert_eq!(CodecError::find(&err), Some(&CodecError::InvalidMaxlen(0)));
        assert!(err.to_string().contains("encoding line"));
    }

    #[test]
    fn test_duplicate_display() {
        let err = CodecError::duplicate('\u{c0}');
        assert!(err.to_string().contains("U+00C0"));
    }
}
