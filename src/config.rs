//! Pipeline configuration and the input locations for a codebook build.

use anyhow::Result;
use std::path::PathBuf;

use crate::constants::{CODEPOINT_OFFSET, DEFAULT_MAXLEN};
use crate::error::CodecError;

pub const DEFAULT_CACHE_PATH: &str = "arpabet_codebook.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Location of the cached codebook bundle.
    pub cache_path: PathBuf,
    /// Record length, end marker included.
    pub maxlen: usize,
    /// First codepoint tried for reserved symbols.
    pub codepoint_offset: u32,
    /// Rebuild the codebook when the cached bundle came from different inputs.
    pub verify_fingerprint: bool,
    /// Substitute dictionary words with phonetic strings. When false lines
    /// are encoded as plain lowercase characters, for comparing datasets.
    pub phonetic: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            maxlen: DEFAULT_MAXLEN,
            codepoint_offset: CODEPOINT_OFFSET,
            verify_fingerprint: false,
            phonetic: true,
        }
    }
}

impl PipelineConfig {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            ..Self::default()
        }
    }

    pub fn with_maxlen(mut self, maxlen: usize) -> Self {
        self.maxlen = maxlen;
        self
    }

    pub fn with_verify_fingerprint(mut self, verify: bool) -> Self {
        self.verify_fingerprint = verify;
        self
    }

    pub fn with_phonetic(mut self, phonetic: bool) -> Self {
        self.phonetic = phonetic;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.maxlen == 0 {
            anyhow::bail!(CodecError::InvalidMaxlen(self.maxlen));
        }
        if self.codepoint_offset > char::MAX as u32 {
            anyhow::bail!(CodecError::InvalidConfig(format!(
                "codepoint_offset {:#x} is beyond the last Unicode scalar value",
                self.codepoint_offset
            )));
        }
        if self.cache_path.as_os_str().is_empty() {
            anyhow::bail!(CodecError::InvalidConfig("cache_path is empty".to_string()));
        }
        Ok(())
    }
}

/// Files a codebook is built from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodebookInputs {
    /// One phoneme symbol per line.
    pub phoneme_symbols_path: PathBuf,
    /// `word<TAB>phonemes` rows.
    pub dictionary_path: PathBuf,
    /// Text files whose characters the reserved symbols must avoid.
    pub corpus_paths: Vec<PathBuf>,
}

impl CodebookInputs {
    pub fn new(
        phoneme_symbols_path: impl Into<PathBuf>,
        dictionary_path: impl Into<PathBuf>,
        corpus_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            phoneme_symbols_path: phoneme_symbols_path.into(),
            dictionary_path: dictionary_path.into(),
            corpus_paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.maxlen, 1014);
        assert_eq!(config.codepoint_offset, 192);
        assert!(!config.verify_fingerprint);
        assert!(config.phonetic);
        assert!(!config.with_phonetic(false).phonetic);
    }

    #[test]
    fn test_rejects_zero_maxlen() {
        let err = PipelineConfig::default().with_maxlen(0).validate().unwrap_err();
        assert_eq!(CodecError::find(&err), Some(&CodecError::InvalidMaxlen(0)));
    }

    #[test]
    fn test_rejects_bad_offset_and_path() {
        let config = PipelineConfig {
            codepoint_offset: 0x11_0000,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(PipelineConfig::new("").validate().is_err());
    }
}
