//! End-to-end encoder: text line -> prepared text -> fixed-width record.
//!
//! The encoder is built once (cache hit or full build) and is then shared
//! read-only, so batches can be encoded in parallel.

use anyhow::{Context, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;

use crate::alphabet::SymbolSpace;
use crate::cache::{CodebookCache, JsonFileCache};
use crate::codebook::{input_fingerprint, Codebook, CodebookArtifacts};
use crate::codec::{self, CodeTable, DecodedRecord};
use crate::config::{CodebookInputs, PipelineConfig};
use crate::corpus::ObservedChars;
use crate::dictionary::{load_phoneme_symbols, Pronunciations};
use crate::error::CodecError;

pub struct PhoneticEncoder {
    codebook: Codebook,
    table: CodeTable,
    maxlen: usize,
    phonetic: bool,
}

impl PhoneticEncoder {
    pub fn new(codebook: Codebook, maxlen: usize) -> Result<Self> {
        if maxlen == 0 {
            anyhow::bail!(CodecError::InvalidMaxlen(maxlen));
        }
        let space = SymbolSpace {
            phonetic: codebook.phonetic_symbols().to_vec(),
            controls: codebook.controls(),
        };
        let table = CodeTable::new(&space).context("Failed to build code table")?;
        tracing::debug!(symbols = table.len(), maxlen, "code table ready");
        Ok(Self {
            codebook,
            table,
            maxlen,
            phonetic: true,
        })
    }

    /// Turn dictionary substitution (and its inverse in `inspect`) on or off.
    pub fn with_phonetic(mut self, phonetic: bool) -> Self {
        self.phonetic = phonetic;
        self
    }

    /// Load the codebook from the JSON cache at `config.cache_path`, building
    /// it from `inputs` on a miss.
    pub fn from_config(config: &PipelineConfig, inputs: &CodebookInputs) -> Result<Self> {
        let cache = JsonFileCache::new(&config.cache_path);
        Self::with_cache(config, &cache, inputs)
    }

    pub fn with_cache(
        config: &PipelineConfig,
        cache: &dyn CodebookCache,
        inputs: &CodebookInputs,
    ) -> Result<Self> {
        config.validate()?;
        let offset = config.codepoint_offset;
        let codebook = if config.verify_fingerprint {
            // The fingerprint needs the inputs even when the cache hits.
            let sources = BuildSources::read(inputs)?;
            let fingerprint = sources.fingerprint(offset);
            Codebook::load_or_build(cache, Some(&fingerprint), || sources.build(offset))?
        } else {
            Codebook::load_or_build(cache, None, || BuildSources::read(inputs)?.build(offset))?
        };
        Ok(Self::new(codebook, config.maxlen)?.with_phonetic(config.phonetic))
    }

    pub fn codebook(&self) -> &Codebook {
        &self.codebook
    }

    pub fn table(&self) -> &CodeTable {
        &self.table
    }

    pub fn maxlen(&self) -> usize {
        self.maxlen
    }

    pub fn is_phonetic(&self) -> bool {
        self.phonetic
    }

    /// Lowercase, substitute dictionary words and mark unknown characters.
    /// Substitution is skipped in alphabetic mode.
    pub fn prepare(&self, line: &str) -> String {
        if self.phonetic {
            self.codebook.prepare(line)
        } else {
            self.codebook.prepare_alphabetic(line)
        }
    }

    pub fn encode_line(&self, line: &str) -> Result<Array1<u8>> {
        codec::encode(&self.table, &self.prepare(line), self.maxlen)
    }

    /// Encode many lines into a `[lines, maxlen]` batch, in parallel.
    pub fn encode_lines<S>(&self, lines: &[S]) -> Result<Array2<u8>>
    where
        S: AsRef<str> + Sync,
    {
        let records: Vec<Array1<u8>> = lines
            .par_iter()
            .map(|line| self.encode_line(line.as_ref()))
            .collect::<Result<_>>()?;

        let mut batch = Array2::<u8>::zeros((records.len(), self.maxlen));
        for (mut row, record) in batch.rows_mut().into_iter().zip(&records) {
            row.assign(record);
        }
        Ok(batch)
    }

    pub fn decode_record(&self, record: ArrayView1<u8>) -> DecodedRecord {
        codec::decode(&self.table, record)
    }

    /// Decode and rewrite phonetic strings back to phoneme symbols.
    pub fn inspect(&self, record: ArrayView1<u8>) -> (DecodedRecord, String) {
        let decoded = self.decode_record(record);
        let readable = if self.phonetic {
            self.codebook.to_readable(&decoded.text)
        } else {
            self.codebook.tag_symbols(&decoded.text)
        };
        (decoded, readable)
    }
}

/// Inputs read from disk for a codebook build.
struct BuildSources {
    observed: ObservedChars,
    phonemes: Vec<String>,
    dictionary: Pronunciations,
}

impl BuildSources {
    fn read(inputs: &CodebookInputs) -> Result<Self> {
        let phonemes = load_phoneme_symbols(&inputs.phoneme_symbols_path)?;
        let dictionary = Pronunciations::load(&inputs.dictionary_path)?;
        let observed = ObservedChars::from_files(&inputs.corpus_paths)?;
        tracing::info!(
            phonemes = phonemes.len(),
            words = dictionary.len(),
            corpus_chars = observed.len(),
            "read codebook inputs"
        );
        Ok(Self {
            observed,
            phonemes,
            dictionary,
        })
    }

    fn fingerprint(&self, offset: u32) -> String {
        input_fingerprint(&self.observed, &self.phonemes, &self.dictionary, offset)
    }

    fn build(&self, offset: u32) -> Result<CodebookArtifacts> {
        CodebookArtifacts::build(&self.observed, &self.phonemes, &self.dictionary, offset)
    }
}
