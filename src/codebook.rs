//! Codebook construction: phoneme symbol assignment, word transcriptions and
//! the compiled matchers for both rewrite directions.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

use crate::alphabet::{is_printable, ControlSymbols, SymbolSpace};
use crate::cache::CodebookCache;
use crate::constants::PRINTABLE_ALPHABET;
use crate::corpus::{hex, ObservedChars};
use crate::dictionary::Pronunciations;
use crate::error::CodecError;
use crate::matcher::LongestMatcher;

/// Separator between phoneme symbols in inverse-rewritten text.
pub const PHONEME_SEPARATOR: &str = " ";

const FORMAT_VERSION: u32 = 1;

/// Everything the builder produces, in the form persisted by the cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodebookArtifacts {
    pub format_version: u32,
    /// Hash of the corpus characters, phoneme list, dictionary and offset.
    pub fingerprint: String,
    /// Phoneme symbols in allocation order.
    pub phonemes: Vec<String>,
    /// Full allocation: phonetic symbols followed by the control symbols.
    pub reserved: Vec<char>,
    pub phoneme_to_symbol: BTreeMap<String, char>,
    pub symbol_to_phoneme: BTreeMap<char, String>,
    /// Dictionary word to its phonetic string.
    pub word_to_phonetic: BTreeMap<String, String>,
    /// Phonetic string to space-separated phoneme symbols.
    pub phonetic_to_phonemes: BTreeMap<String, String>,
}

impl CodebookArtifacts {
    pub fn build(
        observed: &ObservedChars,
        phonemes: &[String],
        dictionary: &Pronunciations,
        offset: u32,
    ) -> Result<Self> {
        let space = SymbolSpace::allocate(observed.as_set(), phonemes.len(), offset)
            .context("Failed to allocate reserved symbols")?;

        let phoneme_to_symbol: BTreeMap<String, char> = phonemes
            .iter()
            .cloned()
            .zip(space.phonetic.iter().copied())
            .collect();
        let symbol_to_phoneme: BTreeMap<char, String> = phoneme_to_symbol
            .iter()
            .map(|(phoneme, &symbol)| (symbol, phoneme.clone()))
            .collect();

        let mut word_to_phonetic = BTreeMap::new();
        let mut phonetic_to_phonemes = BTreeMap::new();
        let mut skipped = 0usize;
        for (word, transcription) in dictionary.iter() {
            let phonetic: Option<String> = transcription
                .iter()
                .map(|p| phoneme_to_symbol.get(p).copied())
                .collect();
            let Some(phonetic) = phonetic else {
                skipped += 1;
                tracing::debug!(word, "skipping entry with unlisted phoneme");
                continue;
            };
            phonetic_to_phonemes
                .entry(phonetic.clone())
                .or_insert_with(|| transcription.join(PHONEME_SEPARATOR));
            word_to_phonetic.insert(word.to_string(), phonetic);
        }
        if skipped > 0 {
            tracing::warn!(skipped, "dictionary entries use phonemes missing from the symbol list");
        }

        let mut reserved = space.phonetic.clone();
        reserved.extend(space.controls.as_array());

        tracing::info!(
            phonemes = phonemes.len(),
            words = word_to_phonetic.len(),
            first = ?reserved.first(),
            last = ?reserved.last(),
            "built codebook"
        );

        Ok(Self {
            format_version: FORMAT_VERSION,
            fingerprint: input_fingerprint(observed, phonemes, dictionary, offset),
            phonemes: phonemes.to_vec(),
            reserved,
            phoneme_to_symbol,
            symbol_to_phoneme,
            word_to_phonetic,
            phonetic_to_phonemes,
        })
    }
}

/// Identity of a build input set, stored alongside cached artifacts.
pub fn input_fingerprint(
    observed: &ObservedChars,
    phonemes: &[String],
    dictionary: &Pronunciations,
    offset: u32,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(observed.fingerprint().as_bytes());
    hasher.update(offset.to_le_bytes());
    for phoneme in phonemes {
        hasher.update(phoneme.as_bytes());
        hasher.update([0]);
    }
    for (word, transcription) in dictionary.iter() {
        hasher.update(word.as_bytes());
        hasher.update([b'\t']);
        hasher.update(transcription.join(PHONEME_SEPARATOR).as_bytes());
        hasher.update([b'\n']);
    }
    hex(&hasher.finalize())
}

/// Compiled codebook, shared read-only once built.
#[derive(Debug)]
pub struct Codebook {
    artifacts: CodebookArtifacts,
    space: SymbolSpace,
    forward: LongestMatcher,
    inverse: LongestMatcher,
    allowed: HashSet<char>,
}

impl Codebook {
    pub fn build(
        observed: &ObservedChars,
        phonemes: &[String],
        dictionary: &Pronunciations,
        offset: u32,
    ) -> Result<Self> {
        Self::from_artifacts(CodebookArtifacts::build(observed, phonemes, dictionary, offset)?)
    }

    /// Compile matchers from artifacts and check the symbol classes are
    /// disjoint and the phoneme assignment is one-to-one.
    pub fn from_artifacts(artifacts: CodebookArtifacts) -> Result<Self> {
        let space = SymbolSpace::from_reserved(&artifacts.reserved, artifacts.phonemes.len())?;

        let mut seen: HashSet<char> = PRINTABLE_ALPHABET.chars().collect();
        for symbol in space.iter() {
            if !seen.insert(symbol) {
                anyhow::bail!(CodecError::duplicate(symbol));
            }
        }
        for (phoneme, &symbol) in artifacts.phonemes.iter().zip(&space.phonetic) {
            let assigned = artifacts.phoneme_to_symbol.get(phoneme);
            let back = artifacts.symbol_to_phoneme.get(&symbol);
            if assigned != Some(&symbol) || back != Some(phoneme) {
                anyhow::bail!(
                    "Invalid codebook: phoneme {:?} and symbol {:?} do not map to each other",
                    phoneme,
                    symbol
                );
            }
        }

        let forward = LongestMatcher::new(
            artifacts
                .word_to_phonetic
                .iter()
                .map(|(word, phonetic)| (word.as_str(), phonetic.as_str())),
        )
        .with_non_word_chars(space.controls.as_array());
        let inverse = LongestMatcher::new(
            artifacts
                .phonetic_to_phonemes
                .iter()
                .map(|(phonetic, phonemes)| (phonetic.as_str(), phonemes.as_str())),
        )
        .with_non_word_chars(space.controls.as_array());

        let mut allowed: HashSet<char> = PRINTABLE_ALPHABET.chars().collect();
        allowed.extend(space.phonetic.iter().copied());

        Ok(Self {
            artifacts,
            space,
            forward,
            inverse,
            allowed,
        })
    }

    /// Return cached artifacts when present, otherwise build and store them.
    ///
    /// With `expected_fingerprint` set, a cached bundle from different inputs
    /// is discarded and rebuilt. Without it the cache is trusted as is.
    pub fn load_or_build<F>(
        cache: &dyn CodebookCache,
        expected_fingerprint: Option<&str>,
        build: F,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<CodebookArtifacts>,
    {
        match cache.load().context("Failed to load codebook cache")? {
            Some(artifacts) if fingerprint_matches(&artifacts, expected_fingerprint) => {
                tracing::info!(words = artifacts.word_to_phonetic.len(), "loaded cached codebook");
                return Self::from_artifacts(artifacts);
            }
            Some(artifacts) => {
                tracing::warn!(
                    cached = %artifacts.fingerprint,
                    expected = expected_fingerprint.unwrap_or_default(),
                    "cached codebook was built from different inputs, rebuilding"
                );
            }
            None => tracing::info!("no cached codebook, building"),
        }

        let _lock = cache.lock().context("Failed to lock codebook cache")?;
        // Another process may have finished the build while we waited.
        if let Some(artifacts) = cache
            .load()
            .context("Failed to load codebook cache")?
            .filter(|artifacts| fingerprint_matches(artifacts, expected_fingerprint))
        {
            tracing::info!("codebook was built while waiting for the lock");
            return Self::from_artifacts(artifacts);
        }

        let artifacts = build()?;
        cache
            .save(&artifacts)
            .context("Failed to save codebook cache")?;
        Self::from_artifacts(artifacts)
    }

    pub fn artifacts(&self) -> &CodebookArtifacts {
        &self.artifacts
    }

    pub fn controls(&self) -> ControlSymbols {
        self.space.controls
    }

    pub fn phonetic_symbols(&self) -> &[char] {
        &self.space.phonetic
    }

    pub fn symbol(&self, phoneme: &str) -> Option<char> {
        self.artifacts.phoneme_to_symbol.get(phoneme).copied()
    }

    pub fn phoneme(&self, symbol: char) -> Option<&str> {
        self.artifacts
            .symbol_to_phoneme
            .get(&symbol)
            .map(String::as_str)
    }

    pub fn phonetic(&self, word: &str) -> Option<&str> {
        self.artifacts
            .word_to_phonetic
            .get(word)
            .map(String::as_str)
    }

    pub fn is_allowed(&self, c: char) -> bool {
        self.allowed.contains(&c)
    }

    /// Substitute dictionary words in a lowercase line with phonetic strings.
    pub fn rewrite(&self, line: &str) -> String {
        self.forward.replace_all(line)
    }

    /// Replace every character outside the printable and phonetic classes
    /// with the unknown marker.
    pub fn mark_unknown(&self, text: &str) -> String {
        let unknown = self.space.controls.unknown;
        text.chars()
            .map(|c| if self.is_allowed(c) { c } else { unknown })
            .collect()
    }

    /// Lowercase, substitute, then mark unknown characters. The unknown pass
    /// runs last so phonetic symbols are never treated as unknown input.
    pub fn prepare(&self, line: &str) -> String {
        self.mark_unknown(&self.rewrite(&line.to_lowercase()))
    }

    /// Rewrite phonetic strings back into space-separated phoneme symbols.
    pub fn to_phonemes(&self, text: &str) -> String {
        self.inverse.replace_all(text)
    }

    /// Lowercase and mark unknown characters without dictionary substitution.
    pub fn prepare_alphabetic(&self, line: &str) -> String {
        self.mark_unknown(&line.to_lowercase())
    }

    /// Inverse rewrite with control symbols shown as readable tags.
    pub fn to_readable(&self, text: &str) -> String {
        self.tag_symbols(&self.to_phonemes(text))
    }

    /// Show control symbols as `<unk>`, `<end>` and `<pad>`, and lone
    /// phonetic symbols as `{PHONEME}`.
    pub fn tag_symbols(&self, text: &str) -> String {
        let controls = self.space.controls;
        let mut output = String::new();
        for c in text.chars() {
            match c {
                c if c == controls.unknown => output.push_str("<unk>"),
                c if c == controls.end => output.push_str("<end>"),
                c if c == controls.padding => output.push_str("<pad>"),
                c if is_printable(c) => output.push(c),
                c => match self.phoneme(c) {
                    Some(phoneme) => {
                        output.push('{');
                        output.push_str(phoneme);
                        output.push('}');
                    }
                    None => output.push(c),
                },
            }
        }
        output
    }
}

fn fingerprint_matches(artifacts: &CodebookArtifacts, expected: Option<&str>) -> bool {
    expected.map_or(true, |fingerprint| artifacts.fingerprint == fingerprint)
}
