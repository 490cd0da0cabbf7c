//! Observed character set of a corpus.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Every character seen in the corpus, in codepoint order.
///
/// Lines contribute both their raw and lowercased characters, since text is
/// lowercased before encoding and the result must not collide with a
/// reserved symbol either.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ObservedChars {
    chars: BTreeSet<char>,
}

impl ObservedChars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(&mut self, line: &str) {
        self.chars.extend(line.chars());
        // Same lowercasing as encoding, including final sigma.
        self.chars.extend(line.to_lowercase().chars());
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut observed = Self::new();
        for line in lines {
            observed.add_line(line.as_ref());
        }
        observed
    }

    /// Read UTF-8 text from any reader, line by line.
    pub fn add_reader<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            let line = line.context("Failed to read corpus line")?;
            self.add_line(&line);
        }
        Ok(())
    }

    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut observed = Self::new();
        for path in paths {
            let path = path.as_ref();
            let file = File::open(path)
                .with_context(|| format!("Failed to open corpus file {}", path.display()))?;
            observed
                .add_reader(BufReader::new(file))
                .with_context(|| format!("Failed to read corpus file {}", path.display()))?;
        }
        tracing::debug!(files = paths.len(), distinct = observed.len(), "scanned corpus");
        Ok(observed)
    }

    pub fn contains(&self, c: char) -> bool {
        self.chars.contains(&c)
    }

    pub fn as_set(&self) -> &BTreeSet<char> {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// SHA-256 over the sorted characters, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for c in &self.chars {
            let mut buf = [0u8; 4];
            hasher.update(c.encode_utf8(&mut buf).as_bytes());
        }
        hex(&hasher.finalize())
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
