//! Pronouncing dictionary and phoneme symbol list loading.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read an ordered phoneme symbol list, one symbol per line.
///
/// Blank lines are ignored and repeated symbols keep their first position.
pub fn read_phoneme_symbols<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read phoneme symbol line")?;
        let symbol = line.trim();
        if symbol.is_empty() || !seen.insert(symbol.to_string()) {
            continue;
        }
        symbols.push(symbol.to_string());
    }
    Ok(symbols)
}

pub fn load_phoneme_symbols(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open phoneme symbols {}", path.display()))?;
    read_phoneme_symbols(BufReader::new(file))
}

/// Row counts from a dictionary parse. Skipped rows are not errors.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ParseStats {
    pub entries: usize,
    pub comments: usize,
    pub malformed: usize,
    pub duplicates: usize,
}

/// Word to phoneme sequence, first transcription only, in file order.
#[derive(Clone, Debug, Default)]
pub struct Pronunciations {
    entries: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
    stats: ParseStats,
}

impl Pronunciations {
    /// Parse `word<TAB>P1 P2 ...` rows.
    ///
    /// The raw CMU layout (`WORD  P1 P2`, `;;;` comments, `WORD(1)` variants)
    /// is accepted as well. Words are lowercased.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut dict = Self::default();
        for line in reader.lines() {
            let line = line.context("Failed to read dictionary line")?;
            dict.add_row(&line);
        }
        tracing::debug!(
            entries = dict.stats.entries,
            comments = dict.stats.comments,
            malformed = dict.stats.malformed,
            duplicates = dict.stats.duplicates,
            "parsed pronouncing dictionary"
        );
        Ok(dict)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open pronouncing dictionary {}", path.display()))?;
        Self::parse(BufReader::new(file))
            .with_context(|| format!("Failed to load pronouncing dictionary {}", path.display()))
    }

    fn add_row(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            self.stats.malformed += 1;
            return;
        }
        if line.starts_with(";;;") {
            self.stats.comments += 1;
            return;
        }
        let Some((word, phonemes)) = split_row(line) else {
            self.stats.malformed += 1;
            return;
        };
        let word = strip_variant(word.trim()).to_lowercase();
        let phonemes: Vec<String> = phonemes.split_whitespace().map(str::to_string).collect();
        if word.is_empty() || phonemes.is_empty() {
            self.stats.malformed += 1;
            return;
        }
        self.insert(word, phonemes);
    }

    /// Insert unless the word is already present. Returns whether it was added.
    pub fn insert(&mut self, word: String, phonemes: Vec<String>) -> bool {
        if self.index.contains_key(&word) {
            self.stats.duplicates += 1;
            return false;
        }
        self.index.insert(word.clone(), self.entries.len());
        self.entries.push((word, phonemes));
        self.stats.entries += 1;
        true
    }

    pub fn get(&self, word: &str) -> Option<&[String]> {
        self.index
            .get(word)
            .map(|&i| self.entries[i].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(word, phonemes)| (word.as_str(), phonemes.as_slice()))
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<W: Into<String>> FromIterator<(W, Vec<String>)> for Pronunciations {
    fn from_iter<I: IntoIterator<Item = (W, Vec<String>)>>(iter: I) -> Self {
        let mut dict = Self::default();
        for (word, phonemes) in iter {
            dict.insert(word.into(), phonemes);
        }
        dict
    }
}

fn split_row(line: &str) -> Option<(&str, &str)> {
    line.split_once('\t').or_else(|| line.split_once("  "))
}

/// `read(1)` -> `read`
fn strip_variant(word: &str) -> &str {
    match word.strip_suffix(')').and_then(|w| w.rsplit_once('(')) {
        Some((base, n)) if !base.is_empty() && !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => base,
        _ => word,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_phoneme_symbols_order_and_dedupe() {
        let symbols = read_phoneme_symbols(Cursor::new("K\nAE\n\n T \nK\n")).unwrap();
        assert_eq!(symbols, vec!["K", "AE", "T"]);
    }

    #[test]
    fn test_parse_tab_rows() {
        let dict = Pronunciations::parse(Cursor::new("CAT\tK AE T\ndog\tD AO1 G\n")).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("cat").unwrap(), &["K", "AE", "T"]);
        assert_eq!(dict.get("dog").unwrap(), &["D", "AO1", "G"]);
    }

    #[test]
    fn test_parse_cmu_layout() {
        let text = ";;; comment\nREAD  R IY1 D\nREAD(1)  R EH1 D\n'TIS  T IH1 Z\n";
        let dict = Pronunciations::parse(Cursor::new(text)).unwrap();
        assert_eq!(dict.get("read").unwrap(), &["R", "IY1", "D"]);
        assert_eq!(dict.get("'tis").unwrap(), &["T", "IH1", "Z"]);
        let stats = dict.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.comments, 1);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let text = "\nnophonemes\t\n\tK\njustaword\nok\tOW K\n";
        let dict = Pronunciations::parse(Cursor::new(text)).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.stats().malformed, 4);
    }

    #[test]
    fn test_strip_variant() {
        assert_eq!(strip_variant("read(1)"), "read");
        assert_eq!(strip_variant("(1)"), "(1)");
        assert_eq!(strip_variant("f(x)"), "f(x)");
        assert_eq!(strip_variant("plain"), "plain");
    }

    #[test]
    fn test_from_iter_keeps_first() {
        let dict: Pronunciations = vec![
            ("cat", vec!["K".to_string()]),
            ("cat", vec!["X".to_string()]),
        ]
        .into_iter()
        .collect();
        assert_eq!(dict.get("cat").unwrap(), &["K"]);
    }
}
