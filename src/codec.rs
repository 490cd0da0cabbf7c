//! Fixed-width `u8` records: code table, truncation, encode and decode.

use anyhow::Result;
use ndarray::{Array1, ArrayView1};
use std::collections::HashMap;

use crate::alphabet::{is_word_char, SymbolSpace};
use crate::constants::{
    END_CODE, MAX_ALPHABET_SIZE, N_CONTROL_SYMBOLS, PADDING_CODE, PRINTABLE_ALPHABET, UNKNOWN_CODE,
};
use crate::error::CodecError;

/// Bijection between the encodable alphabet and `u8` codes.
///
/// Layout: padding (0), end (1), unknown (2), the printable alphabet, then
/// the phonetic symbols in allocation order.
#[derive(Clone, Debug)]
pub struct CodeTable {
    symbols: Vec<char>,
    codes: HashMap<char, u8>,
}

impl CodeTable {
    pub fn new(space: &SymbolSpace) -> Result<Self> {
        let controls = space.controls;
        let symbols: Vec<char> = [controls.padding, controls.end, controls.unknown]
            .into_iter()
            .chain(PRINTABLE_ALPHABET.chars())
            .chain(space.phonetic.iter().copied())
            .collect();

        if symbols.len() > MAX_ALPHABET_SIZE {
            anyhow::bail!(CodecError::AlphabetTooLarge {
                size: symbols.len(),
                max: MAX_ALPHABET_SIZE,
            });
        }

        let mut codes = HashMap::with_capacity(symbols.len());
        for (code, &symbol) in symbols.iter().enumerate() {
            if codes.insert(symbol, code as u8).is_some() {
                anyhow::bail!(CodecError::duplicate(symbol));
            }
        }
        Ok(Self { symbols, codes })
    }

    pub fn code(&self, symbol: char) -> Option<u8> {
        self.codes.get(&symbol).copied()
    }

    pub fn symbol(&self, code: u8) -> Option<char> {
        self.symbols.get(code as usize).copied()
    }

    pub fn padding_code(&self) -> u8 {
        PADDING_CODE
    }

    pub fn end_code(&self) -> u8 {
        END_CODE
    }

    pub fn unknown_code(&self) -> u8 {
        UNKNOWN_CODE
    }

    pub fn unknown_symbol(&self) -> char {
        self.symbols[UNKNOWN_CODE as usize]
    }

    /// `\w` with the control symbols excluded, so an unknown marker next to
    /// a word ends it.
    pub fn is_word_char(&self, c: char) -> bool {
        is_word_char(c) && !self.symbols[..N_CONTROL_SYMBOLS].contains(&c)
    }

    /// Word-boundary truncation where control symbols separate words.
    pub fn truncate(&self, text: &str, maxlen: usize) -> String {
        truncate_with(text, maxlen, |c| self.is_word_char(c))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Cut `text` to at most `maxlen - 1` characters.
///
/// When the cut lands inside a word the partial word is dropped together
/// with one whitespace character before it. Text that is a single word run
/// with nothing to fall back to is cut hard.
pub fn truncate_at_word_boundary(text: &str, maxlen: usize) -> String {
    truncate_with(text, maxlen, is_word_char)
}

fn truncate_with<F>(text: &str, maxlen: usize, is_word: F) -> String
where
    F: Fn(char) -> bool,
{
    let limit = maxlen.saturating_sub(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return text.to_string();
    }

    let mut end = limit;
    let mid_word = end > 0 && is_word(chars[end - 1]) && is_word(chars[end]);
    if mid_word {
        let word_start = chars[..end]
            .iter()
            .rposition(|&c| !is_word(c))
            .map_or(0, |i| i + 1);
        if word_start > 0 {
            end = word_start;
            if chars[end - 1].is_whitespace() {
                end -= 1;
            }
        }
    }
    chars[..end].iter().collect()
}

/// Encode prepared text into a record of exactly `maxlen` codes.
///
/// Characters without a code map to the unknown code. The end marker sits
/// right after the content and the rest is padding.
pub fn encode(table: &CodeTable, text: &str, maxlen: usize) -> Result<Array1<u8>> {
    if maxlen == 0 {
        anyhow::bail!(CodecError::InvalidMaxlen(maxlen));
    }
    let text = table.truncate(text, maxlen);
    let mut record = Array1::<u8>::from_elem(maxlen, table.padding_code());
    let mut len = 0;
    for (slot, c) in record.iter_mut().zip(text.chars()) {
        *slot = table.code(c).unwrap_or(table.unknown_code());
        len += 1;
    }
    record[len] = table.end_code();
    Ok(record)
}

/// Result of decoding one record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedRecord {
    pub text: String,
    /// False when no end marker was found; `text` then covers the whole buffer.
    pub terminated: bool,
    /// Padding or out-of-table codes found before the end marker.
    pub invalid_codes: usize,
}

impl DecodedRecord {
    pub fn is_well_formed(&self) -> bool {
        self.terminated && self.invalid_codes == 0
    }
}

/// Decode up to the first end marker. Malformed records are reported through
/// the flags rather than as errors so they can still be inspected.
pub fn decode(table: &CodeTable, record: ArrayView1<u8>) -> DecodedRecord {
    let mut text = String::with_capacity(record.len());
    let mut terminated = false;
    let mut invalid_codes = 0;
    for &code in record.iter() {
        if code == table.end_code() {
            terminated = true;
            break;
        }
        match table.symbol(code) {
            Some(symbol) if code != table.padding_code() => text.push(symbol),
            _ => {
                invalid_codes += 1;
                text.push(table.unknown_symbol());
            }
        }
    }
    if !terminated {
        tracing::debug!(len = record.len(), "record has no end marker");
    }
    DecodedRecord {
        text,
        terminated,
        invalid_codes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::SymbolSpace;
    use ndarray::array;
    use std::collections::BTreeSet;

    fn table() -> CodeTable {
        let space = SymbolSpace::allocate(&BTreeSet::new(), 3, 192).unwrap();
        CodeTable::new(&space).unwrap()
    }

    #[test]
    fn test_table_layout() {
        let table = table();
        assert_eq!(table.len(), 3 + PRINTABLE_ALPHABET.chars().count() + 3);
        assert_eq!(table.symbol(0), Some('\u{c3}'));
        assert_eq!(table.symbol(1), Some('\u{c4}'));
        assert_eq!(table.symbol(2), Some('\u{c5}'));
        assert_eq!(table.code(' '), Some(3));
        assert_eq!(table.code('a'), Some(4));
        assert_eq!(table.code('\u{c0}'), Some(69));
        for code in 0..table.len() as u8 {
            assert_eq!(table.code(table.symbol(code).unwrap()), Some(code));
        }
        assert_eq!(table.symbol(table.len() as u8), None);
    }

    #[test]
    fn test_table_too_large() {
        let space = SymbolSpace::allocate(&BTreeSet::new(), 200, 192).unwrap();
        let err = CodeTable::new(&space).unwrap_err();
        assert!(matches!(
            CodecError::find(&err),
            Some(CodecError::AlphabetTooLarge { size: 269, max: 256 })
        ));
    }

    #[test]
    fn test_encode_ab() {
        let table = table();
        let record = encode(&table, "ab", 10).unwrap();
        let a = table.code('a').unwrap();
        let b = table.code('b').unwrap();
        assert_eq!(record, array![a, b, table.end_code(), 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_empty() {
        let table = table();
        let record = encode(&table, "", 4).unwrap();
        assert_eq!(record, array![1u8, 0, 0, 0]);
        assert_eq!(encode(&table, "anything", 1).unwrap(), array![1u8]);
    }

    #[test]
    fn test_encode_rejects_zero_maxlen() {
        let err = encode(&table(), "a", 0).unwrap_err();
        assert_eq!(CodecError::find(&err), Some(&CodecError::InvalidMaxlen(0)));
    }

    #[test]
    fn test_unmapped_chars_become_unknown() {
        let table = table();
        let record = encode(&table, "a☃", 4).unwrap();
        assert_eq!(record, array![table.code('a').unwrap(), 2, 1, 0]);
    }

    #[test]
    fn test_truncate_policy() {
        // limit 9: "the cat s|at" cuts inside "sat"
        assert_eq!(truncate_at_word_boundary("the cat sat", 10), "the cat");
        // cut right after a word, before a space
        assert_eq!(truncate_at_word_boundary("the cat sat", 8), "the cat");
        // cut right after a space
        assert_eq!(truncate_at_word_boundary("the cat sat", 9), "the cat ");
        // no boundary to fall back to
        assert_eq!(truncate_at_word_boundary("abcdefghij", 5), "abcd");
        // partial word after punctuation keeps the punctuation
        assert_eq!(truncate_at_word_boundary("end.continued", 8), "end.");
        // short text untouched
        assert_eq!(truncate_at_word_boundary("short", 10), "short");
        assert_eq!(truncate_at_word_boundary("exactly9c", 10), "exactly9c");
    }

    #[test]
    fn test_control_symbols_end_words() {
        let table = table();
        let unknown = table.unknown_symbol();
        assert!(!table.is_word_char(unknown));
        assert!(table.is_word_char('\u{c0}'));

        // limit 5 cuts inside "sss"; the unknown marker is a boundary
        let text = format!("\u{c0}\u{c1}{unknown}sss");
        assert_eq!(table.truncate(&text, 6), format!("\u{c0}\u{c1}{unknown}"));
        assert_eq!(truncate_at_word_boundary(&text, 6), "\u{c0}\u{c1}\u{c5}ss");

        let record = encode(&table, &text, 6).unwrap();
        assert_eq!(decode(&table, record.view()).text, format!("\u{c0}\u{c1}{unknown}"));
    }

    #[test]
    fn test_decode_round_trip() {
        let table = table();
        let text = "hello, world! \u{c0}\u{c1}";
        let record = encode(&table, text, 32).unwrap();
        let decoded = decode(&table, record.view());
        assert!(decoded.is_well_formed());
        assert_eq!(decoded.text, text);
    }

    #[test]
    fn test_decode_truncated_matches_policy() {
        let table = table();
        let text = "one two three four";
        let record = encode(&table, text, 12).unwrap();
        assert_eq!(record.len(), 12);
        assert_eq!(decode(&table, record.view()).text, truncate_at_word_boundary(text, 12));
        assert_eq!(decode(&table, record.view()).text, "one two");
    }

    #[test]
    fn test_decode_without_end_marker() {
        let table = table();
        let a = table.code('a').unwrap();
        let record = array![a, a, a];
        let decoded = decode(&table, record.view());
        assert!(!decoded.terminated);
        assert_eq!(decoded.text, "aaa");
    }

    #[test]
    fn test_decode_flags_invalid_codes() {
        let table = table();
        let a = table.code('a').unwrap();
        let record = array![a, 0, 250, 1, 0];
        let decoded = decode(&table, record.view());
        assert!(decoded.terminated);
        assert_eq!(decoded.invalid_codes, 2);
        assert!(!decoded.is_well_formed());
        assert_eq!(decoded.text.chars().count(), 3);
    }
}
