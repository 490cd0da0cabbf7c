//! Reserved codepoint allocation for phonetic and control symbols.

use anyhow::Result;
use std::collections::BTreeSet;

use crate::constants::{N_CONTROL_SYMBOLS, PRINTABLE_ALPHABET};
use crate::error::CodecError;

/// `\w` in the Unicode sense: letters, digits and underscore.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn is_printable(c: char) -> bool {
    PRINTABLE_ALPHABET.contains(c)
}

/// Scan upward from `offset` and collect `count` codepoints that are neither
/// observed in the corpus nor part of the printable alphabet.
///
/// Running out of scalar values is fatal; the phoneme set is never truncated.
pub fn allocate_reserved(observed: &BTreeSet<char>, count: usize, offset: u32) -> Result<Vec<char>> {
    let mut reserved = Vec::with_capacity(count);
    let mut code = offset;
    while reserved.len() < count && code <= char::MAX as u32 {
        // Surrogates are skipped by from_u32
        if let Some(c) = char::from_u32(code) {
            if !observed.contains(&c) && !is_printable(c) {
                reserved.push(c);
            }
        }
        code += 1;
    }

    if reserved.len() < count {
        anyhow::bail!(CodecError::AllocationExhausted {
            needed: count,
            found: reserved.len(),
        });
    }
    Ok(reserved)
}

/// The three control symbols taken from the tail of an allocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ControlSymbols {
    /// Fills record positions after the end marker; never written into text.
    pub padding: char,
    pub end: char,
    pub unknown: char,
}

impl ControlSymbols {
    pub fn as_array(&self) -> [char; N_CONTROL_SYMBOLS] {
        [self.padding, self.end, self.unknown]
    }
}

/// Phonetic symbols (one per phoneme, same order) plus control symbols.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SymbolSpace {
    pub phonetic: Vec<char>,
    pub controls: ControlSymbols,
}

impl SymbolSpace {
    pub fn allocate(observed: &BTreeSet<char>, phoneme_count: usize, offset: u32) -> Result<Self> {
        let reserved = allocate_reserved(observed, phoneme_count + N_CONTROL_SYMBOLS, offset)?;
        Self::from_reserved(&reserved, phoneme_count)
    }

    /// Split a full allocation: the first `phoneme_count` symbols are phonetic,
    /// the control symbols follow in padding, end, unknown order.
    pub fn from_reserved(reserved: &[char], phoneme_count: usize) -> Result<Self> {
        if reserved.len() != phoneme_count + N_CONTROL_SYMBOLS {
            anyhow::bail!(
                "Invalid reserved allocation: expected {} symbols, got {}",
                phoneme_count + N_CONTROL_SYMBOLS,
                reserved.len()
            );
        }
        let (phonetic, tail) = reserved.split_at(phoneme_count);
        let controls = ControlSymbols {
            padding: tail[0],
            end: tail[1],
            unknown: tail[2],
        };
        Ok(Self {
            phonetic: phonetic.to_vec(),
            controls,
        })
    }

    pub fn symbol_count(&self) -> usize {
        self.phonetic.len() + N_CONTROL_SYMBOLS
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.phonetic.iter().copied().chain(self.controls.as_array())
    }
}
