//! Longest-match, whole-word substitution over a fixed key set.
//!
//! Equivalent to a regex `\b(k1|k2|...)\b` whose alternatives are ordered
//! longest first, implemented as a character trie so that dictionaries with
//! a hundred thousand keys stay cheap to build and scan.

use std::collections::{HashMap, HashSet};

use crate::alphabet::is_word_char;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<char, usize>,
    /// Index into `LongestMatcher::replacements` when a key ends here.
    terminal: Option<usize>,
}

/// Compiled matcher mapping whole-word keys to replacement strings.
#[derive(Debug)]
pub struct LongestMatcher {
    nodes: Vec<TrieNode>,
    keys: Vec<String>,
    replacements: Vec<String>,
    /// Characters that never count as `\w`, whatever their Unicode class.
    non_word: HashSet<char>,
}

impl LongestMatcher {
    /// Build from `(key, replacement)` pairs. Empty keys are ignored and a
    /// repeated key keeps its first replacement.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut matcher = Self {
            nodes: vec![TrieNode::default()],
            keys: Vec::new(),
            replacements: Vec::new(),
            non_word: HashSet::new(),
        };
        for (key, replacement) in pairs {
            matcher.insert(key.as_ref(), replacement.into());
        }
        matcher
    }

    /// Treat `chars` as non-word characters when testing for boundaries.
    pub fn with_non_word_chars(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.non_word.extend(chars);
        self
    }

    pub fn is_word_char(&self, c: char) -> bool {
        is_word_char(c) && !self.non_word.contains(&c)
    }

    fn insert(&mut self, key: &str, replacement: String) {
        if key.is_empty() {
            return;
        }
        let mut node = 0;
        for c in key.chars() {
            node = match self.nodes[node].children.get(&c) {
                Some(&next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[node].children.insert(c, next);
                    next
                }
            };
        }
        if self.nodes[node].terminal.is_none() {
            self.nodes[node].terminal = Some(self.replacements.len());
            self.keys.push(key.to_string());
            self.replacements.push(replacement);
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in match-priority order: longest first, ties reverse-lexicographic.
    pub fn keys_longest_first(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
        keys.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| b.cmp(a))
        });
        keys
    }

    /// Longest key starting at `chars[start]` that also ends on a word
    /// boundary. Returns the end position and replacement index.
    fn longest_at(&self, chars: &[char], start: usize) -> Option<(usize, usize)> {
        let mut node = 0;
        let mut best = None;
        for (pos, c) in chars.iter().enumerate().skip(start) {
            match self.nodes[node].children.get(c) {
                Some(&next) => node = next,
                None => break,
            }
            if let Some(index) = self.nodes[node].terminal {
                if self.is_boundary(chars, pos + 1) {
                    best = Some((pos + 1, index));
                }
            }
        }
        best
    }

    /// Replace every whole-word key occurrence, scanning left to right.
    pub fn replace_all(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }
        let chars: Vec<char> = text.chars().collect();
        let mut output = String::with_capacity(text.len());
        let mut pos = 0;
        while pos < chars.len() {
            if self.is_boundary(&chars, pos) {
                if let Some((end, index)) = self.longest_at(&chars, pos) {
                    output.push_str(&self.replacements[index]);
                    pos = end;
                    continue;
                }
            }
            output.push(chars[pos]);
            pos += 1;
        }
        output
    }

    /// Number of whole-word matches `replace_all` would substitute.
    pub fn count_matches(&self, text: &str) -> usize {
        let chars: Vec<char> = text.chars().collect();
        let mut count = 0;
        let mut pos = 0;
        while pos < chars.len() {
            if self.is_boundary(&chars, pos) {
                if let Some((end, _)) = self.longest_at(&chars, pos) {
                    count += 1;
                    pos = end;
                    continue;
                }
            }
            pos += 1;
        }
        count
    }

    /// `\b` between `chars[pos - 1]` and `chars[pos]`, with the text edges
    /// counting as non-word characters.
    fn is_boundary(&self, chars: &[char], pos: usize) -> bool {
        let before = pos > 0 && self.is_word_char(chars[pos - 1]);
        let after = pos < chars.len() && self.is_word_char(chars[pos]);
        before != after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(pairs: &[(&str, &str)]) -> LongestMatcher {
        LongestMatcher::new(pairs.iter().copied())
    }

    #[test]
    fn test_whole_words_only() {
        let m = matcher(&[("cat", "<CAT>")]);
        assert_eq!(m.replace_all("the cat sat"), "the <CAT> sat");
        assert_eq!(m.replace_all("concatenate cats cat."), "concatenate cats <CAT>.");
        assert_eq!(m.replace_all("cat"), "<CAT>");
        assert_eq!(m.replace_all("cat_x"), "cat_x");
    }

    #[test]
    fn test_longest_key_wins() {
        let m = matcher(&[("new", "N"), ("new york", "NY"), ("york", "Y")]);
        assert_eq!(m.replace_all("new york city"), "NY city");
        assert_eq!(m.replace_all("new yorker"), "N yorker");
        assert_eq!(m.replace_all("york new"), "Y N");
    }

    #[test]
    fn test_shorter_key_when_longer_breaks_boundary() {
        let m = matcher(&[("can", "K"), ("can't", "KT")]);
        assert_eq!(m.replace_all("i can't"), "i KT");
        assert_eq!(m.replace_all("can'tx"), "K'tx");
    }

    #[test]
    fn test_keys_starting_with_punctuation() {
        let m = matcher(&[("'tis", "TIZ")]);
        // A non-word first char needs a word char before it for `\b` to hold.
        assert_eq!(m.replace_all("x'tis"), "xTIZ");
        assert_eq!(m.replace_all(" 'tis"), " 'tis");
    }

    #[test]
    fn test_multibyte_keys() {
        let m = matcher(&[("\u{c0}\u{c1}", "K AE"), ("\u{c0}\u{c1}\u{c2}", "K AE T")]);
        assert_eq!(m.replace_all("the \u{c0}\u{c1}\u{c2} sat"), "the K AE T sat");
        assert_eq!(m.replace_all("\u{c0}\u{c1}"), "K AE");
        assert_eq!(m.count_matches("\u{c0}\u{c1} \u{c0}\u{c1}\u{c2}"), 2);
    }

    #[test]
    fn test_first_replacement_kept() {
        let m = matcher(&[("a", "1"), ("a", "2"), ("", "empty")]);
        assert_eq!(m.len(), 1);
        assert_eq!(m.replace_all("a b"), "1 b");
    }

    #[test]
    fn test_key_priority_order() {
        let m = matcher(&[("ab", ""), ("abc", ""), ("b", ""), ("zz", "")]);
        assert_eq!(m.keys_longest_first(), vec!["abc", "zz", "ab", "b"]);
    }

    #[test]
    fn test_non_word_chars_form_boundaries() {
        let m = matcher(&[("\u{c0}\u{c1}", "K AE")]);
        assert_eq!(m.replace_all("\u{c0}\u{c1}\u{c5}s"), "\u{c0}\u{c1}\u{c5}s");

        let m = m.with_non_word_chars(['\u{c5}']);
        assert!(!m.is_word_char('\u{c5}'));
        assert!(m.is_word_char('\u{c0}'));
        assert_eq!(m.replace_all("\u{c0}\u{c1}\u{c5}s"), "K AE\u{c5}s");
        assert_eq!(m.replace_all("\u{c5}\u{c0}\u{c1}"), "\u{c5}K AE");
    }

    #[test]
    fn test_empty_matcher_is_identity() {
        let m = matcher(&[]);
        assert_eq!(m.replace_all("unchanged text"), "unchanged text");
    }
}
