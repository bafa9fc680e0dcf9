use crate::config::Normalization;
use lazy_static::lazy_static;
use regex::{Matches, Regex};
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Letters and numbers by general category (L, N), anything else one code point at a time.
    static ref TERM: Regex = Regex::new(r"(?u)\p{L}+|\p{N}+|\S").expect("valid regex");
    static ref LETTER: Regex = Regex::new(r"(?u)^\p{L}").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Split text into raw terms: runs of letters, runs of digits, and every other
/// non-whitespace character on its own. The sequence is consumed once, left to right.
pub fn tokenize(text: &str) -> Tokens<'_> { Tokens { matches: TERM.find_iter(text) } }

pub struct Tokens<'a> {
    matches: Matches<'static, 'a>,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> { self.matches.next().map(|m| m.as_str()) }
}

/// Tokenizer with an explicit term normalization policy. Indexing and querying
/// must use the same policy for terms to line up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tokenizer {
    normalization: Normalization,
}

impl Tokenizer {
    pub fn new(normalization: Normalization) -> Self { Self { normalization } }

    pub fn normalization(&self) -> Normalization { self.normalization }

    pub fn terms<'a>(&self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        let this = *self;
        tokenize(text).map(move |t| this.normalize(t))
    }

    pub fn normalize(&self, term: &str) -> String {
        let n = &self.normalization;
        let mut out = if n.nfkc { term.nfkc().collect::<String>() } else { term.to_string() };
        if n.lowercase {
            out = out.to_lowercase();
        }
        if n.stem && LETTER.is_match(&out) {
            let stemmed = STEMMER.stem(&out).into_owned();
            if !stemmed.is_empty() {
                out = stemmed;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(s: &str) -> Vec<&str> { tokenize(s).collect() }

    #[test]
    fn basic_tokenize() {
        assert_eq!(terms("the cat sat"), vec!["the", "cat", "sat"]);
    }

    #[test]
    fn letters_and_digits_split() {
        assert_eq!(terms("abc123"), vec!["abc", "123"]);
        assert_eq!(terms("42nd street"), vec!["42", "nd", "street"]);
    }

    #[test]
    fn letter_numbers_are_not_letters() {
        assert_eq!(terms("\u{216B}abc"), vec!["\u{216B}", "abc"]);
        assert_eq!(terms("\u{2163}\u{2164}"), vec!["\u{2163}\u{2164}"]);
    }

    #[test]
    fn combining_marks_stand_alone() {
        assert_eq!(terms("\u{0939}\u{093F}"), vec!["\u{0939}", "\u{093F}"]);
        assert_eq!(terms("\u{0643}\u{064E}\u{062A}\u{064E}\u{0628}"), vec![
            "\u{0643}", "\u{064E}", "\u{062A}", "\u{064E}", "\u{0628}"
        ]);
    }

    #[test]
    fn punctuation_is_one_char_each() {
        assert_eq!(terms("a,b!!"), vec!["a", ",", "b", "!", "!"]);
    }

    #[test]
    fn empty_and_blank_input() {
        assert!(terms("").is_empty());
        assert!(terms(" \t\n ").is_empty());
    }

    #[test]
    fn case_is_kept_by_default() {
        let t = Tokenizer::default();
        assert_eq!(t.terms("Cat cat").collect::<Vec<_>>(), vec!["Cat", "cat"]);
    }

    #[test]
    fn normalization_policy_applies() {
        let t = Tokenizer::new(Normalization { lowercase: true, nfkc: false, stem: true });
        let out: Vec<String> = t.terms("Running runs 10").collect();
        assert_eq!(out, vec!["run", "run", "10"]);
    }
}
