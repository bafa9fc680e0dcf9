use proptest::prelude::*;
use sift_core::tokenizer::tokenize;
use sift_core::{Normalization, Tokenizer};

#[test]
fn it_splits_letters_digits_and_symbols() {
    let toks: Vec<&str> = tokenize("Rust2024 edition, v1.75!").collect();
    assert_eq!(toks, vec!["Rust", "2024", "edition", ",", "v", "1", ".", "75", "!"]);
}

#[test]
fn it_handles_unicode_letters_and_digits() {
    let toks: Vec<&str> = tokenize("café naïve 東京 ٣٤٥").collect();
    assert_eq!(toks, vec!["café", "naïve", "東京", "٣٤٥"]);
}

#[test]
fn it_normalizes_only_when_asked() {
    let text = "Ｒｕｓｔ Running";
    let plain: Vec<String> = Tokenizer::default().terms(text).collect();
    assert_eq!(plain, vec!["Ｒｕｓｔ", "Running"]);

    let folded = Tokenizer::new(Normalization { lowercase: true, nfkc: true, stem: true });
    let words: Vec<String> = folded.terms(text).collect();
    assert_eq!(words, vec!["rust", "run"]);
}

proptest! {
    #[test]
    fn terms_are_never_empty(text in any::<String>()) {
        for t in tokenize(&text) {
            prop_assert!(!t.is_empty());
        }
    }

    #[test]
    fn terms_rebuild_non_whitespace_content(text in any::<String>()) {
        let joined: String = tokenize(&text).collect();
        let expected: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        prop_assert_eq!(joined, expected);
    }

    #[test]
    fn terms_never_contain_whitespace(text in "[a-z0-9 ,.!\t\n]{0,64}") {
        for t in tokenize(&text) {
            prop_assert!(!t.chars().any(char::is_whitespace));
        }
    }
}
