//! Token and sentence helpers shared by the scorers.
//!
//! Everything here is a pure function over `&str`. Words are
//! whitespace-separated tokens with leading and trailing punctuation
//! stripped and lowercased; a *content word* is one longer than three
//! characters.

use std::collections::HashSet;

/// Minimum length (exclusive) for a word to count as a content word.
const CONTENT_WORD_MIN_CHARS: usize = 3;

/// Split text into trimmed, non-empty sentences on runs of `.`, `!`, `?`.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Number of whitespace-separated tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Lowercase a token and strip surrounding punctuation.
pub fn normalize_word(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Normalized words in order, empties dropped.
pub fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect()
}

pub fn is_content_word(word: &str) -> bool {
    word.chars().count() > CONTENT_WORD_MIN_CHARS
}

/// Distinct content words of `text`.
pub fn content_words(text: &str) -> HashSet<String> {
    words(text).into_iter().filter(|w| is_content_word(w)).collect()
}

/// Normalized words joined by single spaces, for phrase lookups that
/// ignore punctuation and case.
pub fn normalized_text(text: &str) -> String {
    words(text).join(" ")
}

/// Whole-word phrase containment over a [`normalized_text`] haystack.
///
/// `phrase` is normalized the same way before the lookup, so callers may
/// pass raw text.
pub fn contains_phrase(normalized_haystack: &str, phrase: &str) -> bool {
    let needle = normalized_text(phrase);
    if needle.is_empty() {
        return false;
    }
    format!(" {} ", normalized_haystack).contains(&format!(" {} ", needle))
}

/// Number of distinct `terms` that occur as whole-word phrases in `text`.
pub fn count_terms(text: &str, terms: &[&str]) -> usize {
    let haystack = normalized_text(text);
    terms
        .iter()
        .filter(|t| contains_phrase(&haystack, t))
        .count()
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Snap a byte index forward to the nearest valid UTF-8 char boundary.
pub fn ceil_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences_drops_empties() {
        let s = split_sentences("One. Two!! Three?  ");
        assert_eq!(s, vec!["One", "Two", "Three"]);
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("...").is_empty());
    }

    #[test]
    fn test_normalize_word() {
        assert_eq!(normalize_word("\"Hello,"), "hello");
        assert_eq!(normalize_word("don't"), "don't");
        assert_eq!(normalize_word("---"), "");
    }

    #[test]
    fn test_content_words_filter_short() {
        let w = content_words("The cat sat on the comfortable mat.");
        assert!(w.contains("comfortable"));
        assert!(!w.contains("cat"));
        assert!(!w.contains("the"));
    }

    #[test]
    fn test_contains_phrase_whole_words() {
        let hay = normalized_text("Rust is fast, and memory-safe.");
        assert!(contains_phrase(&hay, "is fast"));
        assert!(contains_phrase(&hay, "Rust IS"));
        assert!(!contains_phrase(&hay, "is fas"));
        assert!(!contains_phrase(&hay, ""));
    }

    #[test]
    fn test_count_terms_multiword() {
        let n = count_terms("It could be that this seems wrong.", &["could be", "seems", "maybe"]);
        assert_eq!(n, 2);
        // substring inside a longer word does not count
        assert_eq!(count_terms("A mighty river.", &["might"]), 0);
    }

    #[test]
    fn test_char_boundaries() {
        let s = "a┌b";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(ceil_char_boundary(s, 2), 4);
        assert_eq!(floor_char_boundary(s, 100), s.len());
    }
}
