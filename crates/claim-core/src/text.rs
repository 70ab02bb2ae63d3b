//! Tokenisation and keyword tables shared by the lexical backends

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"[\p{L}\p{N}]+(?:['’][\p{L}]+)?").unwrap();
    static ref NUMBER: Regex = Regex::new(r"\d+(?:[.,]\d+)*").unwrap();
    static ref SENTENCE_END: Regex = Regex::new(r"[.!?;]+\s+").unwrap();
}

/// Function words ignored when measuring content overlap
pub const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "being", "by", "can", "could", "did",
    "do", "does", "for", "from", "had", "has", "have", "he", "her", "his", "i", "in", "into",
    "is", "it", "its", "of", "on", "or", "our", "she", "so", "some", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "those", "to", "was", "we",
    "were", "what", "when", "where", "which", "while", "who", "whom", "will", "with", "would",
    "you", "your", "also", "located", "situated", "called", "known",
];

/// Words and suffixes that flip the polarity of a statement
pub const NEGATION_CUES: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "nowhere", "cannot",
    "without", "false", "untrue", "denied", "denies", "deny", "refuted", "myth", "hoax",
];

/// Lower-cased word tokens in reading order
pub fn tokenize(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase().replace('’', "'"))
        .collect()
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

pub fn is_negation(token: &str) -> bool {
    NEGATION_CUES.contains(&token) || token.ends_with("n't")
}

/// Crude suffix stripping so "located"/"locates" and "towers"/"tower" meet
pub fn stem(token: &str) -> String {
    let token = token.strip_suffix("'s").unwrap_or(token);
    for suffix in ["ing", "ies", "ed", "es", "s"] {
        if let Some(base) = token.strip_suffix(suffix) {
            if base.chars().count() >= 3 {
                return match suffix {
                    "ies" => format!("{base}y"),
                    _ => base.to_string(),
                };
            }
        }
    }
    token.to_string()
}

/// Stemmed content words: no stopwords, no negation cues, no bare numbers
pub fn content_terms(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stopword(t) && !is_negation(t))
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| stem(&t))
        .collect()
}

/// Numeric literals with thousands separators removed
pub fn numbers(text: &str) -> Vec<String> {
    NUMBER
        .find_iter(text)
        .map(|m| m.as_str().replace(',', ""))
        .collect()
}

/// Split on sentence-ending punctuation followed by whitespace
pub fn sentences(text: &str) -> Vec<&str> {
    SENTENCE_END
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Count of negation cues in the text
pub fn negation_count(text: &str) -> usize {
    tokenize(text).iter().filter(|t| is_negation(t)).count()
}
