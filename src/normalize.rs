//! Title normalization shared by the title index and the fuzzy matcher.
//!
//! Both sides of every comparison go through `normalize_title`, so a change
//! here shifts every score. Run the matcher tests after touching it.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Apostrophes are dropped rather than split on: "O'Neill's" → "oneills".
pub static APOSTROPHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"['`]").unwrap());

/// Anything that is not a lowercase ASCII letter or digit becomes a token break.
pub static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Regex to collapse multiple whitespace into single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII by applying NFKD decomposition,
/// removing combining marks and transliterating whatever is left.
/// e.g., "Sí Bheag, Sí Mhór" → "si bheag, si mhor"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Convert typographic quotes to straight ones and `&` to `and`.
pub fn normalize_punctuation(s: &str) -> String {
    let result = s
        .replace(['\u{2018}', '\u{2019}', '\u{00B4}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('&', " and ");
    MULTI_SPACE.replace_all(&result, " ").to_string()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize a title (or a search query) for fuzzy comparison.
///
/// The result is lowercase ASCII, words separated by single spaces, with no
/// punctuation. Token order is preserved; order-independent comparison is
/// the scorer's job.
pub fn normalize_title(title: &str) -> String {
    let folded = fold_to_ascii(&normalize_punctuation(title));
    let folded = APOSTROPHES.replace_all(&folded, "");
    let spaced = NON_ALNUM.replace_all(&folded, " ");
    spaced.trim().to_string()
}

/// Split an already normalized title into its word tokens.
pub fn tokenize(normalized: &str) -> Vec<String> {
    normalized.split_whitespace().map(str::to_string).collect()
}

/// Tokens sorted and deduplicated, the form the token-set scorer works on.
pub fn sorted_unique_tokens(normalized: &str) -> Vec<String> {
    let mut tokens = tokenize(normalized);
    tokens.sort_unstable();
    tokens.dedup();
    tokens
}
