//! Safe interpolation of caller text into SPARQL string literals.
//!
//! Every free-text value that lands between quotes in a generated query goes
//! through `escape_literal`. Values from closed enumerations are additionally
//! checked with `validate_enumerated` before they are rendered.

use rustc_hash::FxHashSet;

use crate::errors::QueryError;

/// Character written after the backslash for each character that could
/// terminate or corrupt a quoted literal. Line breaks are not allowed raw
/// inside a SPARQL string literal.
fn escape_code(c: char) -> Option<char> {
    match c {
        '\\' | '"' | '\'' => Some(c),
        '\n' => Some('n'),
        '\r' => Some('r'),
        '\t' => Some('t'),
        _ => None,
    }
}

/// Inverse of `escape_code`.
fn unescape_code(code: char) -> Option<char> {
    match code {
        '\\' | '"' | '\'' => Some(code),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        _ => None,
    }
}

/// Prefix every backslash, double quote and single quote with a backslash,
/// and write line feeds, carriage returns and tabs as `\n`, `\r`, `\t`.
///
/// `She said "hi"` becomes `She said \"hi\"`.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match escape_code(c) {
            Some(code) => {
                out.push('\\');
                out.push(code);
            }
            None => out.push(c),
        }
    }
    out
}

/// Inverse of `escape_literal`: turn each escape pair back into its character.
/// A trailing lone backslash is kept as-is.
pub fn unescape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(original) = chars.peek().and_then(|&next| unescape_code(next)) {
                out.push(original);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Render `value` as a complete double-quoted SPARQL literal.
pub fn quoted(value: &str) -> String {
    format!("\"{}\"", escape_literal(value))
}

/// True when nothing in `escaped` can close a literal early or break its
/// syntax: every quote and backslash is part of an escape pair and no raw
/// line break or tab remains.
pub fn is_literal_safe(escaped: &str) -> bool {
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) if unescape_code(next).is_some() => {}
                _ => return false,
            },
            '"' | '\'' | '\n' | '\r' | '\t' => return false,
            _ => {}
        }
    }
    true
}

/// Check a value drawn from a closed enumeration against the known members.
pub fn validate_enumerated(param: &str, value: &str, known: &FxHashSet<String>) -> Result<(), QueryError> {
    if known.contains(value) {
        Ok(())
    } else {
        Err(QueryError::InvalidParameter {
            param: param.to_string(),
            reason: format!("unknown value '{}'", value),
        })
    }
}
