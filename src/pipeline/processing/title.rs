//! Title canonicalization.
//!
//! Two titles that differ only by case, accents, punctuation, a trailing
//! `(YYYY)` or parenthetical, a trailing "the", or repeated tokens produce the
//! same comparison key.

use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(\d{4}\)\s*$").expect("valid trailing year regex"));
static EMBEDDED_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\((\d{4})\)\s*(\([^)]*\)\s*)?$").expect("valid embedded year regex")
});
static TRAILING_PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("valid trailing parenthetical regex"));

const TRAILING_ARTICLE: &str = "the";

/// Canonicalize a raw title into its comparison key.
///
/// Total: blank input yields an empty string. Idempotent:
/// `normalize_title(&normalize_title(t)) == normalize_title(t)`.
pub fn normalize_title(title: &str) -> String {
    if title.trim().is_empty() {
        return String::new();
    }

    let ascii = deunicode::deunicode(title).to_lowercase();
    let without_year = TRAILING_YEAR.replace(&ascii, "");
    let without_annotation = TRAILING_PARENTHETICAL.replace(&without_year, "");

    let spaced: String = without_annotation
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();

    let mut tokens: Vec<&str> = spaced.split_whitespace().collect();
    strip_trailing_article(&mut tokens);

    let mut deduped: Vec<&str> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if !deduped.contains(&token) {
            deduped.push(token);
        }
    }
    // Dedup can leave an earlier "the" at the end ("x the x" -> "x the")
    strip_trailing_article(&mut deduped);

    deduped.join(" ")
}

/// Release year written into a title as a trailing `(YYYY)`, optionally
/// followed by one more parenthetical: `"Alien (1979) (Director's Cut)"`.
pub fn title_year(title: &str) -> Option<i32> {
    EMBEDDED_YEAR
        .captures(title.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn strip_trailing_article(tokens: &mut Vec<&str>) {
    if tokens.last() == Some(&TRAILING_ARTICLE) {
        tokens.pop();
    }
}
