//! Output naming
//!
//! `bg_removed_<basename>_<10 hex chars>.jpg`, where the basename is the
//! sanitized upload filename without its extension.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Prefix of every generated name
pub const NAME_PREFIX: &str = "bg_removed_";

/// Length of the random hex suffix
pub const SUFFIX_LEN: usize = 10;

/// Longest basename kept in a generated name, in bytes
pub const MAX_STEM_LEN: usize = 100;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("valid regex"));

/// Make an untrusted filename safe to use as a path component
///
/// The name is NFKD-normalized so accented letters keep their base letter.
/// Path separators become spaces, whitespace runs collapse to `_`, anything
/// outside `[A-Za-z0-9_.-]` is dropped and leading/trailing `.` and `_` are
/// trimmed. The result can be empty.
pub fn sanitize_filename(filename: &str) -> String {
    let normalized: String = filename.nfkd().collect();
    let separated = normalized.replace(['/', '\\'], " ");
    let joined = separated.split_whitespace().collect::<Vec<_>>().join("_");
    UNSAFE_CHARS
        .replace_all(&joined, "")
        .trim_matches(|c: char| c == '.' || c == '_')
        .to_string()
}

/// Generate a unique output name for an uploaded file
pub fn generate_name(original: &str) -> String {
    let sanitized = sanitize_filename(original);
    let stem = match sanitized.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        Some(_) => "",
        None => sanitized.as_str(),
    };
    let stem = truncate(stem, MAX_STEM_LEN);
    let stem = if stem.is_empty() { "image" } else { stem };

    format!("{}{}_{}.jpg", NAME_PREFIX, stem, random_suffix())
}

/// Cut `s` to at most `max` bytes on a char boundary
fn truncate(s: &str, max: usize) -> &str {
    let mut end = s.len().min(max);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].trim_end_matches(|c: char| c == '.' || c == '_')
}

fn random_suffix() -> String {
    let bytes: [u8; SUFFIX_LEN / 2] = rand::random();
    hex::encode(bytes)
}
