//! Slug codec - maps free-text names to filesystem-safe identifiers
//!
//! Topic ids, concept ids and the per-concept file names in the workspace
//! are all derived through [`slugify`].

use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("static slug pattern"));

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-\s]+").expect("static slug pattern"));

/// Convert display text into an identifier.
///
/// Lower-cases, drops everything that is not a word character, whitespace
/// or hyphen, collapses separator runs into a single `-` and trims hyphens
/// from both ends. Word characters are Unicode-aware, so `"Python 基础"`
/// becomes `"python-基础"`.
///
/// The mapping is idempotent but not injective: callers that derive ids
/// from names must treat a collision as "already exists".
pub fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let kept = DISALLOWED.replace_all(&lowered, "");
    let joined = SEPARATORS.replace_all(&kept, "-");
    joined.trim_matches('-').to_string()
}
