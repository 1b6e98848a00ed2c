//! Filename normalization shared by every backend.

/// Turn an arbitrary filename into a key that is safe on any medium.
///
/// Path separators become whitespace, whitespace runs collapse into a single
/// `_`, anything outside `[A-Za-z0-9_.-]` is dropped and leading/trailing
/// `.`/`_` are trimmed. The result never contains a path separator, so it
/// cannot traverse out of a directory, and applying it twice changes nothing.
///
/// An input with no usable characters yields an empty string; backends reject
/// empty keys on write.
pub fn secure_filename(filename: &str) -> String {
    let spaced: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    filtered.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Split a sanitized key into `(stem, suffix)` at its last dot.
///
/// The suffix keeps the dot and is empty when the key has no extension.
pub(crate) fn split_extension(key: &str) -> (&str, &str) {
    match key.rfind('.') {
        Some(idx) if idx > 0 => key.split_at(idx),
        _ => (key, ""),
    }
}
