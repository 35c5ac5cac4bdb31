//! Text normalization shared by query planning and ingestion.
//!
//! Exact and prefix matching compare keys derived at query time against
//! keys derived at ingestion time, so both sides must go through
//! [`normalize`] and [`document_keys`].

/// Lowercase `s`, drop everything except ASCII letters, ASCII digits and
/// whitespace, then trim.
///
/// ```rust
/// use product_search_core::normalize::normalize;
///
/// assert_eq!(normalize("  Héllo, World-42! "), "hllo world42");
/// assert_eq!(normalize("!!!"), "");
/// ```
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    kept.trim().to_string()
}

/// First whitespace-delimited token of an already normalized string,
/// or `""` if there is none.
pub fn first_word(normalized: &str) -> &str {
    normalized.split_whitespace().next().unwrap_or("")
}

/// All non-empty prefixes of `word`, shortest first, including `word`.
pub fn first_word_prefixes(word: &str) -> Vec<String> {
    word.char_indices()
        .map(|(i, c)| word[..i + c.len_utf8()].to_string())
        .collect()
}

/// Derive the `(first_word, first_word_prefixes)` keys stored with a
/// document, from its display name.
pub fn document_keys(name: &str) -> (String, Vec<String>) {
    let normalized = normalize(name);
    let word = first_word(&normalized).to_string();
    let prefixes = first_word_prefixes(&word);
    (word, prefixes)
}
