use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

use crate::types::SearchFilters;

pub fn generate_code_verifier() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(128)
        .map(char::from)
        .collect()
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Formats milliseconds as `m:ss`.
pub fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Builds the `q` parameter of a track search.
///
/// Filters are passed to Spotify as field filters without interpretation.
/// The year range is only applied when both ends are given.
pub fn build_search_query(query: &str, filters: &SearchFilters) -> String {
    let mut q = query.trim().to_string();

    let mut push = |filter: String| {
        if !q.is_empty() {
            q.push(' ');
        }
        q.push_str(&filter);
    };

    if let Some(artist) = non_empty(&filters.artist) {
        push(format!("artist:{artist}"));
    }
    if let Some(genre) = non_empty(&filters.genre) {
        push(format!("genre:{genre}"));
    }
    if let (Some(start), Some(end)) = (non_empty(&filters.year_start), non_empty(&filters.year_end))
    {
        push(format!("year:{start}-{end}"));
    }

    q
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Resolves 1-based row numbers against a list, ignoring numbers out of range.
pub fn pick_rows<T: Clone>(items: &[T], rows: &[usize]) -> Vec<T> {
    rows.iter()
        .filter_map(|row| row.checked_sub(1).and_then(|i| items.get(i)))
        .cloned()
        .collect()
}
