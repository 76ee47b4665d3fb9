//! Object-store key naming for cover images.
//!
//! Canonical keys look like `images/book-covers/{book}-lg-{source}.{ext}`.
//! Older deployments wrote covers without the source suffix, with the raw
//! (un-slugged) source name, or straight under the book identifier; those
//! variants are still tried when looking for an existing cover.

use crate::models::{CoverSource, slugify};

pub const COVER_PREFIX: &str = "images/book-covers";
const SIZE_SUFFIX: &str = "lg";
/// Extensions stored covers are written with; JPEG first.
pub const STORED_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// Characters outside `[A-Za-z0-9_-]` are replaced so that any identifier is
/// safe to embed as a single key segment.
fn key_safe(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Public URL of a stored object under `base`.
pub fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// Normalise an image extension (`.JPEG` → `jpg`).
pub fn normalize_extension(ext: &str) -> String {
    match ext.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
        "jpeg" | "jpe" | "" => "jpg".to_string(),
        other => other.to_string(),
    }
}

/// The one key a cover for `(book, extension, source)` is written to.
pub fn canonical_key(book_id: &str, extension: &str, source: &CoverSource) -> String {
    format!(
        "{COVER_PREFIX}/{}-{SIZE_SUFFIX}-{}.{}",
        key_safe(book_id),
        source.key_segment(),
        normalize_extension(extension)
    )
}

/// Historical names a cover for `(book, extension, source)` may exist under,
/// excluding the canonical key. Deduplicated, oldest scheme last.
pub fn legacy_keys(book_id: &str, extension: &str, source: &CoverSource) -> Vec<String> {
    let id = key_safe(book_id);
    let ext = normalize_extension(extension);
    let canonical = canonical_key(book_id, extension, source);
    let raw_source = key_safe(source.as_str());
    let mut keys = vec![
        format!("{COVER_PREFIX}/{id}-{SIZE_SUFFIX}-{raw_source}.{ext}"),
        format!("{COVER_PREFIX}/{id}-{SIZE_SUFFIX}-{}.{ext}", slugify(source.as_str()).replace('-', "_")),
        format!("{COVER_PREFIX}/{id}-{SIZE_SUFFIX}.{ext}"),
        format!("{COVER_PREFIX}/{id}.{ext}"),
    ];
    let mut seen = vec![canonical];
    keys.retain(|k| {
        if seen.contains(k) {
            false
        } else {
            seen.push(k.clone());
            true
        }
    });
    keys
}

/// Every key worth probing when all that is known is the book, canonical
/// keys for each ranked source first, then the legacy names.
pub fn lookup_keys(book_id: &str, sources: &[CoverSource]) -> Vec<String> {
    let mut keys: Vec<String> = sources
        .iter()
        .flat_map(|source| STORED_EXTENSIONS.iter().map(move |ext| canonical_key(book_id, ext, source)))
        .collect();
    for source in sources {
        for ext in STORED_EXTENSIONS {
            for key in legacy_keys(book_id, ext, source) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
    }
    keys
}
