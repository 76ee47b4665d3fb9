mod book;
mod candidate;
mod resolved;
mod source;

pub use self::book::Book;
pub use self::candidate::{CoverCandidate, StorageLocation};
pub use self::resolved::ResolvedCover;
pub use self::source::CoverSource;

/// Lowercase, with every run of non-alphanumeric characters collapsed to a
/// single dash.
pub(crate) fn slugify(s: impl AsRef<str>) -> String {
    let mut out = String::with_capacity(s.as_ref().len());
    let mut dash = false;
    for c in s.as_ref().trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    if out.ends_with('-') {
        out.pop();
    }
    out
}
