//! Object key validation.
//!
//! Keys are `/`-separated and always relative to the backend root (or bucket
//! prefix). They must never escape it.

use crate::error::{ErrorKind, Result};

/// Validates an object key and returns its normalised form.
///
/// Empty segments and `.` are dropped, `..` pops the previous segment. A key
/// that would climb above the root, contains a NUL byte or a backslash, or is
/// empty after normalisation is rejected with
/// [`InvalidKey`](crate::error::ErrorKind::InvalidKey).
///
/// # Examples
///
/// ```
/// use folio_storage::validate_key;
/// assert_eq!(validate_key("images//covers/./a.jpg").unwrap(), "images/covers/a.jpg");
/// assert_eq!(validate_key("/images/x/../a.jpg").unwrap(), "images/a.jpg");
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("a\0b").is_err());
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<String> {
    let key = key.as_ref();
    if key.contains('\0') || key.contains('\\') {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
            },
            s => segments.push(s),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
        false => Ok(segments.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("images/book-covers/a.jpg", "images/book-covers/a.jpg")]
    #[case("a//b//c", "a/b/c")]
    #[case("a/./b/./c", "a/b/c")]
    #[case("a/b/..", "a")]
    #[case("covers/", "covers")]
    #[case("/leading/slash.jpg", "leading/slash.jpg")]
    fn test_valid_keys(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(validate(key).unwrap(), expected);
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("..")]
    #[case("a\0b")]
    #[case("a\\b")]
    #[case("")]
    #[case("./.")]
    #[case("//")]
    fn test_invalid_keys(#[case] key: &str) {
        let err = validate(key).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
    }
}
