//! Filesystem-safe base names derived from an input path.
//!
//! The stem of the input file becomes the prefix of every derived artifact
//! (normalised PDF, backend output directory, Markdown file). Only the
//! character set is made safe: the length in chars and the order are kept,
//! and collisions between different inputs are accepted. Callers that need
//! uniqueness append a timestamp (see [`crate::pipeline::route::base_name`]).

use crate::error::DocRouteError;
use std::path::Path;

/// Final path component without its extension, with every char that is not
/// alphanumeric, `_` or `.` replaced by `_`.
///
/// ```rust
/// use docroute::pipeline::sanitize::safe_stem;
///
/// assert_eq!(safe_stem("/uploads/my report (v2).pdf").unwrap(), "my_report__v2_");
/// assert_eq!(safe_stem("scan.2024.png").unwrap(), "scan.2024");
/// ```
pub fn safe_stem(path: impl AsRef<Path>) -> Result<String, DocRouteError> {
    let path = path.as_ref();
    let stem = path
        .file_stem()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DocRouteError::InvalidInput {
            input: path.display().to_string(),
        })?;

    Ok(sanitize(&stem.to_string_lossy()))
}

/// Character-level replacement used by [`safe_stem`].
pub fn sanitize(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_safe(s: &str) -> bool {
        s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    }

    #[test]
    fn keeps_safe_names() {
        assert_eq!(safe_stem("paper.pdf").unwrap(), "paper");
        assert_eq!(safe_stem("a_b.c.jpeg").unwrap(), "a_b.c");
    }

    #[test]
    fn replaces_unsafe_chars() {
        assert_eq!(safe_stem("dir/a b-c+d.pdf").unwrap(), "a_b_c_d");
        assert_eq!(safe_stem("x/[draft]#1.png").unwrap(), "_draft__1");
    }

    #[test]
    fn preserves_unicode_letters_and_length() {
        let stems = ["扫描件 第1页", "Ünïcødé—name", "tab\there", "emoji🙂x"];
        for stem in stems {
            let out = sanitize(stem);
            assert!(is_safe(&out), "{out}");
            assert_eq!(out.chars().count(), stem.chars().count(), "{stem}");
        }
        assert_eq!(sanitize("扫描件 第1页"), "扫描件_第1页");
    }

    #[test]
    fn dotfile_stem_is_whole_name() {
        assert_eq!(safe_stem(".hidden").unwrap(), ".hidden");
    }

    #[test]
    fn collisions_are_accepted() {
        assert_eq!(safe_stem("a b.pdf").unwrap(), safe_stem("a-b.pdf").unwrap());
    }

    #[test]
    fn rejects_empty_path() {
        assert!(matches!(
            safe_stem(""),
            Err(DocRouteError::InvalidInput { .. })
        ));
        assert!(safe_stem("/").is_err());
        assert!(safe_stem("..").is_err());
    }
}
