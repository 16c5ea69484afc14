//! Image inlining: embed relative Markdown image references as data URIs so
//! the Markdown renders without its `images/` directory.

use crate::error::DocRouteError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap());

const FALLBACK_MIME: &str = "application/octet-stream";

/// MIME type for an image: content sniffing first, then the extension.
pub fn image_mime(bytes: &[u8], path: &Path) -> &'static str {
    image::guess_format(bytes)
        .ok()
        .or_else(|| ImageFormat::from_path(path).ok())
        .map(|f| f.to_mime_type())
        .unwrap_or(FALLBACK_MIME)
}

/// Targets that are already self-contained or remote.
fn is_external(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    lower.starts_with("data:") || lower.starts_with("http://") || lower.starts_with("https://")
}

/// Relative paths that stay inside the base directory: no root, drive
/// prefix or `..` component.
fn stays_inside(target: &str) -> bool {
    Path::new(target)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Rewrite every `![alt](relative/path)` in `markdown` to
/// `![alt](data:<mime>;base64,<content>)`, resolving paths against
/// `base_dir`. `data:` and `http(s)://` targets are left as they are, so
/// running this twice changes nothing the second time. Absolute targets and
/// targets with `..` components are never read and stay unchanged.
///
/// # Errors
/// [`DocRouteError::AssetMissing`] when a referenced file cannot be read.
pub fn inline_images(markdown: &str, base_dir: &Path) -> Result<String, DocRouteError> {
    let mut out = String::with_capacity(markdown.len());
    let mut encoded: HashMap<&str, String> = HashMap::new();
    let mut last = 0;

    for caps in RE_IMAGE.captures_iter(markdown) {
        let (Some(whole), Some(alt), Some(target)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let target = target.as_str().trim();
        if target.is_empty() || is_external(target) {
            continue;
        }
        if !stays_inside(target) {
            warn!("Not inlining '{}': outside {}", target, base_dir.display());
            continue;
        }

        out.push_str(&markdown[last..whole.start()]);
        if !encoded.contains_key(target) {
            let path = base_dir.join(target);
            let bytes = std::fs::read(&path).map_err(|source| DocRouteError::AssetMissing {
                path: path.clone(),
                source,
            })?;
            let mime = image_mime(&bytes, &path);
            debug!("Inlining {} ({}, {} bytes)", path.display(), mime, bytes.len());
            encoded.insert(target, format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)));
        }
        out.push_str("![");
        out.push_str(alt.as_str());
        out.push_str("](");
        out.push_str(&encoded[target]);
        out.push(')');
        last = whole.end();
    }

    out.push_str(&markdown[last..]);
    Ok(out)
}

/// Async wrapper around [`inline_images`]; file reads run on a blocking
/// thread.
pub async fn inline_images_async(
    markdown: String,
    base_dir: PathBuf,
) -> Result<String, DocRouteError> {
    tokio::task::spawn_blocking(move || inline_images(&markdown, &base_dir))
        .await
        .map_err(|e| DocRouteError::Internal(format!("Inline task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_with(files: &[(&str, &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, data) in files {
            let p = dir.path().join(name);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(p, data).unwrap();
        }
        dir
    }

    #[test]
    fn inlines_relative_reference() {
        let dir = dir_with(&[("img/1.png", b"0123456789")]);
        let out = inline_images("![fig](img/1.png)", dir.path()).unwrap();
        assert_eq!(out, "![fig](data:image/png;base64,MDEyMzQ1Njc4OQ==)");
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let dir = dir_with(&[("img/1.png", b"0123456789")]);
        let once = inline_images("a ![fig](img/1.png) b", dir.path()).unwrap();
        let twice = inline_images(&once, dir.path()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn content_wins_over_extension() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];
        let dir = dir_with(&[("images/x.png", &jpeg)]);
        let out = inline_images("![](images/x.png)", dir.path()).unwrap();
        assert!(out.starts_with("![](data:image/jpeg;base64,"), "{out}");
    }

    #[test]
    fn unknown_bytes_and_extension_fall_back() {
        assert_eq!(image_mime(b"????", Path::new("blob.bin")), FALLBACK_MIME);
        assert_eq!(image_mime(b"????", Path::new("a.jpg")), "image/jpeg");
    }

    #[test]
    fn several_references_and_text_kept() {
        let dir = dir_with(&[("images/a.png", b"A"), ("images/b.png", b"B")]);
        let md = "# T\n![a](images/a.png)\ntext\n![b](images/b.png) ![a2](images/a.png)\n";
        let out = inline_images(md, dir.path()).unwrap();
        assert!(out.starts_with("# T\n![a](data:image/png;base64,QQ==)\ntext\n"));
        assert!(out.contains("![b](data:image/png;base64,Qg==)"));
        assert!(out.ends_with("![a2](data:image/png;base64,QQ==)\n"));
    }

    #[test]
    fn markdown_without_images_is_untouched() {
        let md = "plain [link](page.html) and **bold**";
        assert_eq!(inline_images(md, Path::new("/nowhere")).unwrap(), md);
    }

    #[test]
    fn remote_targets_are_kept() {
        let md = "![r](https://example.com/a.png) ![d](data:image/png;base64,AA==)";
        assert_eq!(inline_images(md, Path::new("/nowhere")).unwrap(), md);
    }

    #[test]
    fn missing_asset_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = inline_images("![x](images/gone.jpg)", dir.path()).unwrap_err();
        match err {
            DocRouteError::AssetMissing { path, .. } => assert!(path.ends_with("images/gone.jpg")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn targets_outside_base_dir_are_not_read() {
        let outside = dir_with(&[("secret.txt", b"SECRET")]);
        let base = dir_with(&[("images/ok.png", b"A")]);
        let secret = outside.path().join("secret.txt");
        let escaping = format!(
            "../{}/secret.txt",
            outside.path().file_name().unwrap().to_string_lossy()
        );

        let md = format!(
            "![abs]({}) ![up]({}) ![ok](images/ok.png)",
            secret.display(),
            escaping
        );
        let out = inline_images(&md, base.path()).unwrap();
        assert!(!out.contains("U0VDUkVU"), "{out}");
        assert!(out.contains(&format!("![abs]({})", secret.display())));
        assert!(out.contains(&format!("![up]({escaping})")));
        assert!(out.ends_with("![ok](data:image/png;base64,QQ==)"));
    }

    #[test]
    fn inside_check_is_lexical() {
        assert!(stays_inside("images/a.png"));
        assert!(stays_inside("./images/a.png"));
        assert!(!stays_inside("/etc/passwd"));
        assert!(!stays_inside("../a.png"));
        assert!(!stays_inside("images/../../a.png"));
    }

    #[tokio::test]
    async fn async_wrapper() {
        let dir = dir_with(&[("i.png", b"z")]);
        let out = inline_images_async("![](i.png)".into(), dir.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(out, "![](data:image/png;base64,eg==)");
    }
}
