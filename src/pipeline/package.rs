//! Directory archival: zip the backend's output directory for download.
//!
//! Archive names are SHA-256 hex digests; see [`ArchiveNaming`] for what is
//! hashed.

use crate::config::ArchiveNaming;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Outcome of [`compress_directory_to_zip`].
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveStatus {
    /// Archive written with this many file entries.
    Created { entries: usize },
    /// Archive could not be written. A partial file may remain.
    Failed { reason: String },
}

impl ArchiveStatus {
    pub fn is_created(&self) -> bool {
        matches!(self, ArchiveStatus::Created { .. })
    }
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// `<digest>.zip` for a conversion whose output lives in `md_dir`.
pub fn archive_file_name(naming: ArchiveNaming, md_dir: &Path, base_name: &str) -> String {
    let digest = match naming {
        ArchiveNaming::PathHash => sha256_hex(md_dir.to_string_lossy().as_bytes()),
        ArchiveNaming::Unique => {
            let token = uuid::Uuid::new_v4();
            sha256_hex(format!("{base_name}:{token}"))
        }
    };
    format!("{digest}.zip")
}

/// Zip every file under `src` into `dest`.
///
/// Entries are named by their path relative to `src` with `/` separators,
/// added in sorted order and Deflate-compressed. `dest` itself is skipped
/// when it lies inside `src`. Never panics; failures are logged and
/// reported as [`ArchiveStatus::Failed`].
pub fn compress_directory_to_zip(src: &Path, dest: &Path) -> ArchiveStatus {
    match write_archive(src, dest) {
        Ok(entries) => {
            info!(
                "Archived {} ({} files) → {}",
                src.display(),
                entries,
                dest.display()
            );
            ArchiveStatus::Created { entries }
        }
        Err(e) => {
            error!(
                "Failed to archive {} into {}: {}",
                src.display(),
                dest.display(),
                e
            );
            ArchiveStatus::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Async wrapper around [`compress_directory_to_zip`]; runs on a blocking
/// thread.
pub async fn compress_directory_to_zip_async(src: PathBuf, dest: PathBuf) -> ArchiveStatus {
    match tokio::task::spawn_blocking(move || compress_directory_to_zip(&src, &dest)).await {
        Ok(status) => status,
        Err(e) => ArchiveStatus::Failed {
            reason: format!("Archive task panicked: {}", e),
        },
    }
}

fn write_archive(src: &Path, dest: &Path) -> Result<usize, ZipError> {
    let skip = dest.canonicalize().ok();
    let mut files = Vec::new();
    collect_files(src, &mut files)?;
    files.retain(|f| skip.is_none() || f.canonicalize().ok() != skip);

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut zip = ZipWriter::new(BufWriter::new(File::create(dest)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in &files {
        let name = entry_name(src, path);
        debug!("Adding {}", name);
        zip.start_file(name, options)?;
        let mut input = File::open(path)?;
        std::io::copy(&mut input, &mut zip)?;
    }
    zip.finish()?;
    Ok(files.len())
}

/// Recursive walk in sorted order, files only. Symlinked directories are
/// not descended into; symlinked files are archived with their target's
/// content.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    for path in entries {
        let file_type = std::fs::symlink_metadata(&path)?.file_type();
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_symlink() && path.is_dir() {
            debug!("Skipping symlinked directory {}", path.display());
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn entry_name(src: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(src).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::ZipArchive;

    fn entry_names(archive: &Path) -> Vec<String> {
        let zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        zip.file_names().map(String::from).collect::<Vec<_>>()
    }

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"beta").unwrap();
        dir
    }

    #[test]
    fn archives_relative_entries() {
        let src = sample_tree();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("x.zip");

        let status = compress_directory_to_zip(src.path(), &dest);
        assert_eq!(status, ArchiveStatus::Created { entries: 2 });

        let mut names = entry_names(&dest);
        names.sort();
        assert_eq!(names, vec!["a.txt", "sub/b.txt"]);

        let mut zip = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut b = String::new();
        std::io::Read::read_to_string(&mut zip.by_name("sub/b.txt").unwrap(), &mut b).unwrap();
        assert_eq!(b, "beta");
    }

    #[test]
    fn dest_inside_src_is_skipped() {
        let src = sample_tree();
        let dest = src.path().join("bundle.zip");
        assert!(compress_directory_to_zip(src.path(), &dest).is_created());
        // Second run finds the first archive in the tree.
        let status = compress_directory_to_zip(src.path(), &dest);
        assert_eq!(status, ArchiveStatus::Created { entries: 2 });
        assert!(!entry_names(&dest).iter().any(|n| n.ends_with(".zip")));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let dir = sample_tree();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();
        let dest = tempfile::tempdir().unwrap();
        let zip_path = dest.path().join("out.zip");

        let status = compress_directory_to_zip(dir.path(), &zip_path);
        assert_eq!(status, ArchiveStatus::Created { entries: 2 });
        let mut names = entry_names(&zip_path);
        names.sort();
        assert_eq!(names, vec!["a.txt", "sub/b.txt"]);
    }

    #[test]
    fn missing_source_fails_without_panicking() {
        let out = tempfile::tempdir().unwrap();
        let status = compress_directory_to_zip(Path::new("/no/such/dir"), &out.path().join("x.zip"));
        assert!(matches!(status, ArchiveStatus::Failed { .. }));
    }

    #[test]
    fn path_hash_is_deterministic() {
        let md = Path::new("./output/doc_250101_000000/auto");
        let a = archive_file_name(ArchiveNaming::PathHash, md, "doc_250101_000000");
        let b = archive_file_name(ArchiveNaming::PathHash, md, "other");
        assert_eq!(a, b);
        assert_eq!(a, format!("{}.zip", sha256_hex("./output/doc_250101_000000/auto")));
        assert_eq!(a.len(), 64 + 4);
    }

    #[test]
    fn unique_names_differ() {
        let md = Path::new("out/doc/auto");
        let a = archive_file_name(ArchiveNaming::Unique, md, "doc");
        let b = archive_file_name(ArchiveNaming::Unique, md, "doc");
        assert_ne!(a, b);
        assert!(a.ends_with(".zip"));
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn async_wrapper_archives() {
        let src = sample_tree();
        let out = tempfile::tempdir().unwrap();
        let status =
            compress_directory_to_zip_async(src.path().to_path_buf(), out.path().join("y.zip"))
                .await;
        assert!(status.is_created());
    }
}
