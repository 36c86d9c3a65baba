//! SHA-256 checksum sidecars for build outputs.
//!
//! The sidecar sits next to the output as `<output-file>.sha256sum` and holds
//! one line in the format understood by `sha256sum -c`:
//!
//! ```text
//! <64 lowercase hex chars>  <file name>
//! ```

use crate::error::{ReleaseError, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

const STAGE: &str = "checksum";

/// Extension appended to the output file name.
pub const SIDECAR_EXTENSION: &str = "sha256sum";

/// A written checksum sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumSidecar {
    /// File the digest describes
    pub artifact: PathBuf,
    /// Sidecar file path
    pub path: PathBuf,
    /// Lowercase hex SHA-256 digest
    pub digest: String,
}

/// Path of the sidecar for `artifact`.
pub fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    PathBuf::from(name)
}

/// Calculates the SHA-256 checksum of a file.
///
/// Reads the file in 8KB chunks to handle large archives without loading
/// them into memory.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash (64 characters)
/// * `Err(ReleaseError::FileNotFound)` - The file does not exist
pub async fn calculate_sha256(file_path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(file_path)
        .await
        .map_err(|e| not_found_or_io(e, file_path))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Formats one sidecar line for `file_name`.
pub fn format_sidecar_line(digest: &str, file_name: &str) -> String {
    format!("{digest}  {file_name}\n")
}

/// Parses a sidecar line into `(digest, file_name)`.
///
/// Accepts the binary-mode marker (`<digest> *<file>`) written by some
/// tools. Returns `None` when the line is not a valid SHA-256 entry.
pub fn parse_sidecar_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (digest, rest) = line.split_once(' ')?;
    let file_name = rest.strip_prefix([' ', '*'])?;

    let valid_digest =
        digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit());
    if !valid_digest || file_name.is_empty() {
        return None;
    }
    Some((digest, file_name))
}

/// Hashes `artifact` and writes its sidecar next to it.
///
/// # Errors
///
/// [`ReleaseError::FileNotFound`] when `artifact` is missing, which means the
/// build backend broke its contract.
pub async fn write_sidecar(artifact: &Path) -> Result<ChecksumSidecar> {
    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ReleaseError::FileNotFound {
            stage: STAGE,
            path: artifact.to_path_buf(),
        })?;

    let digest = calculate_sha256(artifact).await?;
    let path = sidecar_path(artifact);
    tokio::fs::write(&path, format_sidecar_line(&digest, &file_name)).await?;

    log::info!("SHA256 {}  {}", digest, file_name);

    Ok(ChecksumSidecar {
        artifact: artifact.to_path_buf(),
        path,
        digest,
    })
}

/// Re-hashes the file a sidecar refers to and compares digests.
///
/// The referenced file is resolved relative to the sidecar's directory.
/// Returns `Ok(false)` on mismatch or an unparseable sidecar.
pub async fn verify_sidecar(sidecar: &Path) -> Result<bool> {
    let contents = tokio::fs::read_to_string(sidecar)
        .await
        .map_err(|e| not_found_or_io(e, sidecar))?;

    let Some((expected, file_name)) = contents.lines().next().and_then(parse_sidecar_line) else {
        log::warn!("Malformed checksum sidecar: {}", sidecar.display());
        return Ok(false);
    };

    let artifact = sidecar
        .parent()
        .map(|dir| dir.join(file_name))
        .unwrap_or_else(|| PathBuf::from(file_name));
    let actual = calculate_sha256(&artifact).await?;

    Ok(actual.eq_ignore_ascii_case(expected))
}

fn not_found_or_io(error: std::io::Error, path: &Path) -> ReleaseError {
    if error.kind() == std::io::ErrorKind::NotFound {
        ReleaseError::FileNotFound {
            stage: STAGE,
            path: path.to_path_buf(),
        }
    } else {
        ReleaseError::Io(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_sha256sum_compatible_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("example-mod-2.0.0.zip");
        std::fs::write(&artifact, b"hello").unwrap();

        let sidecar = write_sidecar(&artifact).await.unwrap();

        assert_eq!(sidecar.path, dir.path().join("example-mod-2.0.0.zip.sha256sum"));
        assert_eq!(
            sidecar.digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        let contents = std::fs::read_to_string(&sidecar.path).unwrap();
        assert_eq!(
            contents,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824  example-mod-2.0.0.zip\n"
        );
    }

    #[tokio::test]
    async fn sidecar_verifies_against_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("mod-1.0.0.zip");
        std::fs::write(&artifact, vec![7u8; 20_000]).unwrap();

        let sidecar = write_sidecar(&artifact).await.unwrap();
        assert!(verify_sidecar(&sidecar.path).await.unwrap());

        std::fs::write(&artifact, b"tampered").unwrap();
        assert!(!verify_sidecar(&sidecar.path).await.unwrap());
    }

    #[tokio::test]
    async fn missing_output_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_sidecar(&dir.path().join("absent.zip")).await.unwrap_err();
        assert!(matches!(err, ReleaseError::FileNotFound { stage: "checksum", .. }));
        assert!(!dir.path().join("absent.zip.sha256sum").exists());
    }

    #[test]
    fn parses_text_and_binary_mode_lines() {
        let digest = "a".repeat(64);
        assert_eq!(
            parse_sidecar_line(&format!("{digest}  mod.zip\n")),
            Some((digest.as_str(), "mod.zip"))
        );
        assert_eq!(
            parse_sidecar_line(&format!("{digest} *mod.zip")),
            Some((digest.as_str(), "mod.zip"))
        );
        assert_eq!(parse_sidecar_line("abc  mod.zip"), None);
        assert_eq!(parse_sidecar_line(&format!("{digest}mod.zip")), None);
        assert_eq!(parse_sidecar_line(&format!("{digest}  ")), None);
    }

    #[test]
    fn sidecar_path_appends_extension() {
        assert_eq!(
            sidecar_path(Path::new("output/example-mod-2.0.0.tar.gz")),
            Path::new("output/example-mod-2.0.0.tar.gz.sha256sum")
        );
    }
}
