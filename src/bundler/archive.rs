//! Native archive backend.
//!
//! Packages a mod source directory into a zip or tar.gz archive. Entries are
//! written in sorted order with fixed timestamps and permissions, so the same
//! input tree always produces the same bytes and therefore the same checksum.

use super::{
    Error, ModBuilder, ModName, Result,
    error::ErrorExt,
    naming::{is_build_output, output_file_name, output_path, remove_previous_output},
};
use crate::{bail, version::ResolvedVersion};
use flate2::{Compression, write::GzEncoder};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// Archive format of the build output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ArchiveFormat {
    /// `.zip`, deflate compressed
    #[default]
    #[serde(rename = "zip")]
    Zip,
    /// `.tar.gz`
    #[serde(rename = "tar.gz", alias = "tgz")]
    TarGz,
}

impl ArchiveFormat {
    /// Extensions of every supported format.
    pub const EXTENSIONS: [&'static str; 2] = ["zip", "tar.gz"];

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zip" => Ok(Self::Zip),
            "tar.gz" | "tgz" => Ok(Self::TarGz),
            other => Err(format!("unknown archive format '{other}' (expected zip or tar.gz)")),
        }
    }
}

/// One file or directory to place in the archive.
#[derive(Debug)]
struct ArchiveEntry {
    source: PathBuf,
    /// Path inside the archive, `/`-separated, prefixed with the mod name
    name: String,
    is_dir: bool,
}

/// Builds mod archives from a source directory.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    source_dir: PathBuf,
    output_dir: PathBuf,
    format: ArchiveFormat,
    excludes: Vec<glob::Pattern>,
    skip_dirs: Vec<PathBuf>,
}

impl ArchiveBuilder {
    /// Creates an archive builder.
    ///
    /// # Arguments
    ///
    /// * `source_dir` - Directory holding the mod content
    /// * `output_dir` - Directory the archive is written to
    /// * `format` - Archive format
    /// * `excludes` - Glob patterns, matched against `/`-separated paths
    ///   relative to `source_dir`. A `dir/**` pattern also excludes `dir`
    ///   itself.
    pub fn new(
        source_dir: PathBuf,
        output_dir: PathBuf,
        format: ArchiveFormat,
        excludes: &[String],
    ) -> Result<Self> {
        let mut compiled = Vec::with_capacity(excludes.len());
        for pattern in excludes {
            let mut variants = vec![pattern.as_str()];
            if let Some(dir) = pattern.strip_suffix("/**").filter(|dir| !dir.is_empty()) {
                variants.push(dir);
            }
            for variant in variants {
                compiled.push(glob::Pattern::new(variant).map_err(|error| Error::Pattern {
                    pattern: pattern.clone(),
                    error,
                })?);
            }
        }

        Ok(Self {
            source_dir,
            output_dir,
            format,
            excludes: compiled,
            skip_dirs: Vec::new(),
        })
    }

    /// Never archives `dir` when it lies inside the source directory.
    pub fn skip_dir(mut self, dir: PathBuf) -> Self {
        self.skip_dirs.push(dir);
        self
    }

    /// Archive format this builder writes.
    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.excludes.iter().any(|pattern| pattern.matches(relative))
    }

    /// Walks the source tree and returns the entries to archive in order.
    ///
    /// `skip` holds absolute directories left out entirely. Files in
    /// `output` that look like earlier packages of `name` are left out too.
    fn collect_entries(
        &self,
        source: &Path,
        skip: &[PathBuf],
        output: &Path,
        name: &ModName,
    ) -> Result<Vec<ArchiveEntry>> {
        let walker = walkdir::WalkDir::new(source)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let path = entry.path();
                let Ok(relative) = path.strip_prefix(source) else {
                    return false;
                };
                if skip.iter().any(|dir| path == dir) {
                    log::debug!("Skipping {}", path.display());
                    return false;
                }
                if path.parent() == Some(output)
                    && !entry.file_type().is_dir()
                    && is_build_output(name, &entry.file_name().to_string_lossy(), &ArchiveFormat::EXTENSIONS)
                {
                    log::debug!("Skipping previous output {}", path.display());
                    return false;
                }
                !self.is_excluded(&to_archive_path(relative))
            });

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry?;
            let file_type = entry.file_type();
            if file_type.is_symlink() {
                log::warn!("Skipping symlink {}", entry.path().display());
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| Error::GenericError(e.to_string()))?;
            entries.push(ArchiveEntry {
                source: entry.path().to_path_buf(),
                name: format!("{name}/{}", to_archive_path(relative)),
                is_dir: file_type.is_dir(),
            });
        }

        Ok(entries)
    }

    /// Writes the archive to `destination`, blocking.
    fn write_archive(&self, name: &ModName, destination: &Path) -> Result<usize> {
        let source = self
            .source_dir
            .canonicalize()
            .fs_context("resolving mod source directory", &self.source_dir)?;
        if !source.is_dir() {
            bail!("Mod source is not a directory: {}", source.display());
        }

        let output = self
            .output_dir
            .canonicalize()
            .fs_context("resolving output directory", &self.output_dir)?;
        let mut skip = Vec::new();
        if output != source {
            skip.push(output.clone());
        }
        // A directory that does not exist yet has nothing to skip
        skip.extend(
            self.skip_dirs
                .iter()
                .filter_map(|dir| dir.canonicalize().ok())
                .filter(|dir| *dir != source),
        );

        let entries = self.collect_entries(&source, &skip, &output, name)?;
        if !entries.iter().any(|entry| !entry.is_dir) {
            bail!("No files to package in {}", source.display());
        }

        let file = File::create(destination).fs_context("creating archive", destination)?;
        let writer = BufWriter::new(file);
        match self.format {
            ArchiveFormat::Zip => write_zip(writer, name.as_str(), &entries)?,
            ArchiveFormat::TarGz => write_tar_gz(writer, name.as_str(), &entries)?,
        }

        Ok(entries.len())
    }
}

impl ModBuilder for ArchiveBuilder {
    async fn build(&self, name: &ModName, version: &ResolvedVersion) -> Result<PathBuf> {
        let extension = self.format.extension();
        let file_name = output_file_name(name, version.version(), extension);
        let final_path = output_path(&self.output_dir, name, version.version(), extension);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .fs_context("creating output directory", &self.output_dir)?;
        remove_previous_output(&final_path).await?;

        let staging = self
            .output_dir
            .join(format!(".{file_name}.{}.partial", uuid::Uuid::new_v4()));

        log::info!(
            "Packaging {} into {}",
            self.source_dir.display(),
            final_path.display()
        );

        let result = {
            let builder = self.clone();
            let name = name.clone();
            let staging = staging.clone();
            tokio::task::spawn_blocking(move || builder.write_archive(&name, &staging)).await?
        };

        let count = match result {
            Ok(count) => count,
            Err(e) => {
                match tokio::fs::remove_file(&staging).await {
                    Ok(()) => {}
                    Err(cleanup) if cleanup.kind() == io::ErrorKind::NotFound => {}
                    Err(cleanup) => {
                        log::warn!("Failed to remove {}: {}", staging.display(), cleanup)
                    }
                }
                return Err(e);
            }
        };

        tokio::fs::rename(&staging, &final_path)
            .await
            .fs_context("moving archive into place", &final_path)?;

        log::info!("Packaged {} entries into {}", count, final_path.display());
        Ok(final_path)
    }
}

fn to_archive_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Fixed timestamp and mode so entries do not depend on the checkout.
fn zip_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(mode)
}

fn write_zip<W: Write + io::Seek>(writer: W, prefix: &str, entries: &[ArchiveEntry]) -> Result<()> {
    let mut zip = ZipWriter::new(writer);

    zip.add_directory(format!("{prefix}/"), zip_options(0o755))?;
    for entry in entries {
        if entry.is_dir {
            zip.add_directory(format!("{}/", entry.name), zip_options(0o755))?;
        } else {
            zip.start_file(entry.name.as_str(), zip_options(0o644))?;
            let mut file = File::open(&entry.source).fs_context("reading mod file", &entry.source)?;
            io::copy(&mut file, &mut zip).fs_context("compressing mod file", &entry.source)?;
        }
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(())
}

fn write_tar_gz<W: Write>(writer: W, prefix: &str, entries: &[ArchiveEntry]) -> Result<()> {
    let mut tar = tar::Builder::new(GzEncoder::new(writer, Compression::default()));
    tar.mode(tar::HeaderMode::Deterministic);
    tar.follow_symlinks(false);

    let mut root = tar::Header::new_gnu();
    root.set_entry_type(tar::EntryType::Directory);
    root.set_mode(0o755);
    root.set_mtime(0);
    root.set_size(0);
    tar.append_data(&mut root, format!("{prefix}/"), io::empty())?;

    for entry in entries {
        if entry.is_dir {
            tar.append_dir(&entry.name, &entry.source)
                .fs_context("adding directory to archive", &entry.source)?;
        } else {
            tar.append_path_with_name(&entry.source, &entry.name)
                .fs_context("adding file to archive", &entry.source)?;
        }
    }

    let encoder = tar.into_inner()?;
    let mut writer = encoder.finish()?;
    writer.flush()?;
    Ok(())
}
