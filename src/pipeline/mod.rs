//! Release pipeline: resolve, build, checksum, publish.
//!
//! One run walks the stages strictly in order:
//!
//! ```text
//! Init -> TagResolved -> Built -> Checksummed -> Published
//!   \________\______________\________\___________-> Failed
//! ```
//!
//! Any stage failure ends the run in [`Stage::Failed`]. Nothing is rolled
//! back: assets published by an earlier run stay attached and a re-run for
//! the same tag replaces them.

use crate::bundler::{ModBuilder, ModName};
use crate::checksum::{self, ChecksumSidecar};
use crate::cli::RuntimeConfig;
use crate::error::{ReleaseError, Result};
use crate::publish::{self, PublishOutcome, Publisher, ReleaseHost, ReleaseNotes, ReleaseRequest};
use crate::version::{ResolvedVersion, resolve_version};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing done yet
    Init,
    /// Version derived from the tag
    TagResolved,
    /// Build output exists
    Built,
    /// Sidecar written
    Checksummed,
    /// Artifacts attached to the release
    Published,
    /// A stage failed
    Failed,
}

impl Stage {
    /// The stage that follows on success.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::TagResolved),
            Self::TagResolved => Some(Self::Built),
            Self::Built => Some(Self::Checksummed),
            Self::Checksummed => Some(Self::Published),
            Self::Published | Self::Failed => None,
        }
    }

    /// Whether the run is over.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::TagResolved => "tag-resolved",
            Self::Built => "built",
            Self::Checksummed => "checksummed",
            Self::Published => "published",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Resolved version
    pub version: ResolvedVersion,
    /// Build output
    pub output: PathBuf,
    /// Checksum sidecar
    pub sidecar: ChecksumSidecar,
    /// Publish result
    pub publish: PublishOutcome,
    /// Stages visited, in order
    pub stages: Vec<Stage>,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
}

/// One release run.
pub struct Pipeline<B, H> {
    name: ModName,
    tag: String,
    notes: ReleaseNotes,
    builder: B,
    publisher: Publisher<H>,
    stages: Vec<Stage>,
}

impl<B: ModBuilder, H: ReleaseHost> Pipeline<B, H> {
    /// Creates a pipeline for `tag`.
    pub fn new(name: ModName, tag: String, notes: ReleaseNotes, builder: B, host: H) -> Self {
        Self {
            name,
            tag,
            notes,
            builder,
            publisher: Publisher::new(host),
            stages: vec![Stage::Init],
        }
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Init)
    }

    /// Stages visited so far.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The release host.
    pub fn host(&self) -> &H {
        self.publisher.host()
    }

    fn advance(&mut self, to: Stage) {
        let from = self.stage();
        debug_assert!(
            from.next() == Some(to) || (to == Stage::Failed && !from.is_terminal()),
            "illegal transition {from} -> {to}"
        );
        log::debug!("Pipeline stage {} -> {}", from, to);
        self.stages.push(to);
    }

    /// Runs every stage. On error the pipeline is left in [`Stage::Failed`].
    ///
    /// Each call is a fresh run starting from [`Stage::Init`].
    pub async fn run(&mut self, runtime: &RuntimeConfig) -> Result<RunReport> {
        self.stages = vec![Stage::Init];
        let started_at = Utc::now();
        match self.execute(runtime, started_at).await {
            Ok(report) => Ok(report),
            Err(e) => {
                log::error!("Release run for '{}' failed at {}: {}", self.tag, self.stage(), e);
                self.advance(Stage::Failed);
                Err(e)
            }
        }
    }

    async fn execute(&mut self, runtime: &RuntimeConfig, started_at: DateTime<Utc>) -> Result<RunReport> {
        runtime.progress(&format!("Resolving version from tag '{}'", self.tag))?;
        let version = resolve_version(&self.tag)?;
        self.advance(Stage::TagResolved);
        runtime.verbose_println(&format!("Version {}", version))?;

        runtime.progress(&format!("Building {} {}", self.name, version))?;
        let output = self
            .builder
            .build(&self.name, &version)
            .await
            .map_err(|source| ReleaseError::BuildFailed {
                stage: "build",
                source,
            })?;
        self.advance(Stage::Built);
        runtime.verbose_println(&format!("Built {}", output.display()))?;

        runtime.progress("Computing SHA-256 checksum")?;
        let sidecar = checksum::write_sidecar(&output).await?;
        self.advance(Stage::Checksummed);
        runtime.verbose_println(&format!("{}  {}", sidecar.digest, sidecar.path.display()))?;

        runtime.progress(&format!("Publishing release {}", version.tag()))?;
        verify_before_publish(&sidecar).await?;

        let (title, body) = self
            .notes
            .render(self.name.as_str(), version.version(), version.tag())
            .map_err(publish_failed)?;
        let request = ReleaseRequest::new(
            version.tag(),
            title,
            body,
            vec![output.clone(), sidecar.path.clone()],
        );
        let outcome = self.publisher.publish(&request).await.map_err(publish_failed)?;
        self.advance(Stage::Published);

        Ok(RunReport {
            version,
            output,
            sidecar,
            publish: outcome,
            stages: self.stages.clone(),
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Checks that the output still matches its sidecar. Failures belong to the
/// publish stage.
async fn verify_before_publish(sidecar: &ChecksumSidecar) -> Result<()> {
    let verified = checksum::verify_sidecar(&sidecar.path).await.map_err(|e| match e {
        ReleaseError::FileNotFound { path, .. } => ReleaseError::FileNotFound {
            stage: "publish",
            path,
        },
        other => other,
    })?;
    if !verified {
        return Err(publish_failed(publish::Error::ChecksumMismatch {
            path: sidecar.path.clone(),
        }));
    }
    Ok(())
}

fn publish_failed(source: publish::Error) -> ReleaseError {
    ReleaseError::PublishFailed {
        stage: "publish",
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{self, output_path};
    use crate::publish::DirectoryHost;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes a fixed payload to the contract path.
    struct StubBuilder {
        output_dir: PathBuf,
        calls: AtomicUsize,
    }

    impl ModBuilder for StubBuilder {
        async fn build(&self, name: &ModName, version: &ResolvedVersion) -> bundler::Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let path = output_path(&self.output_dir, name, version.version(), "zip");
            tokio::fs::create_dir_all(&self.output_dir).await?;
            tokio::fs::write(&path, format!("{name} {version}")).await?;
            Ok(path)
        }
    }

    /// Fails like a broken build tool.
    struct FailingBuilder;

    impl ModBuilder for FailingBuilder {
        async fn build(&self, _name: &ModName, _version: &ResolvedVersion) -> bundler::Result<PathBuf> {
            Err(bundler::Error::CommandExit {
                command: "build-mod".to_string(),
                status: "exit status: 2".to_string(),
                stderr: "locale file missing".to_string(),
            })
        }
    }

    /// Reports success without writing anything.
    struct LyingBuilder(PathBuf);

    impl ModBuilder for LyingBuilder {
        async fn build(&self, _name: &ModName, _version: &ResolvedVersion) -> bundler::Result<PathBuf> {
            Ok(self.0.clone())
        }
    }

    fn runtime() -> RuntimeConfig {
        RuntimeConfig::quiet()
    }

    fn pipeline<B: ModBuilder>(tag: &str, builder: B, releases: &Path) -> Pipeline<B, DirectoryHost> {
        Pipeline::new(
            ModName::new("example-mod").unwrap(),
            tag.to_string(),
            ReleaseNotes::default(),
            builder,
            DirectoryHost::new(releases.to_path_buf()),
        )
    }

    #[tokio::test]
    async fn full_run_publishes_archive_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let builder = StubBuilder {
            output_dir: dir.path().join("output"),
            calls: AtomicUsize::new(0),
        };
        let mut pipeline = pipeline("v2.0.0", builder, &dir.path().join("releases"));

        let report = pipeline.run(&runtime()).await.unwrap();

        assert_eq!(report.version.version(), "2.0.0");
        assert_eq!(report.output, dir.path().join("output/example-mod-2.0.0.zip"));
        assert_eq!(report.sidecar.path, dir.path().join("output/example-mod-2.0.0.zip.sha256sum"));
        let line = std::fs::read_to_string(&report.sidecar.path).unwrap();
        let (digest, file) = checksum::parse_sidecar_line(&line).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(file, "example-mod-2.0.0.zip");

        assert_eq!(
            report.stages,
            [Stage::Init, Stage::TagResolved, Stage::Built, Stage::Checksummed, Stage::Published]
        );
        assert!(report.publish.created);
        assert_eq!(report.publish.release.name.as_deref(), Some("example-mod 2.0.0"));
        assert_eq!(report.publish.release.assets.len(), 2);
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn empty_tag_fails_before_building() {
        let dir = tempfile::tempdir().unwrap();
        let builder = StubBuilder {
            output_dir: dir.path().join("output"),
            calls: AtomicUsize::new(0),
        };
        let mut pipeline = pipeline("", builder, &dir.path().join("releases"));

        let err = pipeline.run(&runtime()).await.unwrap_err();

        assert!(matches!(err, ReleaseError::InvalidTagFormat { .. }));
        assert_eq!(pipeline.stages(), [Stage::Init, Stage::Failed]);
        assert_eq!(pipeline.builder.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("output").exists());
    }

    #[tokio::test]
    async fn build_failure_skips_checksum_and_publish() {
        let dir = tempfile::tempdir().unwrap();
        let releases = dir.path().join("releases");
        let mut pipeline = pipeline("v1.0.0", FailingBuilder, &releases);

        let err = pipeline.run(&runtime()).await.unwrap_err();

        match &err {
            ReleaseError::BuildFailed { stage, source } => {
                assert_eq!(*stage, "build");
                assert!(source.to_string().contains("locale file missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(pipeline.stages(), [Stage::Init, Stage::TagResolved, Stage::Failed]);
        assert!(pipeline.host().find_release("v1.0.0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_output_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(
            "v1.0.0",
            LyingBuilder(dir.path().join("output/example-mod-1.0.0.zip")),
            &dir.path().join("releases"),
        );

        let err = pipeline.run(&runtime()).await.unwrap_err();

        assert!(matches!(err, ReleaseError::FileNotFound { .. }));
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert!(pipeline.host().find_release("v1.0.0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rerun_for_same_tag_keeps_one_copy_of_each_asset() {
        let dir = tempfile::tempdir().unwrap();
        let releases = dir.path().join("releases");
        for _ in 0..2 {
            let builder = StubBuilder {
                output_dir: dir.path().join("output"),
                calls: AtomicUsize::new(0),
            };
            pipeline("v2.0.0", builder, &releases).run(&runtime()).await.unwrap();
        }

        let host = DirectoryHost::new(releases);
        let release = host.find_release("v2.0.0").await.unwrap().unwrap();
        let mut names: Vec<_> = release.assets.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, ["example-mod-2.0.0.zip", "example-mod-2.0.0.zip.sha256sum"]);
    }

    #[tokio::test]
    async fn pipeline_can_run_again() {
        let dir = tempfile::tempdir().unwrap();
        let builder = StubBuilder {
            output_dir: dir.path().join("output"),
            calls: AtomicUsize::new(0),
        };
        let mut pipeline = pipeline("v2.0.0", builder, &dir.path().join("releases"));

        pipeline.run(&runtime()).await.unwrap();
        let second = pipeline.run(&runtime()).await.unwrap();

        assert_eq!(
            second.stages,
            [Stage::Init, Stage::TagResolved, Stage::Built, Stage::Checksummed, Stage::Published]
        );
        assert!(!second.publish.created);
    }

    #[tokio::test]
    async fn output_removed_after_checksum_fails_in_publish_stage() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("example-mod-1.0.0.zip");
        std::fs::write(&output, "build").unwrap();
        let sidecar = checksum::write_sidecar(&output).await.unwrap();
        std::fs::remove_file(&output).unwrap();

        match verify_before_publish(&sidecar).await.unwrap_err() {
            ReleaseError::FileNotFound { stage, path } => {
                assert_eq!(stage, "publish");
                assert_eq!(path, output);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn output_changed_after_checksum_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("example-mod-1.0.0.zip");
        std::fs::write(&output, "build").unwrap();
        let sidecar = checksum::write_sidecar(&output).await.unwrap();
        std::fs::write(&output, "tampered").unwrap();

        let err = verify_before_publish(&sidecar).await.unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::PublishFailed {
                source: publish::Error::ChecksumMismatch { .. },
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn leftover_output_is_not_published_when_build_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("output");
        std::fs::create_dir_all(&output_dir).unwrap();
        std::fs::write(output_dir.join("example-mod-1.0.0.zip"), "from an earlier run").unwrap();

        let builder = bundler::CommandBuilder::new(
            "true".to_string(),
            Vec::new(),
            dir.path().to_path_buf(),
            output_dir,
            "zip".to_string(),
        );
        let mut pipeline = pipeline("v1.0.0", builder, &dir.path().join("releases"));

        let err = pipeline.run(&runtime()).await.unwrap_err();
        assert!(matches!(err, ReleaseError::FileNotFound { stage: "checksum", .. }), "{err:?}");
        assert!(pipeline.host().find_release("v1.0.0").await.unwrap().is_none());
    }

    #[test]
    fn stage_order_is_linear() {
        let mut stage = Stage::Init;
        let mut visited = vec![stage];
        while let Some(next) = stage.next() {
            visited.push(next);
            stage = next;
        }
        assert_eq!(
            visited,
            [Stage::Init, Stage::TagResolved, Stage::Built, Stage::Checksummed, Stage::Published]
        );
        assert!(Stage::Failed.is_terminal());
        assert!(Stage::Published.is_terminal());
    }
}
