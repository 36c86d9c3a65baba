//! Command line argument parsing.
//!
//! Every input has a flag; CI-provided values also fall back to the
//! environment variables GitHub Actions sets, so a workflow step only needs
//! `--name`.

use clap::Parser;
use std::path::PathBuf;

/// Tag-driven mod packaging and release publishing
#[derive(Parser, Debug, Default)]
#[command(
    name = "kodegen_bundler_modpack",
    version,
    about = "Package a mod for a version tag, checksum it and publish a release",
    long_about = "Resolves the version from a v* tag, packages the mod into \
output/<name>-<version>.<ext>, writes a .sha256sum sidecar next to it and \
attaches both to the release for the tag, creating the release if needed.

Usage:
  kodegen_bundler_modpack --tag v1.2.3 --name example-mod --repository owner/repo
  kodegen_bundler_modpack --tag v1.2.3 --name example-mod --publish-dir ./releases
  kodegen_bundler_modpack --name example-mod --build-command make --build-arg package

Exit code 0 = archive and checksum are attached to the release."
)]
pub struct Args {
    /// Version tag (e.g. v1.2.3) or full ref (refs/tags/v1.2.3)
    #[arg(short, long, env = "GITHUB_REF_NAME", value_name = "TAG")]
    pub tag: Option<String>,

    /// Full git ref, used when --tag is not given
    #[arg(long = "ref", env = "GITHUB_REF", value_name = "REF", hide = true)]
    pub git_ref: Option<String>,

    /// Mod name, used in the output file name
    #[arg(short, long, env = "MOD_NAME", value_name = "NAME")]
    pub name: Option<String>,

    /// Mod source directory [default: .]
    #[arg(short, long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Output directory for the archive and checksum [default: output]
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Archive format: zip or tar.gz [default: zip]
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Glob pattern excluded from the archive (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "GLOB")]
    pub excludes: Vec<String>,

    /// External build command instead of the built-in archiver
    #[arg(long, value_name = "PROGRAM")]
    pub build_command: Option<String>,

    /// Argument for --build-command (repeatable)
    #[arg(long = "build-arg", value_name = "ARG", requires = "build_command", allow_hyphen_values = true)]
    pub build_args: Vec<String>,

    /// GitHub repository (owner/repo)
    #[arg(short, long, env = "GITHUB_REPOSITORY", value_name = "OWNER/REPO")]
    pub repository: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// GitHub token with contents:write permission
    #[arg(long, env = "GITHUB_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Publish into a local directory instead of GitHub
    #[arg(long, value_name = "DIR")]
    pub publish_dir: Option<PathBuf>,

    /// Configuration file [default: modpack.toml when present]
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show build output paths and digests
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Tag from `--tag`, falling back to `--ref`
    pub fn raw_tag(&self) -> String {
        self.tag
            .clone()
            .filter(|tag| !tag.is_empty())
            .or_else(|| self.git_ref.clone())
            .unwrap_or_default()
    }
}

/// Output settings derived from the arguments.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}

impl RuntimeConfig {
    /// Runtime config that prints nothing but errors.
    pub fn quiet() -> Self {
        Self {
            output: super::OutputManager::new(false, true),
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print verbose message if in verbose mode
    pub fn verbose_println(&self, message: &str) -> std::io::Result<()> {
        self.output.verbose(message)
    }

    /// Print warning message if not in quiet mode
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.output.warn(message)
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.output.progress(message)
    }
}
