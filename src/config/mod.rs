//! Run configuration.
//!
//! All inputs of a run are collected into one [`Config`] value up front:
//! command line flags win over environment variables (handled by clap),
//! which win over the optional TOML file, which wins over defaults. Nothing
//! downstream reads the environment.
//!
//! Example `modpack.toml`:
//!
//! ```toml
//! name = "example-mod"
//! source = "src"
//! format = "zip"
//! exclude = [".git", "*.xcf"]
//!
//! [release]
//! repository = "owner/example-mod"
//! title = "{{name}} {{version}}"
//! ```

use crate::bundler::{ArchiveBuilder, ArchiveFormat, BuildBackend, CommandBuilder, ModName};
use crate::cli::Args;
use crate::error::ConfigError;
use crate::publish::{
    DEFAULT_API_URL, DEFAULT_BODY_TEMPLATE, DEFAULT_TITLE_TEMPLATE, DirectoryHost, GitHubHost,
    HostBackend, ReleaseNotes,
};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "modpack.toml";

const DEFAULT_OUTPUT_DIR: &str = "output";

type Result<T> = std::result::Result<T, ConfigError>;

/// Contents of the TOML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Mod name
    pub name: Option<String>,
    /// Mod source directory
    pub source: Option<PathBuf>,
    /// Output directory
    pub output_dir: Option<PathBuf>,
    /// Archive format
    pub format: Option<ArchiveFormat>,
    /// Exclude globs
    #[serde(default)]
    pub exclude: Vec<String>,
    /// External build command
    pub build: Option<BuildSection>,
    /// Release settings
    #[serde(default)]
    pub release: ReleaseSection,
}

/// `[build]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Program to run
    pub command: String,
    /// Arguments
    #[serde(default)]
    pub args: Vec<String>,
}

/// `[release]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseSection {
    /// `owner/repo`
    pub repository: Option<String>,
    /// API base URL
    pub api_url: Option<String>,
    /// Local publish directory
    pub directory: Option<PathBuf>,
    /// Title template for new releases
    pub title: Option<String>,
    /// Body template for new releases
    pub body: Option<String>,
}

impl FileConfig {
    /// Reads and parses a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Where the release is published.
#[derive(Clone)]
pub enum PublishTarget {
    /// GitHub Releases
    GitHub {
        /// API base URL
        api_url: String,
        /// `owner/repo`
        repository: String,
        /// Credential
        token: String,
    },
    /// Local directory
    Directory(PathBuf),
}

impl fmt::Debug for PublishTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GitHub {
                api_url,
                repository,
                ..
            } => f
                .debug_struct("GitHub")
                .field("api_url", api_url)
                .field("repository", repository)
                .field("token", &"<redacted>")
                .finish(),
            Self::Directory(path) => f.debug_tuple("Directory").field(path).finish(),
        }
    }
}

/// External build command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    /// Program
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
}

/// Complete configuration of one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Raw tag or ref, resolved by the pipeline
    pub tag: String,
    /// Mod name
    pub name: ModName,
    /// Mod source directory (absolute)
    pub source_dir: PathBuf,
    /// Output directory (absolute)
    pub output_dir: PathBuf,
    /// Archive format / output extension
    pub format: ArchiveFormat,
    /// Exclude globs for the built-in archiver
    pub excludes: Vec<String>,
    /// External build command, replacing the built-in archiver
    pub build_command: Option<BuildCommand>,
    /// Release destination
    pub publish: PublishTarget,
    /// Release title/body templates
    pub notes: ReleaseNotes,
}

impl Config {
    /// Builds the configuration from parsed arguments, loading the config
    /// file named by `--config` or `modpack.toml` from `cwd` when present.
    pub fn load(args: &Args, cwd: &Path) -> Result<Self> {
        let file = match &args.config {
            Some(path) => {
                let path = absolutize(cwd, path);
                log::debug!("Loading config from {}", path.display());
                FileConfig::load(&path)?
            }
            None => {
                let default = cwd.join(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    log::debug!("Loading config from {}", default.display());
                    FileConfig::load(&default)?
                } else {
                    FileConfig::default()
                }
            }
        };
        Self::from_sources(args, file, cwd)
    }

    /// Merges arguments over a parsed config file.
    pub fn from_sources(args: &Args, file: FileConfig, cwd: &Path) -> Result<Self> {
        let name = args
            .name
            .clone()
            .or(file.name)
            .ok_or_else(|| ConfigError::MissingArgument {
                argument: "--name (or MOD_NAME, or `name` in the config file)".to_string(),
            })?;
        let name = ModName::new(name).map_err(|e| ConfigError::InvalidArguments {
            reason: e.to_string(),
        })?;

        let format = match &args.format {
            Some(format) => format
                .parse::<ArchiveFormat>()
                .map_err(|reason| ConfigError::InvalidArguments { reason })?,
            None => file.format.unwrap_or_default(),
        };

        let source_dir = absolutize(cwd, &args.source.clone().or(file.source).unwrap_or_else(|| PathBuf::from(".")));
        let output_dir = absolutize(
            cwd,
            &args
                .output_dir
                .clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        );

        let mut excludes = file.exclude;
        excludes.extend(args.excludes.iter().cloned());

        let build_command = match (&args.build_command, file.build) {
            (Some(program), _) => Some(BuildCommand {
                program: program.clone(),
                args: args.build_args.clone(),
            }),
            (None, Some(section)) => Some(BuildCommand {
                program: section.command,
                args: section.args,
            }),
            (None, None) => None,
        };
        if build_command.as_ref().is_some_and(|c| c.program.trim().is_empty()) {
            return Err(ConfigError::InvalidArguments {
                reason: "build command is empty".to_string(),
            });
        }

        let release = file.release;
        let publish = match args.publish_dir.clone().or(release.directory) {
            Some(dir) => PublishTarget::Directory(absolutize(cwd, &dir)),
            None => {
                let repository = args.repository.clone().or(release.repository).ok_or_else(|| {
                    ConfigError::MissingArgument {
                        argument: "--repository (or GITHUB_REPOSITORY), or --publish-dir".to_string(),
                    }
                })?;
                let token = args
                    .token
                    .clone()
                    .filter(|token| !token.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingArgument {
                        argument: "--token (or GITHUB_TOKEN)".to_string(),
                    })?;
                let api_url = args
                    .api_url
                    .clone()
                    .or(release.api_url)
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string());
                url::Url::parse(&api_url).map_err(|e| ConfigError::InvalidArguments {
                    reason: format!("invalid API URL '{api_url}': {e}"),
                })?;
                PublishTarget::GitHub {
                    api_url,
                    repository,
                    token,
                }
            }
        };

        let notes = ReleaseNotes::new(
            release.title.unwrap_or_else(|| DEFAULT_TITLE_TEMPLATE.to_string()),
            release.body.unwrap_or_else(|| DEFAULT_BODY_TEMPLATE.to_string()),
        );

        Ok(Self {
            tag: args.raw_tag(),
            name,
            source_dir,
            output_dir,
            format,
            excludes,
            build_command,
            publish,
            notes,
        })
    }

    /// Build backend selected by this configuration.
    pub fn build_backend(&self) -> Result<BuildBackend> {
        match &self.build_command {
            Some(command) => Ok(BuildBackend::Command(CommandBuilder::new(
                command.program.clone(),
                command.args.clone(),
                self.source_dir.clone(),
                self.output_dir.clone(),
                self.format.extension().to_string(),
            ))),
            None => {
                let builder = ArchiveBuilder::new(
                    self.source_dir.clone(),
                    self.output_dir.clone(),
                    self.format,
                    &self.excludes,
                )
                .map_err(|e| ConfigError::InvalidArguments {
                    reason: e.to_string(),
                })?;
                // Published copies must not end up in the next archive
                let builder = match &self.publish {
                    PublishTarget::Directory(dir) => builder.skip_dir(dir.clone()),
                    PublishTarget::GitHub { .. } => builder,
                };
                Ok(BuildBackend::Archive(builder))
            }
        }
    }

    /// Release host selected by this configuration.
    pub fn release_host(&self) -> Result<HostBackend> {
        match &self.publish {
            PublishTarget::Directory(dir) => Ok(HostBackend::Directory(DirectoryHost::new(dir.clone()))),
            PublishTarget::GitHub {
                api_url,
                repository,
                token,
            } => GitHubHost::new(api_url, repository, token.clone())
                .map(HostBackend::GitHub)
                .map_err(|e| ConfigError::InvalidArguments {
                    reason: e.to_string(),
                }),
        }
    }
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
