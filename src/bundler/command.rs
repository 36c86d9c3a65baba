//! External build command backend.
//!
//! Runs a user-supplied build tool that is expected to write the mod archive
//! to `$MOD_OUTPUT_FILE`. The tool is opaque: only its exit status and stderr
//! are interpreted.

use super::{
    Error, ModBuilder, ModName, Result,
    error::ErrorExt,
    naming::{output_path, remove_previous_output},
};
use crate::version::ResolvedVersion;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Number of stderr lines kept for the failure report.
const STDERR_TAIL_LINES: usize = 40;

/// Builds the mod by running an external command.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    output_dir: PathBuf,
    extension: String,
}

impl CommandBuilder {
    /// Creates a command builder.
    ///
    /// # Arguments
    ///
    /// * `program` - Executable name or path, resolved on `PATH`
    /// * `args` - Arguments passed verbatim
    /// * `working_dir` - Directory the command runs in
    /// * `output_dir` - Directory the command must write its output to
    /// * `extension` - Extension of the file the command produces
    pub fn new(
        program: String,
        args: Vec<String>,
        working_dir: PathBuf,
        output_dir: PathBuf,
        extension: String,
    ) -> Self {
        Self {
            program,
            args,
            working_dir,
            output_dir,
            extension,
        }
    }

    fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ModBuilder for CommandBuilder {
    async fn build(&self, name: &ModName, version: &ResolvedVersion) -> Result<PathBuf> {
        let program = which::which(&self.program).map_err(|e| Error::ToolNotFound {
            tool: self.program.clone(),
            reason: e.to_string(),
        })?;
        log::debug!("Resolved build tool {} to {}", self.program, program.display());

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .fs_context("creating output directory", &self.output_dir)?;

        let output_file = output_path(&self.output_dir, name, version.version(), &self.extension);
        remove_previous_output(&output_file).await?;

        let command = self.display_command();
        log::info!("Running build command: {}", command);

        let mut child = Command::new(&program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env("MOD_NAME", name.as_str())
            .env("MOD_VERSION", version.version())
            .env("MOD_OUTPUT_DIR", &self.output_dir)
            .env("MOD_OUTPUT_FILE", &output_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| Error::CommandFailed {
                command: command.clone(),
                error,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain both pipes before waiting so the child never blocks on a full pipe
        let (_, stderr_lines) = tokio::join!(
            async {
                if let Some(stdout) = stdout {
                    let mut lines = BufReader::new(stdout).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        log::info!("[build] {}", line);
                    }
                }
            },
            async {
                let mut captured = Vec::new();
                if let Some(stderr) = stderr {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        log::warn!("[build] {}", line);
                        captured.push(line);
                    }
                }
                captured
            }
        );

        let status = child.wait().await.map_err(|error| Error::CommandFailed {
            command: command.clone(),
            error,
        })?;

        if !status.success() {
            let skip = stderr_lines.len().saturating_sub(STDERR_TAIL_LINES);
            return Err(Error::CommandExit {
                command,
                status: status.to_string(),
                stderr: stderr_lines[skip..].join("\n"),
            });
        }

        log::info!("Build command finished, expecting {}", output_file.display());
        Ok(output_file)
    }
}
