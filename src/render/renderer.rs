//! External renderer process adapter
//!
//! Runs the Pixlet binary (or any command honouring the same contract) as a
//! child process and captures its output.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

use crate::config::RendererConfig;

/// Captured output of a successful renderer run
#[derive(Debug, Clone, Default)]
pub struct RendererOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("spawn {command} failed: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit, message mirrors the command line plus stderr
    #[error("Command failed: {command_line}\n{stderr}")]
    Failed {
        command_line: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl RendererError {
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Failed { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }
}

/// Something that can execute renderer command lines
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<RendererOutput, RendererError>;

    /// `<renderer> version`, trimmed
    async fn version(&self) -> Result<String, RendererError> {
        let output = self.run(&["version".to_string()]).await?;
        Ok(output.stdout.trim().to_string())
    }
}

/// Renderer backed by the Pixlet command-line tool
#[derive(Debug, Clone)]
pub struct PixletRenderer {
    command: PathBuf,
    library_path: Option<OsString>,
    assets_dir: PathBuf,
}

impl PixletRenderer {
    pub fn new(config: &RendererConfig, assets_dir: PathBuf) -> Self {
        Self {
            command: config.command(),
            library_path: config
                .library_path
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(OsString::from),
            assets_dir,
        }
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Working directory for the child: the parent of the asset root
    fn working_dir(&self) -> &Path {
        self.assets_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn build_command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(args)
            .env("PIXLET_ROOT_DIR", &self.assets_dir)
            .current_dir(self.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(lib) = &self.library_path {
            cmd.env("LD_LIBRARY_PATH", lib);
        }
        cmd
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut line = self.command.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[async_trait]
impl Renderer for PixletRenderer {
    async fn run(&self, args: &[String]) -> Result<RendererOutput, RendererError> {
        let command_line = self.command_line(args);
        tracing::debug!(command = %command_line, "executing renderer");

        let output = self
            .build_command(args)
            .output()
            .await
            .map_err(|source| RendererError::Spawn {
                command: self.command.display().to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(RendererOutput { stdout, stderr })
        } else {
            Err(RendererError::Failed {
                command_line,
                code: output.status.code(),
                stderr,
            })
        }
    }
}
