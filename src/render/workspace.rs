//! Per-request temporary files
//!
//! Every render gets its own input and output paths named by a freshly
//! generated ULID. The client supplied request id is never used here, so
//! concurrent renders cannot share files.

use std::path::{Path, PathBuf};

use ulid::Ulid;

use super::params::OutputFormat;

#[derive(Debug, Clone)]
pub struct Workspace {
    input: PathBuf,
    output: PathBuf,
}

impl Workspace {
    pub fn new(temp_dir: &Path, format: OutputFormat) -> Self {
        let id = Ulid::new();
        Self {
            input: temp_dir.join(format!("axilla-{id}-input.star")),
            output: temp_dir.join(format!("axilla-{id}-output.{format}")),
        }
    }

    /// Where a downloaded applet is written
    pub fn input_path(&self) -> &Path {
        &self.input
    }

    /// Where the renderer writes the image
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Remove both files. Missing files and I/O errors are ignored.
    pub async fn cleanup(&self) {
        for path in [&self.input, &self.output] {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), error = %e, "temp file cleanup failed");
                }
            }
        }
    }
}
