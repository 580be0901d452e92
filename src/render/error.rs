//! Render request failures
//!
//! Each variant maps to the status code and plain-text body returned to the
//! client. Nothing here is propagated past the request boundary.

use hyper::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

use super::fetch::FetchError;
use super::renderer::RendererError;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Error: Could not get version info. {0}")]
    Version(#[source] RendererError),

    /// Upstream returned a non-success status; the status is proxied
    #[error("Error: Could not fetch applet. {reason}")]
    FetchStatus { status: u16, reason: String },

    #[error("Error: Could not download applet. {0}")]
    Download(#[source] FetchError),

    #[error("Error: Could not download applet. {0}")]
    StoreApplet(#[source] std::io::Error),

    #[error("Error: Failed to generate image with Pixlet. {} {source}", applet_hint(.remote_applet))]
    Render {
        #[source]
        source: RendererError,
        remote_applet: bool,
    },

    #[error("Error: Could not read output file. {source} {}", .path.display())]
    ReadOutput {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("Error: Could not read output image.")]
    EmptyOutput,

    #[error("Error: Could not generate html. {0}")]
    Template(#[source] std::io::Error),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn applet_hint(remote_applet: &bool) -> &'static str {
    if *remote_applet {
        "Ensure the provided applet is valid."
    } else {
        ""
    }
}

impl RenderError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::FetchStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FetchError> for RenderError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status { status, reason } => Self::FetchStatus { status, reason },
            other => Self::Download(other),
        }
    }
}
