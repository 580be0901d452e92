//! Static file serving module
//!
//! Serves files from the configured static directory for every path other
//! than the render route.

use crate::handler::router::RequestContext;
use crate::http::{self, mime};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Serve static files from a directory
pub async fn serve_directory(
    ctx: &RequestContext<'_>,
    dir: &str,
    index_files: &[String],
) -> Response<Full<Bytes>> {
    match load_from_directory(Path::new(dir), ctx.path, index_files).await {
        Some((content, content_type)) => http::build_file_response(content, content_type, ctx.is_head),
        None => http::build_404_response(),
    }
}

/// Load a file from `static_dir`, falling back to index files for directories
pub async fn load_from_directory(
    static_dir: &Path,
    path: &str,
    index_files: &[String],
) -> Option<(Vec<u8>, &'static str)> {
    let relative_path = path.trim_start_matches('/');

    let static_dir_canonical = match fs::canonicalize(static_dir).await {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(dir = %static_dir.display(), error = %e, "static directory unavailable");
            return None;
        }
    };

    let mut file_path = static_dir_canonical.join(relative_path);
    if fs::metadata(&file_path).await.is_ok_and(|m| m.is_dir()) {
        file_path = find_index_file(&file_path, index_files).await?;
    }

    // File not found is common (404), no need to log at warning level
    let file_path_canonical = fs::canonicalize(&file_path).await.ok()?;
    if !file_path_canonical.starts_with(&static_dir_canonical) {
        tracing::warn!(
            requested = %path,
            resolved = %file_path_canonical.display(),
            "path traversal attempt blocked"
        );
        return None;
    }

    let content = match fs::read(&file_path_canonical).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(file = %file_path_canonical.display(), error = %e, "failed to read static file");
            return None;
        }
    };

    Some((content, mime::content_type_for(&file_path_canonical)))
}

async fn find_index_file(dir: &Path, index_files: &[String]) -> Option<PathBuf> {
    for index_file in index_files {
        let candidate = dir.join(index_file);
        if fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
            return Some(candidate);
        }
    }
    None
}
