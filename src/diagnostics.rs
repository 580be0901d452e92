//! Startup self-check
//!
//! Verifies that the renderer can actually run on this host: the binary is
//! present and executable, answers `version`, the temp directory is usable
//! and a version request succeeds end to end through the render handler.

use std::path::{Path, PathBuf};

use crate::config::AppState;
use crate::http::RequestId;
use crate::render::RenderRequest;

/// Outcome of a single check
#[derive(Debug, Clone)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct DiagnosticsReport {
    pub checks: Vec<Check>,
}

impl DiagnosticsReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    fn record(&mut self, name: &'static str, result: Result<String, String>) {
        let check = match result {
            Ok(detail) => {
                tracing::info!(check = name, "✓ {detail}");
                Check {
                    name,
                    passed: true,
                    detail,
                }
            }
            Err(detail) => {
                tracing::error!(check = name, "✗ {detail}");
                Check {
                    name,
                    passed: false,
                    detail,
                }
            }
        };
        self.checks.push(check);
    }
}

pub async fn run(state: &AppState) -> DiagnosticsReport {
    let renderer_cfg = &state.config.renderer;
    tracing::info!("System info:");
    tracing::info!("- Platform: {}", std::env::consts::OS);
    tracing::info!("- Architecture: {}", std::env::consts::ARCH);
    tracing::info!("- Temp directory: {}", state.render.temp_dir().display());
    tracing::info!("Configuration:");
    tracing::info!("- Renderer binary: {}", renderer_cfg.binary);
    tracing::info!(
        "- Renderer binary path: {}",
        renderer_cfg.binary_path.as_deref().unwrap_or("(PATH)")
    );
    tracing::info!(
        "- Library path: {}",
        renderer_cfg.library_path.as_deref().unwrap_or("(unset)")
    );
    tracing::info!("- Assets: {}", state.render.assets().root().display());

    let mut report = DiagnosticsReport::default();

    report.record("renderer_executable", check_executable(&renderer_cfg.command()));

    report.record(
        "renderer_version",
        state
            .render
            .renderer()
            .version()
            .await
            .map(|v| format!("renderer answered: {v}"))
            .map_err(|e| e.to_string()),
    );

    report.record("temp_dir", check_temp_dir(state.render.temp_dir()).await);

    let request = RenderRequest::from_params(vec![("version".to_string(), "true".to_string())]);
    let response = state.render.handle(&request).await;
    let handler_result = if response.status.is_success() {
        Ok(format!("handler returned {}: {}", response.status, response.body))
    } else {
        Err(format!("handler returned {}: {}", response.status, response.body))
    };
    report.record("handler_version", handler_result);

    report
}

/// Locate the renderer and make sure it can be executed.
///
/// On Unix a binary missing its execute bits is chmodded to 755.
fn check_executable(command: &Path) -> Result<String, String> {
    let path = resolve_command(command)
        .ok_or_else(|| format!("{} not found", command.display()))?;
    let metadata =
        std::fs::metadata(&path).map_err(|e| format!("{}: {e}", path.display()))?;
    if !metadata.is_file() {
        return Err(format!("{} is not a file", path.display()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if metadata.permissions().mode() & 0o111 == 0 {
            tracing::warn!("{} is NOT executable, attempting to make it executable", path.display());
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .map_err(|e| format!("failed to make {} executable: {e}", path.display()))?;
            return Ok(format!("{} made executable", path.display()));
        }
    }

    Ok(format!("{} is executable", path.display()))
}

/// Bare names are looked up on `PATH`, anything with a directory is used as is
fn resolve_command(command: &Path) -> Option<PathBuf> {
    if command.components().count() > 1 {
        return command.exists().then(|| command.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}

async fn check_temp_dir(dir: &Path) -> Result<String, String> {
    let probe = dir.join(format!("axilla-diagnostics-{}.txt", RequestId::new()));
    let describe = |step: &str, e: std::io::Error| {
        format!("{step} {}: {e}", probe.display())
    };

    tokio::fs::write(&probe, "test content")
        .await
        .map_err(|e| describe("write", e))?;
    let read = tokio::fs::read_to_string(&probe)
        .await
        .map_err(|e| describe("read", e))?;
    tokio::fs::remove_file(&probe)
        .await
        .map_err(|e| describe("delete", e))?;

    if read == "test content" {
        Ok(format!("write/read/delete in {} succeeded", dir.display()))
    } else {
        Err(format!("read back unexpected content from {}", probe.display()))
    }
}
