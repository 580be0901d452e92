// Application state module
// Built once at startup and shared by every connection

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::types::Config;
use super::ConfigError;
use crate::render::{AssetPaths, HttpFetcher, PixletRenderer, RenderService};

/// Application state
pub struct AppState {
    pub config: Config,
    pub render: RenderService,
}

impl AppState {
    /// Wire the production renderer and fetcher from configuration
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let assets_dir = absolute(Path::new(&config.renderer.assets_dir));
        let renderer = PixletRenderer::new(&config.renderer, assets_dir.clone());
        let fetcher = HttpFetcher::new(&config.fetch)?;
        let render = RenderService::new(
            Arc::new(renderer),
            Arc::new(fetcher),
            AssetPaths::new(assets_dir),
            config.renderer.temp_dir(),
        );
        Ok(Self::with_service(config, render))
    }

    pub const fn with_service(config: Config, render: RenderService) -> Self {
        Self { config, render }
    }
}

/// The renderer's working directory is derived from the asset root, so it
/// must not be relative to whatever the child ends up running in.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
