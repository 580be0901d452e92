//! Render request handling
//!
//! Resolves the applet to render, optionally downloads it, runs the external
//! renderer and shapes the result as HTML, raw image bytes or base64 text.

pub mod error;
pub mod fetch;
pub mod params;
pub mod renderer;
pub mod response;
pub mod template;
pub mod workspace;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hyper::{HeaderMap, Method};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use error::RenderError;
pub use fetch::{AppletFetcher, FetchError, HttpFetcher};
pub use params::{OutputFormat, OutputMode, RenderParams};
pub use renderer::{PixletRenderer, Renderer, RendererError, RendererOutput};
pub use response::RenderResponse;
pub use workspace::Workspace;

use crate::http::RequestId;
use template::TemplateValues;

/// Applet bundled with the service, rendered when nothing else is requested
const DEFAULT_APPLET: &str = "default.star";
/// HTML preview page with `{format}`, `{image}` and `{class}` tokens
const HTML_TEMPLATE: &str = "basic.html";

/// Normalized render request
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub method: Method,
    /// Query pairs in order of first appearance
    pub params: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub request_id: RequestId,
}

impl RenderRequest {
    pub fn from_params(params: Vec<(String, String)>) -> Self {
        Self {
            method: Method::GET,
            params,
            headers: HeaderMap::new(),
            request_id: RequestId::new(),
        }
    }
}

/// Locations inside the assets directory
#[derive(Debug, Clone)]
pub struct AssetPaths {
    root: PathBuf,
}

impl AssetPaths {
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_applet(&self) -> PathBuf {
        self.root.join(DEFAULT_APPLET)
    }

    /// `<assets>/<name>/<name>.star`
    pub fn local_applet(&self, name: &str) -> PathBuf {
        self.root.join(name).join(format!("{name}.star"))
    }

    pub fn html_template(&self) -> PathBuf {
        self.root.join(HTML_TEMPLATE)
    }
}

/// The render request handler
pub struct RenderService {
    renderer: Arc<dyn Renderer>,
    fetcher: Arc<dyn AppletFetcher>,
    assets: AssetPaths,
    temp_dir: PathBuf,
}

impl RenderService {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        fetcher: Arc<dyn AppletFetcher>,
        assets: AssetPaths,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            renderer,
            fetcher,
            assets,
            temp_dir,
        }
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    pub const fn assets(&self) -> &AssetPaths {
        &self.assets
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Handle one request. Every failure is turned into a response.
    #[tracing::instrument(name = "render", skip_all, fields(request_id = %req.request_id))]
    pub async fn handle(&self, req: &RenderRequest) -> RenderResponse {
        let params = RenderParams::from_query(&req.params);

        let result = if params.version {
            self.version().await
        } else {
            let workspace = Workspace::new(&self.temp_dir, params.format);
            let rendered = self.render(&params, &workspace).await;
            workspace.cleanup().await;
            match rendered {
                Ok(image) => self.respond(&params, image).await,
                Err(e) => Err(e),
            }
        };

        result.unwrap_or_else(|err| {
            tracing::warn!(status = err.status().as_u16(), error = %err, "render request failed");
            RenderResponse::error(&err)
        })
    }

    async fn version(&self) -> Result<RenderResponse, RenderError> {
        let version = self.renderer.version().await.map_err(RenderError::Version)?;
        Ok(RenderResponse::text(version))
    }

    /// `fileName` wins over `applet`, which wins over the default applet
    pub fn resolve_applet_path(&self, params: &RenderParams, workspace: &Workspace) -> PathBuf {
        if let Some(name) = &params.file_name {
            self.assets.local_applet(name)
        } else if params.has_remote_applet() {
            workspace.input_path().to_path_buf()
        } else {
            self.assets.default_applet()
        }
    }

    /// Fetch (when requested), render and return the image as base64
    async fn render(
        &self,
        params: &RenderParams,
        workspace: &Workspace,
    ) -> Result<String, RenderError> {
        let applet_path = self.resolve_applet_path(params, workspace);
        tracing::info!(applet = %applet_path.display(), format = %params.format, "rendering applet");
        let args = params::build_render_args(&applet_path, workspace.output_path(), params);

        if let Some(url) = &params.applet_url {
            let source = self.fetcher.fetch(url).await?;
            tokio::fs::write(workspace.input_path(), source)
                .await
                .map_err(RenderError::StoreApplet)?;
        }

        if let Err(source) = self.renderer.run(&args).await {
            self.log_render_failure(&source).await;
            return Err(RenderError::Render {
                source,
                remote_applet: params.has_remote_applet(),
            });
        }

        let image = tokio::fs::read(workspace.output_path())
            .await
            .map_err(|source| RenderError::ReadOutput {
                source,
                path: workspace.output_path().to_path_buf(),
            })?;
        if image.is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        Ok(STANDARD.encode(image))
    }

    async fn log_render_failure(&self, err: &RendererError) {
        if let Some(stderr) = err.stderr() {
            tracing::error!(stderr = %stderr.trim_end(), "renderer exited with an error");
        }
        match self.renderer.version().await {
            Ok(version) => tracing::info!(%version, "renderer version check"),
            Err(e) => tracing::error!(error = %e, "failed to get renderer version"),
        }
    }

    async fn respond(
        &self,
        params: &RenderParams,
        image: String,
    ) -> Result<RenderResponse, RenderError> {
        match params.output {
            OutputMode::Image => Ok(RenderResponse::image(params.format.content_type(), image)),
            OutputMode::Base64 => Ok(RenderResponse::text(image)),
            OutputMode::Html => {
                let template = tokio::fs::read_to_string(self.assets.html_template())
                    .await
                    .map_err(RenderError::Template)?;
                let html = template::fill(
                    &template,
                    &TemplateValues {
                        format: params.format.as_str(),
                        image: &image,
                        class: params.css_class(),
                    },
                );
                Ok(RenderResponse::html(html))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hyper::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const IMAGE: &[u8] = b"RIFF\x10\0\0\0WEBPVP8 fake-image";
    const TEMPLATE: &str =
        r#"<img class="{class}" src="data:image/{format};base64,{image}">"#;

    #[derive(Clone, Copy)]
    enum Behavior {
        Write(&'static [u8]),
        Fail,
    }

    /// Records invocations and writes canned bytes to `--output=`
    struct StubRenderer {
        behavior: Behavior,
        calls: Mutex<Vec<Vec<String>>>,
        applet_sources: Mutex<Vec<Option<String>>>,
    }

    impl StubRenderer {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: Mutex::new(Vec::new()),
                applet_sources: Mutex::new(Vec::new()),
            })
        }

        fn render_calls(&self) -> Vec<Vec<String>> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|args| args.first().map(String::as_str) == Some("render"))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl Renderer for StubRenderer {
        async fn run(&self, args: &[String]) -> Result<RendererOutput, RendererError> {
            self.calls.lock().unwrap().push(args.to_vec());
            let fail = || RendererError::Failed {
                command_line: format!("pixlet {}", args.join(" ")),
                code: Some(1),
                stderr: "error: applet exploded".to_string(),
            };

            if args.first().map(String::as_str) == Some("version") {
                return match self.behavior {
                    Behavior::Fail => Err(fail()),
                    Behavior::Write(_) => Ok(RendererOutput {
                        stdout: "Pixlet version: v0.34.0\n".to_string(),
                        stderr: String::new(),
                    }),
                };
            }

            self.applet_sources
                .lock()
                .unwrap()
                .push(std::fs::read_to_string(&args[1]).ok());

            match self.behavior {
                Behavior::Fail => Err(fail()),
                Behavior::Write(bytes) => {
                    let output = args
                        .iter()
                        .find_map(|a| a.strip_prefix("--output="))
                        .unwrap();
                    std::fs::write(output, bytes).unwrap();
                    Ok(RendererOutput::default())
                }
            }
        }
    }

    #[derive(Clone, Copy)]
    enum Fetched {
        Source(&'static str),
        Status(u16, &'static str),
        TooLarge,
    }

    struct StubFetcher {
        result: Fetched,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn new(result: Fetched) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AppletFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.result {
                Fetched::Source(source) => Ok(source.to_string()),
                Fetched::Status(status, reason) => Err(FetchError::Status {
                    status,
                    reason: reason.to_string(),
                }),
                Fetched::TooLarge => Err(FetchError::TooLarge {
                    url: url.to_string(),
                    limit: 16,
                }),
            }
        }
    }

    struct Fixture {
        service: RenderService,
        renderer: Arc<StubRenderer>,
        fetcher: Arc<StubFetcher>,
        assets: TempDir,
        temp: TempDir,
    }

    fn fixture_with(behavior: Behavior, fetch: Fetched) -> Fixture {
        let assets = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(assets.path().join("basic.html"), TEMPLATE).unwrap();
        std::fs::write(assets.path().join("default.star"), "def main(): pass").unwrap();

        let renderer = StubRenderer::new(behavior);
        let fetcher = StubFetcher::new(fetch);
        let service = RenderService::new(
            renderer.clone(),
            fetcher.clone(),
            AssetPaths::new(assets.path().to_path_buf()),
            temp.path().to_path_buf(),
        );
        Fixture {
            service,
            renderer,
            fetcher,
            assets,
            temp,
        }
    }

    fn fixture(behavior: Behavior) -> Fixture {
        fixture_with(behavior, Fetched::Source("def main(): return remote()"))
    }

    fn request(pairs: &[(&str, &str)]) -> RenderRequest {
        RenderRequest::from_params(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    fn temp_is_empty(fx: &Fixture) -> bool {
        std::fs::read_dir(fx.temp.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_version_short_circuits() {
        let fx = fixture(Behavior::Write(IMAGE));
        let resp = fx
            .service
            .handle(&request(&[
                ("version", "true"),
                ("applet", "https://example.com/a.star"),
                ("format", "gif"),
            ]))
            .await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, "Pixlet version: v0.34.0");
        assert_eq!(resp.content_type(), Some("text/plain"));
        assert_eq!(*fx.renderer.calls.lock().unwrap(), vec![vec!["version".to_string()]]);
        assert_eq!(fx.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_version_failure() {
        let fx = fixture(Behavior::Fail);
        let resp = fx.service.handle(&request(&[("version", "true")])).await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.body.starts_with("Error: Could not get version info."));
        assert!(resp.body.contains("applet exploded"));
    }

    #[tokio::test]
    async fn test_default_applet_path() {
        let fx = fixture(Behavior::Write(IMAGE));
        fx.service.handle(&request(&[("output", "base64")])).await;
        let calls = fx.renderer.render_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0][1],
            fx.assets.path().join("default.star").display().to_string()
        );
    }

    #[tokio::test]
    async fn test_file_name_takes_precedence_over_applet() {
        let fx = fixture(Behavior::Write(IMAGE));
        fx.service
            .handle(&request(&[
                ("fileName", "clock"),
                ("applet", "https://example.com/a.star"),
            ]))
            .await;
        let calls = fx.renderer.render_calls();
        assert_eq!(
            calls[0][1],
            fx.assets.path().join("clock").join("clock.star").display().to_string()
        );
    }

    #[tokio::test]
    async fn test_remote_applet_is_downloaded_and_rendered() {
        let fx = fixture(Behavior::Write(IMAGE));
        let resp = fx
            .service
            .handle(&request(&[
                ("applet", "https://example.com/a.star"),
                ("output", "base64"),
                ("who", "world"),
            ]))
            .await;

        assert_eq!(resp.status, StatusCode::OK);
        let calls = fx.renderer.render_calls();
        assert!(calls[0][1].starts_with(&fx.temp.path().display().to_string()));
        assert!(calls[0][1].ends_with("-input.star"));
        assert_eq!(calls[0].last().unwrap(), "who=world");
        assert_eq!(
            fx.renderer.applet_sources.lock().unwrap()[0].as_deref(),
            Some("def main(): return remote()")
        );
        assert!(temp_is_empty(&fx));
    }

    #[tokio::test]
    async fn test_fetch_404_skips_renderer() {
        let fx = fixture_with(Behavior::Write(IMAGE), Fetched::Status(404, "Not Found"));
        let resp = fx
            .service
            .handle(&request(&[("applet", "https://example.com/missing.star")]))
            .await;

        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.body, "Error: Could not fetch applet. Not Found");
        assert!(fx.renderer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_renderer_returns_500() {
        let fx = fixture(Behavior::Fail);
        for output in ["html", "image", "base64"] {
            let resp = fx.service.handle(&request(&[("output", output)])).await;
            assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(resp.body.contains("applet exploded"));
            assert!(!resp.body.contains("Ensure the provided applet is valid."));
        }
        assert!(temp_is_empty(&fx));
    }

    #[tokio::test]
    async fn test_failing_renderer_with_remote_applet_hints() {
        let fx = fixture(Behavior::Fail);
        let resp = fx
            .service
            .handle(&request(&[("applet", "https://example.com/a.star")]))
            .await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.body.contains("Ensure the provided applet is valid."));
    }

    #[tokio::test]
    async fn test_base64_round_trip() {
        let fx = fixture(Behavior::Write(IMAGE));
        let resp = fx.service.handle(&request(&[("output", "BASE64")])).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, STANDARD.encode(IMAGE));
        assert!(!resp.is_base64_encoded);
        assert_eq!(resp.content_type(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_image_output_gif() {
        let fx = fixture(Behavior::Write(IMAGE));
        let resp = fx
            .service
            .handle(&request(&[("output", "image"), ("format", "GIF")]))
            .await;
        assert_eq!(resp.content_type(), Some("image/gif"));
        assert!(resp.is_base64_encoded);
        assert_eq!(resp.body_bytes().unwrap().as_ref(), IMAGE);

        let calls = fx.renderer.render_calls();
        assert_eq!(calls[0].iter().filter(|a| *a == "--gif=true").count(), 1);
        assert!(calls[0][2].ends_with("-output.gif"));
    }

    #[tokio::test]
    async fn test_html_output() {
        let fx = fixture(Behavior::Write(IMAGE));
        let resp = fx.service.handle(&request(&[])).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.content_type(), Some("text/html"));
        assert_eq!(
            resp.body,
            format!(
                r#"<img class="pixelate" src="data:image/webp;base64,{}">"#,
                STANDARD.encode(IMAGE)
            )
        );

        let resp = fx.service.handle(&request(&[("pixelate", "false")])).await;
        assert!(resp.body.starts_with(r#"<img class="" "#));
    }

    #[tokio::test]
    async fn test_missing_template() {
        let fx = fixture(Behavior::Write(IMAGE));
        std::fs::remove_file(fx.assets.path().join("basic.html")).unwrap();
        let resp = fx.service.handle(&request(&[])).await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.body.starts_with("Error: Could not generate html."));
    }

    #[tokio::test]
    async fn test_empty_output_image() {
        let fx = fixture(Behavior::Write(b""));
        let resp = fx.service.handle(&request(&[("output", "base64")])).await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.body, "Error: Could not read output image.");
        assert!(temp_is_empty(&fx));
    }

    #[tokio::test]
    async fn test_download_failure_is_500() {
        let fx = fixture_with(Behavior::Write(IMAGE), Fetched::TooLarge);
        let resp = fx
            .service
            .handle(&request(&[("applet", "https://example.com/huge.star")]))
            .await;

        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.body.starts_with("Error: Could not download applet."));
        assert!(resp.body.contains("over limit"));
        assert!(fx.renderer.calls.lock().unwrap().is_empty());
        assert!(temp_is_empty(&fx));
    }

    #[tokio::test]
    async fn test_unwritable_temp_dir_is_500() {
        let fx = fixture(Behavior::Write(IMAGE));
        let service = RenderService::new(
            fx.renderer.clone(),
            fx.fetcher.clone(),
            AssetPaths::new(fx.assets.path().to_path_buf()),
            fx.temp.path().join("missing"),
        );
        let resp = service
            .handle(&request(&[("applet", "https://example.com/a.star")]))
            .await;

        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.body.starts_with("Error: Could not download applet."));
        assert_eq!(fx.fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(fx.renderer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shared_request_id_gets_distinct_temp_files() {
        let fx = fixture(Behavior::Write(IMAGE));
        let id: RequestId = "01HZX3J8Q4T6Y2W9V5N7M1K0PB".parse().unwrap();
        for _ in 0..2 {
            let req = RenderRequest {
                request_id: id,
                ..request(&[("applet", "https://example.com/a.star"), ("output", "base64")])
            };
            assert_eq!(fx.service.handle(&req).await.status, StatusCode::OK);
        }

        let calls = fx.renderer.render_calls();
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0][1], calls[1][1]);
        assert_ne!(calls[0][2], calls[1][2]);
        assert!(!calls[0][2].contains(&id.to_string()));
    }
}
