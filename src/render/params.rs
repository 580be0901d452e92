//! Query parameter parsing for render requests
//!
//! Turns the raw query pairs into a typed [`RenderParams`] and builds the
//! argument list handed to the renderer.

use std::fmt;
use std::path::Path;

/// Parameters consumed by the handler and never passed to the renderer
const RESERVED_PARAMS: [&str; 4] = ["format", "output", "applet", "version"];

/// CSS class applied to the preview image unless `pixelate=false`
pub const PIXELATE_CLASS: &str = "pixelate";

/// Image encoding produced by the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Webp,
    Gif,
}

impl OutputFormat {
    /// Case-insensitive parse, unknown values fall back to WebP
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("gif") => Self::Gif,
            _ => Self::Webp,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    pub fn content_type(self) -> String {
        format!("image/{}", self.as_str())
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the HTTP response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    #[default]
    Html,
    Image,
    Base64,
}

impl OutputMode {
    /// Case-insensitive parse, unknown values fall back to HTML
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("image") => Self::Image,
            Some(v) if v.eq_ignore_ascii_case("base64") => Self::Base64,
            _ => Self::Html,
        }
    }
}

/// Typed view of a render request's query string
#[derive(Debug, Clone, Default)]
pub struct RenderParams {
    /// URL of a remote applet source
    pub applet_url: Option<String>,
    /// Name of a bundled applet under the assets directory
    pub file_name: Option<String>,
    pub format: OutputFormat,
    pub output: OutputMode,
    pub pixelate: bool,
    pub version: bool,
    /// `key=value` arguments forwarded to the renderer, in query order
    pub forwarded: Vec<String>,
}

impl RenderParams {
    pub fn from_query(params: &[(String, String)]) -> Self {
        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        let forwarded = params
            .iter()
            .filter(|(k, _)| is_forwarded(k))
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        Self {
            applet_url: get("applet").filter(|v| !v.is_empty()).map(str::to_string),
            file_name: get("fileName").filter(|v| !v.is_empty()).map(str::to_string),
            format: OutputFormat::parse(get("format")),
            output: OutputMode::parse(get("output")),
            pixelate: get("pixelate") != Some("false"),
            version: get("version") == Some("true"),
            forwarded,
        }
    }

    pub const fn css_class(&self) -> &'static str {
        if self.pixelate {
            PIXELATE_CLASS
        } else {
            ""
        }
    }

    pub const fn has_remote_applet(&self) -> bool {
        self.applet_url.is_some()
    }
}

fn is_forwarded(name: &str) -> bool {
    !RESERVED_PARAMS.contains(&name) && !name.starts_with('-')
}

/// Build the `render` argument list
pub fn build_render_args(
    applet_path: &Path,
    output_path: &Path,
    params: &RenderParams,
) -> Vec<String> {
    let mut args = vec![
        "render".to_string(),
        applet_path.display().to_string(),
        format!("--output={}", output_path.display()),
    ];
    if params.format == OutputFormat::Gif {
        args.push("--gif=true".to_string());
    }
    args.extend(params.forwarded.iter().cloned());
    args
}
