//! Axilla: an HTTP façade over the Pixlet renderer.
//!
//! Every request to `/` runs a Starlark applet through the `pixlet` binary
//! and returns the rendered WebP/GIF as an image, base64 text or an HTML page.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod handler;
pub mod http;
pub mod logger;
pub mod render;
pub mod server;
