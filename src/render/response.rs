//! Render handler response
//!
//! Transport-neutral result of a render request. Binary payloads travel as
//! base64 text with `is_base64_encoded` set and are decoded only when the
//! response is turned into a hyper response.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

use super::error::RenderError;
use crate::http;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResponse {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl RenderResponse {
    fn ok(content_type: impl Into<String>, body: String) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![("content-type", content_type.into())],
            body,
            is_base64_encoded: false,
        }
    }

    pub fn text(body: String) -> Self {
        Self::ok("text/plain", body)
    }

    pub fn html(body: String) -> Self {
        Self::ok("text/html", body)
    }

    /// Raw image, body holds the base64 encoding of the bytes
    pub fn image(content_type: String, base64: String) -> Self {
        Self {
            is_base64_encoded: true,
            ..Self::ok(content_type, base64)
        }
    }

    pub fn error(err: &RenderError) -> Self {
        Self {
            status: err.status(),
            headers: vec![("content-type", "text/plain; charset=utf-8".to_string())],
            body: err.to_string(),
            is_base64_encoded: false,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }

    /// Body as sent on the wire
    pub fn body_bytes(&self) -> Result<Bytes, base64::DecodeError> {
        if self.is_base64_encoded {
            STANDARD.decode(&self.body).map(Bytes::from)
        } else {
            Ok(Bytes::from(self.body.clone()))
        }
    }

    pub fn into_http(self) -> Response<Full<Bytes>> {
        let body = match self.body_bytes() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "render produced an undecodable base64 body");
                return http::build_500_response("Server Error: invalid image encoding");
            }
        };

        let mut builder = Response::builder()
            .status(self.status)
            .header("Content-Length", body.len());
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }
        builder.body(Full::new(body)).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to build render response");
            http::build_500_response("Server Error")
        })
    }
}
