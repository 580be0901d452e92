//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: health probes, the render route
//! and static files.

use crate::config::{AppState, RoutesConfig};
use crate::handler::static_files;
use crate::http::{self, RequestId, REQUEST_ID_HEADER};
use crate::logger::{self, AccessLogEntry};
use crate::render::RenderRequest;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, REFERER, SERVER, USER_AGENT};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Path served by the render handler
const RENDER_PATH: &str = "/";

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
}

/// Main entry point for HTTP request handling
///
/// The request body is never read, so any body type is accepted.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let (parts, _) = req.into_parts();
    let request_id = RequestId::from_header_or_new(header_str(&parts, REQUEST_ID_HEADER));

    let mut response = route_request(&parts, &state, request_id).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&state.config.http.server_name) {
        headers.insert(SERVER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }

    if state.config.logging.access_log {
        let entry = access_entry(&parts, &response, peer_addr, request_id, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on path and configuration
async fn route_request(
    parts: &Parts,
    state: &AppState,
    request_id: RequestId,
) -> Response<Full<Bytes>> {
    let path = parts.uri.path();
    let routes: &RoutesConfig = &state.config.routes;

    // Health check endpoints (highest priority, always fast)
    if routes.health.enabled
        && (path == routes.health.liveness_path || path == routes.health.readiness_path)
    {
        return http::build_health_response("ok");
    }

    // The render route accepts every method
    if path == RENDER_PATH {
        let render_req = RenderRequest {
            method: parts.method.clone(),
            params: http::parse_query(parts.uri.query()),
            headers: parts.headers.clone(),
            request_id,
        };
        return state.render.handle(&render_req).await.into_http();
    }

    let ctx = RequestContext {
        path,
        is_head: parts.method == Method::HEAD,
    };
    match parts.method {
        Method::GET | Method::HEAD => {
            static_files::serve_directory(&ctx, &routes.static_dir, &routes.index_files).await
        }
        _ => {
            tracing::debug!(method = %parts.method, %path, "method not allowed");
            http::build_405_response()
        }
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn access_entry(
    parts: &Parts,
    response: &Response<Full<Bytes>>,
    peer_addr: SocketAddr,
    request_id: RequestId,
    started: Instant,
) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.request_id = request_id.to_string();
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = match parts.version {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or_default();
    entry.referer = header_str(parts, REFERER.as_str()).map(ToString::to_string);
    entry.user_agent = header_str(parts, USER_AGENT.as_str()).map(ToString::to_string);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}
