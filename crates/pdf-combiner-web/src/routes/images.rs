//! Image routes - thumbnails and editor backgrounds.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use pdf_combiner_core::{EntryId, pdf::encode_png, render_page_png, render_page_webp};
use std::sync::Arc;

use super::PageImageQuery;
use crate::helpers::{OptionExt, ResultExt, RouteResult, status_for};
use crate::state::AppState;

/// Thumbnail of a page entry, as PNG.
///
/// Thumbnails are rendered once at load time and never change for an entry,
/// so they are cached as immutable.
pub async fn thumbnail(
    State(state): State<Arc<AppState>>,
    Path((session_id, entry)): Path<(String, u64)>,
    headers: HeaderMap,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let etag = format!("\"thumb-{session_id}-{entry}\"");
    if let Some(not_modified) = not_modified(&headers, &etag) {
        return not_modified;
    }

    // Clone the small bitmap inside lock, encode outside
    let image = session
        .with_session(|s| {
            s.combiner
                .model()
                .get(EntryId(entry))
                .map(|e| e.thumbnail().image().clone())
        })
        .await
        .or_not_found("Session not found")?
        .or_not_found("Page not found")?;

    let png = tokio::task::spawn_blocking(move || encode_png(&image))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Encode task panicked: {e}"),
            )
        })?
        .or_internal_error()?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, "private, max-age=3600, immutable")
        .body(Body::from(png))
        .or_internal_error()
}

/// Source page of an entry rendered for the editor, as PNG or WebP (based on Accept header).
///
/// Overlays are not part of the image; the editor draws them as HTML on top.
pub async fn page_image(
    State(state): State<Arc<AppState>>,
    Path((session_id, entry)): Path<(String, u64)>,
    Query(query): Query<PageImageQuery>,
    headers: HeaderMap,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let (path, page_index, scale) = session
        .with_session(|s| {
            let config = s.combiner.config();
            let scale = config.clamp_scale(query.scale.unwrap_or(config.render.editor_scale));
            s.combiner
                .model()
                .get(EntryId(entry))
                .map(|e| (e.source_path().to_path_buf(), e.page_index(), scale))
        })
        .await
        .or_not_found("Session not found")?
        .or_not_found("Page not found")?;

    // Check if browser supports WebP
    let use_webp = headers
        .get(header::ACCEPT)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|s| s.contains("image/webp"));
    let (content_type, format_tag) = if use_webp {
        ("image/webp", "webp")
    } else {
        ("image/png", "png")
    };

    // Include format and scale in ETag so variants are cached separately
    let etag = format!("\"page-{session_id}-{entry}-{format_tag}-{scale}\"");
    if let Some(not_modified) = not_modified(&headers, &etag) {
        return not_modified;
    }

    // Render in blocking task to avoid blocking async runtime
    let image_data = tokio::task::spawn_blocking(move || {
        if use_webp {
            render_page_webp(&path, page_index, scale)
        } else {
            render_page_png(&path, page_index, scale)
        }
    })
    .await
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Render task panicked: {e}"),
        )
    })?
    .map_err(|e| (status_for(&e), e.to_string()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, "private, max-age=3600, must-revalidate")
        .header(header::VARY, header::ACCEPT.as_str())
        .body(Body::from(image_data))
        .or_internal_error()
}

/// 304 response if `If-None-Match` matches `etag`.
fn not_modified(headers: &HeaderMap, etag: &str) -> Option<RouteResult<Response>> {
    let matches = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|value| value == etag);
    matches.then(|| {
        Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .body(Body::empty())
            .or_internal_error()
    })
}
