//! Export routes - download and save-to-path.
//!
//! Both take a snapshot of the page order under the lock and build the
//! document on a blocking worker, so edits made meanwhile are not included.

use axum::{
    body::Body,
    extract::{Form, Path, State},
    http::{StatusCode, header},
    response::Response,
};
use pdf_combiner_core::{ExportPage, Exporter, util::display_name};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::PathForm;
use crate::helpers::{
    OptionExt, ResultExt, RouteResult, Toast, status_for, toast_only, toasts_only,
};
use crate::state::{AppState, BusyGuard, SessionRef};

/// File name offered for downloads.
const DOWNLOAD_NAME: &str = "combined.pdf";

/// Download the combined PDF.
pub async fn download_pdf(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let Some((_guard, exporter, pages)) = snapshot(&session).await? else {
        return Err((StatusCode::CONFLICT, Toast::busy().message));
    };

    let output = tokio::task::spawn_blocking(move || exporter.export_to_bytes(&pages))
        .await
        .map_err(|e| {
            error!("Export task panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Export failed".to_string(),
            )
        })?
        .map_err(|e| {
            warn!("Export failed: {}", e);
            (status_for(&e), e.to_string())
        })?;

    for path in &output.changed_sources {
        warn!("{} changed after it was loaded", path.display());
    }
    info!(
        "Exported {} pages ({} bytes) for download",
        output.page_count,
        output.bytes.len()
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{DOWNLOAD_NAME}\""),
        )
        .body(Body::from(output.bytes))
        .or_internal_error()
}

/// Write the combined PDF to a path on the server.
///
/// Answers with a toast only; the destination is written atomically, so a
/// failed export leaves an existing file as it was.
pub async fn export_to_path(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Form(form): Form<PathForm>,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let dest = PathBuf::from(form.path.trim());
    if dest.as_os_str().is_empty() {
        return toast_only(&Toast::warning("Enter a destination path"));
    }

    let Some((_guard, exporter, pages)) = snapshot(&session).await? else {
        return toast_only(&Toast::busy());
    };

    let result = tokio::task::spawn_blocking(move || exporter.export_to_file(&pages, &dest))
        .await
        .map_err(|e| {
            error!("Export task panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Export failed".to_string(),
            )
        })?;

    match result {
        Ok(summary) => {
            let mut toasts = vec![Toast::success(format!(
                "Saved {} pages to {}",
                summary.page_count,
                summary.path.display()
            ))];
            toasts.extend(summary.changed_sources.iter().map(|path| {
                Toast::warning(format!(
                    "{} changed on disk after it was loaded",
                    display_name(path)
                ))
            }));
            toasts_only(&toasts)
        }
        Err(e) => {
            warn!("Export failed: {}", e);
            toast_only(&Toast::from_error(&e))
        }
    }
}

/// Claim the session and copy out what an export needs.
///
/// `None` if another load or export is running.
async fn snapshot(
    session: &SessionRef<'_>,
) -> RouteResult<Option<(BusyGuard, Exporter, Vec<ExportPage>)>> {
    session
        .with_session(|s| {
            s.try_begin_job().map(|guard| {
                (
                    guard,
                    s.combiner.exporter(),
                    s.combiner.model().export_pages(),
                )
            })
        })
        .await
        .or_not_found("Session not found")
}
