//! Source routes - uploads and server-local files.
//!
//! Loading rasterizes every page for its thumbnail, so it runs on a blocking
//! worker with the session's busy flag held. The model is only touched once,
//! under the lock, to append what was loaded.

use axum::{
    extract::{Form, Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use axum_extra::extract::Multipart;
use pdf_combiner_core::{LoadedSource, Result as CoreResult, load_source, util::display_name};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{PathForm, editor_reply, editor_template};
use crate::helpers::{OptionExt, ResultExt, RouteResult, Toast, redirect, toast_only};
use crate::state::{AppState, Session, SessionRef};

/// What a load added, and what to tell the user about it.
struct LoadOutcome {
    pages: usize,
    toasts: Vec<Toast>,
}

/// Upload PDFs into a new session - redirects to its workspace (POST-Redirect-GET).
///
/// Supports both HTMX requests (HX-Redirect header) and standard form submissions
/// (HTTP 303 See Other redirect) for graceful degradation without JavaScript.
pub async fn upload_new(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> RouteResult<Response> {
    let session_id = state.create_session().await.map_err(|e| {
        error!("Failed to create session: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let paths = save_uploads(&session, &mut multipart).await?;
    if paths.is_empty() {
        state.remove_session(&session_id).await;
        return Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()));
    }

    let outcome = load_paths(&session, paths).await?;
    if outcome.pages == 0 {
        state.remove_session(&session_id).await;
        let reasons: Vec<_> = outcome.toasts.into_iter().map(|t| t.message).collect();
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("No PDF could be loaded. {}", reasons.join("; ")),
        ));
    }

    info!("Created session {} with {} pages", session_id, outcome.pages);

    let is_htmx = headers.get("HX-Request").is_some();
    redirect(&format!("/s/{session_id}"), is_htmx)
}

/// Add uploaded PDFs to an existing session.
pub async fn upload_more(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let paths = save_uploads(&session, &mut multipart).await?;
    if paths.is_empty() {
        return toast_only(&Toast::warning("No file selected"));
    }
    let outcome = load_paths(&session, paths).await?;
    reply_with(&session, &session_id, outcome).await
}

/// Add a PDF that already exists on the server's file system.
pub async fn open_path(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Form(form): Form<PathForm>,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let path = form.path.trim();
    if path.is_empty() {
        return toast_only(&Toast::warning("Enter the path of a PDF file"));
    }
    let outcome = load_paths(&session, vec![PathBuf::from(path)]).await?;
    reply_with(&session, &session_id, outcome).await
}

async fn reply_with(
    session: &SessionRef<'_>,
    session_id: &str,
    outcome: LoadOutcome,
) -> RouteResult<Response> {
    let result = session
        .with_session(|s| editor_template(s, session_id))
        .await
        .or_not_found("Session not found")?;
    editor_reply(result, &outcome.toasts)
}

/// Write every `file` field to the session's source store.
async fn save_uploads(
    session: &SessionRef<'_>,
    multipart: &mut Multipart,
) -> RouteResult<Vec<PathBuf>> {
    let mut paths = Vec::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("document.pdf").to_string();
        let data = field.bytes().await.or_bad_request()?;
        // Empty file inputs still send a part
        if data.is_empty() {
            continue;
        }

        // Reserve inside lock (fast), write outside
        let path = session
            .with_session_mut(|s| s.sources.reserve_path(&filename))
            .await
            .or_not_found("Session not found")?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.or_internal_error()?;
        }
        tokio::fs::write(&path, &data).await.or_internal_error()?;
        session
            .with_session_mut(|s| s.sources.mark_stored(path.clone()))
            .await
            .or_not_found("Session not found")?;

        info!("Received {} ({} bytes)", filename, data.len());
        paths.push(path);
    }

    Ok(paths)
}

/// Load `paths` off the async runtime and append them to the page list.
async fn load_paths(session: &SessionRef<'_>, paths: Vec<PathBuf>) -> RouteResult<LoadOutcome> {
    let claim = session
        .with_session(|s| {
            s.try_begin_job()
                .map(|guard| (guard, s.combiner.config().render.thumbnail_scale))
        })
        .await
        .or_not_found("Session not found")?;
    let Some((_guard, scale)) = claim else {
        return Ok(LoadOutcome {
            pages: 0,
            toasts: vec![Toast::busy()],
        });
    };

    let results: Vec<(PathBuf, CoreResult<LoadedSource>)> =
        tokio::task::spawn_blocking(move || {
            paths
                .into_iter()
                .map(|path| {
                    let result = load_source(&path, scale);
                    (path, result)
                })
                .collect()
        })
        .await
        .map_err(|e| {
            error!("Load task panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Loading failed".to_string(),
            )
        })?;

    session
        .with_session_mut(|s| commit_loaded(s, results))
        .await
        .or_not_found("Session not found")
}

fn commit_loaded(
    session: &mut Session,
    results: Vec<(PathBuf, CoreResult<LoadedSource>)>,
) -> LoadOutcome {
    let mut pages = 0;
    let mut toasts = Vec::new();

    for (path, result) in results {
        let name = display_name(&path);
        match result {
            Ok(source) => {
                let placeholders = source.placeholder_count();
                pages += session.combiner.append_source(source).len();
                if placeholders > 0 {
                    toasts.push(Toast::warning(format!(
                        "{name}: {placeholders} page(s) could not be rendered"
                    )));
                }
            }
            Err(e) => {
                warn!("Skipped {}: {}", path.display(), e);
                toasts.push(Toast::error(format!("{name}: {e}")));
            }
        }
    }

    if pages > 0 {
        toasts.insert(0, Toast::success(format!("Added {pages} page(s)")));
    }
    LoadOutcome { pages, toasts }
}
