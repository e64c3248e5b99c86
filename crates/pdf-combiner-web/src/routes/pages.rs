//! Page routes - full HTML page renders and fragment reloads.

use axum::extract::{Path, State};
use axum::response::Response;
use std::sync::Arc;

use super::{editor_reply, editor_template, list_template};
use crate::helpers::{OptionExt, RouteResult};
use crate::state::AppState;
use crate::templates::{IndexTemplate, PageListTemplate, WorkspaceTemplate};

/// Landing page with upload form.
pub async fn index() -> IndexTemplate {
    IndexTemplate
}

/// Workspace of a session: page list, editor and export controls.
pub async fn workspace(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<WorkspaceTemplate> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let list = session
        .with_session(|s| list_template(s, &session_id, false))
        .await
        .or_not_found("Session not found")?;

    Ok(WorkspaceTemplate {
        session_id,
        items: list.items,
        oob: false,
    })
}

/// Page list fragment.
pub async fn page_list(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<PageListTemplate> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    session
        .with_session(|s| list_template(s, &session_id, false))
        .await
        .or_not_found("Session not found")
}

/// Editor fragment for the current state (open page or placeholder).
pub async fn editor_view(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let result = session
        .with_session(|s| editor_template(s, &session_id))
        .await
        .or_not_found("Session not found")?;
    editor_reply(result, &[])
}
