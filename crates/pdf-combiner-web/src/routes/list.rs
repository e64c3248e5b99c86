//! Page list routes - selection, reordering and removal.

use axum::{
    extract::{Path, State},
    response::Response,
};
use pdf_combiner_core::{EntryId, Result as CoreResult};
use std::sync::Arc;
use tracing::info;

use super::{editor_reply, editor_template};
use crate::helpers::{OptionExt, RouteResult, Toast, toast_only};
use crate::state::{AppState, Session};
use crate::templates::EditorTemplate;

/// Select a page and open it in the editor.
///
/// An editor already open on another page is closed first; its edits stay.
pub async fn select_entry(
    State(state): State<Arc<AppState>>,
    Path((session_id, entry)): Path<(String, u64)>,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let result = session
        .with_session_mut(|s| -> CoreResult<EditorTemplate> {
            let scale = s
                .editor
                .as_ref()
                .map_or(s.combiner.config().render.editor_scale, |e| e.scale());
            let editor = s.combiner.open_editor_on(EntryId(entry), scale)?;
            if let Some(previous) = s.editor.replace(editor) {
                previous.close();
            }
            editor_template(s, &session_id)
        })
        .await
        .or_not_found("Session not found")?;
    editor_reply(result, &[])
}

pub async fn move_up(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Response> {
    list_action(&state, &session_id, |s| {
        let (model, list) = s.combiner.parts_mut();
        list.move_up(model).map(|_| None)
    })
    .await
}

pub async fn move_down(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Response> {
    list_action(&state, &session_id, |s| {
        let (model, list) = s.combiner.parts_mut();
        list.move_down(model).map(|_| None)
    })
    .await
}

/// Remove the selected page; the editor closes if it was showing it.
pub async fn remove_selected(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Response> {
    if let Some(reply) = busy_reply(&state, &session_id).await? {
        return Ok(reply);
    }

    list_action(&state, &session_id, |s| {
        let (model, list) = s.combiner.parts_mut();
        let removed = list.remove_selected(model)?;
        s.sync_editor();
        Ok(removed.map(|entry| Toast::success(format!("Removed {}", entry.label()))))
    })
    .await
}

/// Remove every page.
pub async fn clear_pages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Response> {
    if let Some(reply) = busy_reply(&state, &session_id).await? {
        return Ok(reply);
    }

    list_action(&state, &session_id, |s| {
        s.editor = None;
        s.combiner.clear();
        info!("Cleared page list");
        Ok(Some(Toast::success("Page list cleared")))
    })
    .await
}

/// Busy toast if a load or export is running.
///
/// Pages are only removed while no job runs on the session.
async fn busy_reply(state: &AppState, session_id: &str) -> RouteResult<Option<Response>> {
    let session = state
        .get_session(session_id)
        .await
        .or_not_found("Session not found")?;

    let busy = session
        .with_session(Session::is_busy)
        .await
        .or_not_found("Session not found")?;
    if busy {
        toast_only(&Toast::busy()).map(Some)
    } else {
        Ok(None)
    }
}

/// Apply `action` under the session lock and answer with the editor fragment.
async fn list_action<F>(state: &AppState, session_id: &str, action: F) -> RouteResult<Response>
where
    F: FnOnce(&mut Session) -> CoreResult<Option<Toast>>,
{
    let session = state
        .get_session(session_id)
        .await
        .or_not_found("Session not found")?;

    let (result, toast) = session
        .with_session_mut(|s| match action(s) {
            Ok(toast) => (editor_template(s, session_id), toast),
            Err(e) => (Err(e), None),
        })
        .await
        .or_not_found("Session not found")?;

    let toasts: Vec<Toast> = toast.into_iter().collect();
    editor_reply(result, &toasts)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pdf_combiner_core::model::{LoadedPage, Thumbnail};
    use pdf_combiner_core::pdf::placeholder_image;
    use pdf_combiner_core::{AppConfig, LoadedSource, PageGeometry};
    use std::path::PathBuf;

    async fn session_with_pages(state: &AppState) -> String {
        let id = state.create_session().await.unwrap();
        let session = state.get_session(&id).await.unwrap();
        session
            .with_session_mut(|s| {
                s.combiner.append_source(LoadedSource {
                    path: PathBuf::from("a.pdf"),
                    fingerprint: String::new(),
                    pages: (0..2)
                        .map(|page_index| LoadedPage {
                            page_index,
                            geometry: PageGeometry::default(),
                            thumbnail: Thumbnail::Rendered(placeholder_image(2, 2)),
                        })
                        .collect(),
                })
            })
            .await
            .unwrap();
        id
    }

    async fn page_count(state: &AppState, id: &str) -> usize {
        let session = state.get_session(id).await.unwrap();
        session.with_session(|s| s.combiner.model().len()).await.unwrap()
    }

    #[tokio::test]
    async fn test_removal_waits_for_running_job() {
        let state = Arc::new(AppState::new(AppConfig::default()));
        let id = session_with_pages(&state).await;
        let session = state.get_session(&id).await.unwrap();
        let guard = session.with_session(Session::try_begin_job).await.unwrap();
        assert!(guard.is_some());

        let reply = remove_selected(State(Arc::clone(&state)), Path(id.clone()))
            .await
            .unwrap();
        assert_eq!(reply.headers()["HX-Reswap"], "none");
        let reply = clear_pages(State(Arc::clone(&state)), Path(id.clone()))
            .await
            .unwrap();
        assert_eq!(reply.headers()["HX-Reswap"], "none");
        assert_eq!(page_count(&state, &id).await, 2);

        drop(guard);
        let reply = remove_selected(State(Arc::clone(&state)), Path(id.clone()))
            .await
            .unwrap();
        assert!(reply.headers().get("HX-Reswap").is_none());
        assert_eq!(page_count(&state, &id).await, 1);
    }
}
