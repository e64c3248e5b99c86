//! Overlay editor routes.
//!
//! Pointer positions arrive in canvas pixels at the editor's current scale;
//! the editor converts them to page points. Right-click menu actions go
//! through [`ContextAction`] like any other front end would.

use axum::{
    extract::{Form, Path, State},
    response::Response,
};
use pdf_combiner_core::{
    ContextAction, Error, FontSpec, RecordId, Result as CoreResult, ScreenPoint, TextColor,
};
use std::sync::Arc;

use super::{
    ColorForm, DragForm, FontForm, PointForm, RecordForm, ScaleForm, TextForm, apply_edit,
    editor_reply, editor_template,
};
use crate::helpers::{OptionExt, RouteResult, Toast};
use crate::state::{AppState, Session};
use crate::templates::EditorTemplate;

/// Change the editor zoom. Overlays keep their place on the page.
pub async fn set_scale(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Form(form): Form<ScaleForm>,
) -> RouteResult<Response> {
    edit_session(&state, &session_id, |s| {
        let scale = s.combiner.config().clamp_scale(form.scale);
        let editor = s.editor.as_mut().ok_or(Error::NoSelection)?;
        editor.set_scale(scale);
        editor_template(s, &session_id)
    })
    .await
}

/// Add text: at the given point, or with the default text and position.
pub async fn add_text(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Form(form): Form<PointForm>,
) -> RouteResult<Response> {
    edit_session(&state, &session_id, |s| {
        apply_edit(s, &session_id, |editor, model| {
            let added = match (form.x, form.y) {
                (Some(x), Some(y)) => {
                    let defaults = editor.defaults().clone();
                    editor.add_text_at(
                        model,
                        ScreenPoint::new(x, y),
                        defaults.text.clone(),
                        FontSpec::from(&defaults),
                        defaults.color,
                    )
                }
                _ => editor.add_text(model),
            };
            added.map(|_| ())
        })
    })
    .await
}

/// Commit a drag that the browser previewed locally.
pub async fn drag_text(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Form(form): Form<DragForm>,
) -> RouteResult<Response> {
    edit_session(&state, &session_id, |s| {
        apply_edit(s, &session_id, |editor, model| {
            editor.begin_drag(
                model,
                RecordId(form.record),
                ScreenPoint::new(form.grab_x, form.grab_y),
            )?;
            editor
                .end_drag(model, ScreenPoint::new(form.drop_x, form.drop_y))
                .map(|_| ())
        })
    })
    .await
}

/// Double-click edit: replace the text of the topmost overlay under the point.
pub async fn edit_text(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Form(form): Form<TextForm>,
) -> RouteResult<Response> {
    edit_session(&state, &session_id, |s| {
        apply_edit(s, &session_id, |editor, model| {
            // Nothing under the point is not an error
            editor
                .edit_text_at(model, ScreenPoint::new(form.x, form.y), form.text)
                .map(|_| ())
        })
    })
    .await
}

pub async fn set_font(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Form(form): Form<FontForm>,
) -> RouteResult<Response> {
    let font = FontSpec::new(form.family, form.size)
        .with_style(form.bold.is_some(), form.italic.is_some());
    context_action(&state, &session_id, form.record, ContextAction::ChangeFont(font)).await
}

pub async fn set_color(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Form(form): Form<ColorForm>,
) -> RouteResult<Response> {
    let Some(color) = TextColor::parse(&form.color) else {
        return editor_reply(
            Err(Error::InvalidStyle(format!("unknown color '{}'", form.color))),
            &[],
        );
    };
    context_action(&state, &session_id, form.record, ContextAction::ChangeColor(color)).await
}

pub async fn delete_text(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Form(form): Form<RecordForm>,
) -> RouteResult<Response> {
    context_action(&state, &session_id, form.record, ContextAction::Delete).await
}

/// Undo every edit made since the page was opened.
pub async fn revert_editor(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Response> {
    edit_session(&state, &session_id, |s| {
        apply_edit(s, &session_id, |editor, model| editor.revert(model))
    })
    .await
}

/// Close the editor, keeping its edits.
pub async fn close_editor(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Response> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let (result, closed) = session
        .with_session_mut(|s| {
            let closed = s.editor.take().map(|editor| editor.close());
            (editor_template(s, &session_id), closed.is_some())
        })
        .await
        .or_not_found("Session not found")?;

    let toasts: Vec<Toast> = closed
        .then(|| Toast::success("Changes kept"))
        .into_iter()
        .collect();
    editor_reply(result, &toasts)
}

async fn context_action(
    state: &AppState,
    session_id: &str,
    record: u64,
    action: ContextAction,
) -> RouteResult<Response> {
    edit_session(state, session_id, |s| {
        apply_edit(s, session_id, |editor, model| {
            editor.apply_context_action(model, RecordId(record), action)
        })
    })
    .await
}

/// Run `edit` under the session lock and answer with the editor fragment.
async fn edit_session<F>(state: &AppState, session_id: &str, edit: F) -> RouteResult<Response>
where
    F: FnOnce(&mut Session) -> CoreResult<EditorTemplate>,
{
    let session = state
        .get_session(session_id)
        .await
        .or_not_found("Session not found")?;

    let result = session
        .with_session_mut(edit)
        .await
        .or_not_found("Session not found")?;
    editor_reply(result, &[])
}
