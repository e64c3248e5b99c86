//! Helper types and traits for cleaner route handlers.
//!
//! Provides extension traits for converting `Option` and `Result` types
//! into HTTP-appropriate error responses, plus the HTML response builders
//! shared by the fragment routes.

use askama::Template;
use axum::{
    body::Body,
    http::{StatusCode, header},
    response::Response,
};
use pdf_combiner_core::{Error, ErrorCategory};

use crate::templates::ToastTemplate;

/// Standard result type for route handlers returning HTML.
pub type RouteResult<T> = Result<T, (StatusCode, String)>;

/// Extension trait for converting `Option<T>` to `RouteResult<T>`.
///
/// Provides convenient methods for returning 404 Not Found when
/// an expected resource (like a session) doesn't exist.
pub trait OptionExt<T> {
    /// Returns the contained value or a 404 Not Found error.
    fn or_not_found(self, msg: &str) -> RouteResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> RouteResult<T> {
        self.ok_or_else(|| (StatusCode::NOT_FOUND, msg.to_string()))
    }
}

/// Extension trait for converting `Result<T, E>` to `RouteResult<T>`.
///
/// Provides convenient methods for converting errors into
/// appropriate HTTP status codes.
pub trait ResultExt<T, E: std::fmt::Display> {
    /// Converts the error to 500 Internal Server Error.
    fn or_internal_error(self) -> RouteResult<T>;

    /// Converts the error to 400 Bad Request.
    fn or_bad_request(self) -> RouteResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T, E> for Result<T, E> {
    fn or_internal_error(self) -> RouteResult<T> {
        self.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }

    fn or_bad_request(self) -> RouteResult<T> {
        self.map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
    }
}

/// HTTP status for a core error returned by a plain (non-HTMX) route.
pub const fn status_for(error: &Error) -> StatusCode {
    match error.category() {
        ErrorCategory::Edit | ErrorCategory::Export => StatusCode::BAD_REQUEST,
        ErrorCategory::Load => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Toast severity, used as a CSS modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Warning,
    Error,
}

impl ToastKind {
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A message shown to the user as an out-of-band toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Error,
            message: message.into(),
        }
    }

    /// Toast for a failed core operation, titled by its category.
    pub fn from_error(error: &Error) -> Self {
        Self::error(format!("{}: {error}", error.category().title()))
    }

    pub fn busy() -> Self {
        Self::warning("Another load or export is still running")
    }

    fn render(&self) -> Result<String, askama::Error> {
        ToastTemplate {
            kind: self.kind.css_class(),
            message: self.message.clone(),
        }
        .render()
    }
}

/// HTML fragment followed by out-of-band toasts.
pub fn fragment(html: String, toasts: &[Toast]) -> RouteResult<Response> {
    let mut body = html;
    for toast in toasts {
        body.push_str(&toast.render().or_internal_error()?);
    }
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(body))
        .or_internal_error()
}

/// Only a toast; the request's own target is left as it is.
///
/// HTMX does not swap error responses, so user-facing failures are sent
/// as 200 with `HX-Reswap: none` and the toast swapped out of band.
pub fn toast_only(toast: &Toast) -> RouteResult<Response> {
    toasts_only(std::slice::from_ref(toast))
}

pub fn toasts_only(toasts: &[Toast]) -> RouteResult<Response> {
    let mut body = String::new();
    for toast in toasts {
        body.push_str(&toast.render().or_internal_error()?);
    }
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .header("HX-Reswap", "none")
        .body(Body::from(body))
        .or_internal_error()
}

/// Redirect after a POST: `HX-Redirect` for HTMX, 303 otherwise.
pub fn redirect(url: &str, is_htmx: bool) -> RouteResult<Response> {
    if is_htmx {
        // HX-Redirect tells HTMX to do a full page navigation
        Response::builder()
            .status(StatusCode::OK)
            .header("HX-Redirect", url)
            .body(Body::empty())
            .or_internal_error()
    } else {
        Response::builder()
            .status(StatusCode::SEE_OTHER)
            .header(header::LOCATION, url)
            .body(Body::empty())
            .or_internal_error()
    }
}
