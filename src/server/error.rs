//! Mapping of pipeline errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use hyper::ext::ReasonPhrase;

use crate::error::ZipMetaError;

/// Opaque message returned for internal failures.
pub const INTERNAL_MESSAGE: &str = "Unknown error happened";

/// Build the response for a failed request.
///
/// Validation errors produce their status with an empty body and the message
/// as reason phrase. Internal errors are logged in full; the client only sees
/// an opaque message unless `expose_diagnostics` asks for the escaped error
/// chain.
pub fn error_response(err: ZipMetaError, expose_diagnostics: bool) -> Response {
    match err {
        ZipMetaError::Validation { status, message } => {
            tracing::debug!(%status, reason = message, "rejected request");
            with_reason(status.into_response(), message)
        }
        ZipMetaError::Internal(err) => {
            tracing::error!(error = ?err, "request failed");
            let response = if expose_diagnostics {
                let trace = escape_html(&format!("{:?}", err));
                (StatusCode::INTERNAL_SERVER_ERROR, Html(format!("<pre>{}</pre>", trace)))
                    .into_response()
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE).into_response()
            };
            with_reason(response, INTERNAL_MESSAGE)
        }
    }
}

fn with_reason(mut response: Response, message: &str) -> Response {
    if let Ok(reason) = ReasonPhrase::try_from(message.as_bytes()) {
        response.extensions_mut().insert(reason);
    }
    response
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
