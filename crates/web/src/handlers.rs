use crate::AppState;
use crate::error::{ErrorKind, Result, from_library};
use crate::views::Static;
use axum::extract::{Multipart, Path, RawQuery, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use docshelf_library::error::ErrorKind as LibraryErrorKind;
use docshelf_library::{UploadReport, delete_document, document_reference, fetch_document, list_documents, upload_document};
use docshelf_storage::ByteStream;
use futures::TryStreamExt;
use serde::Deserialize;

impl AppState {
    /// Turn a handler result into a response, rendering failures as an
    /// error page.
    fn respond(&self, result: Result<Response>) -> Response {
        match result {
            Ok(response) => response,
            Err(e) => {
                let status = e.status();
                if status.is_server_error() {
                    tracing::error!(error = ?e, "Request failed");
                } else {
                    tracing::debug!(error = ?e, "Request rejected");
                }
                self.error_page(status, &(*e).to_string())
            },
        }
    }

    fn error_page(&self, status: StatusCode, message: &str) -> Response {
        match self.views.error(status, message) {
            Ok(html) => (status, Html(html)).into_response(),
            // The error page itself failed: fall back to plain text.
            Err(e) => {
                tracing::error!(error = ?e, "Could not render error page");
                (status, message.to_string()).into_response()
            },
        }
    }
}

pub(crate) async fn explore(State(state): State<AppState>) -> Response {
    let result = match list_documents(&state.backend).await {
        Ok(records) => state.views.explore(&records, None).map(|html| Html(html).into_response()),
        Err(e) => {
            tracing::warn!(error = ?e, "Could not list documents");
            let message = match &*e {
                LibraryErrorKind::StorageUnavailable => "Document storage is unavailable right now. Please try again later.",
                _ => "The documents could not be listed.",
            };
            state.views.explore(&[], Some(message)).map(|html| (StatusCode::BAD_GATEWAY, Html(html)).into_response())
        },
    };
    state.respond(result)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteForm {
    #[serde(rename = "fileName", default)]
    file_name: String,
}

pub(crate) async fn delete(State(state): State<AppState>, Form(form): Form<DeleteForm>) -> Response {
    let result = from_library(delete_document(&state.backend, &form.file_name).await);
    // Absent documents redirect too: the listing already reflects reality.
    state.respond(result.map(|_| Redirect::to("/explore").into_response()))
}

pub(crate) async fn upload_form(State(state): State<AppState>) -> Response {
    let result = state.views.upload(&UploadReport::new()).map(|html| Html(html).into_response());
    state.respond(result)
}

/// Store every file part in request order. One failed file does not stop the
/// rest; a broken multipart body stops reading but keeps what was stored.
pub(crate) async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut report = UploadReport::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed upload body");
                report.interrupted(e.body_text());
                break;
            },
        };
        // Plain form fields carry no file.
        let Some(declared) = field.file_name().map(str::to_string) else {
            continue;
        };
        let body: ByteStream<'_> = Box::pin(field.map_err(std::io::Error::other));
        let result = upload_document(&state.backend, &declared, body).await;
        report.record(&declared, result);
    }
    tracing::info!(files = report.outcomes().len(), failures = report.failures(), "Upload finished");
    let result = state.views.upload(&report).map(|html| Html(html).into_response());
    state.respond(result)
}

pub(crate) async fn document(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let name = document_reference(query.as_deref());
    let result = state.views.document(&name).map(|html| Html(html).into_response());
    state.respond(result)
}

pub(crate) async fn raw_document(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let result = serve_document(&state, &name).await;
    state.respond(result)
}

async fn serve_document(state: &AppState, name: &str) -> Result<Response> {
    let Some(data) = from_library(fetch_document(&state.backend, name).await)? else {
        exn::bail!(ErrorKind::NotFound(name.to_string()));
    };
    // Header values must be visible ASCII; other characters are dropped from
    // the suggested filename only.
    let file_name: String = name
        .rsplit('/')
        .next()
        .unwrap_or(name)
        .chars()
        .filter(|c| (c.is_ascii_graphic() || *c == ' ') && !matches!(*c, '"' | '\\'))
        .collect();
    let disposition = format!("inline; filename=\"{file_name}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

pub(crate) async fn static_file(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    let result = match Static::load(&file) {
        Some((data, content_type)) => Ok(([(header::CONTENT_TYPE, content_type)], data).into_response()),
        None => Err(exn::Exn::from(ErrorKind::NotFound(format!("/static/{file}")))),
    };
    state.respond(result)
}

pub(crate) async fn not_found(State(state): State<AppState>, uri: Uri) -> Response {
    state.respond(Err(exn::Exn::from(ErrorKind::NotFound(uri.path().to_string()))))
}
