//! HTML pages.
//!
//! Templates are [upon] templates embedded at compile time from
//! `assets/templates/`, compiled once at startup and shared by every request.
//! All interpolated values are HTML-escaped by the default formatter; links
//! are built in Rust (already URL-encoded) and then escaped like everything
//! else.

use crate::error::{ErrorKind, Result};
use axum::http::StatusCode;
use docshelf_library::{BlobRecord, UploadReport, document_link};
use exn::{OptionExt, ResultExt};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use rust_embed::Embed;
use std::borrow::Cow;
use std::fmt::Write;
use time::OffsetDateTime;
use time::macros::format_description;
use upon::{Engine, Value, fmt as upon_fmt};

#[derive(Embed)]
#[folder = "../../assets/templates/"]
struct Templates;

/// Static files served under `/static/`.
#[derive(Embed)]
#[folder = "../../assets/static/"]
pub(crate) struct Static;
impl Static {
    /// File contents and their content type.
    pub(crate) fn load(name: &str) -> Option<(Cow<'static, [u8]>, &'static str)> {
        let content_type = match name.rsplit_once('.').map(|(_, ext)| ext) {
            Some("css") => "text/css; charset=utf-8",
            Some("js") => "text/javascript; charset=utf-8",
            Some("svg") => "image/svg+xml",
            _ => "application/octet-stream",
        };
        Self::get(name).map(|file| (file.data, content_type))
    }
}

/// Characters escaped in a path segment of the raw document route.
const SEGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'<').add(b'>').add(b'?').add(b'`').add(b'{').add(b'}');

/// Path of the raw document route for `name`, each segment percent-encoded.
pub fn blob_path(name: &str) -> String {
    let segments: Vec<String> = name.split('/').map(|segment| utf8_percent_encode(segment, SEGMENT).to_string()).collect();
    format!("/blobs/{}", segments.join("/"))
}

fn format_timestamp(timestamp: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    timestamp
        .to_offset(time::UtcOffset::UTC)
        .format(format)
        .unwrap_or_else(|_| timestamp.unix_timestamp().to_string())
}

/// Compiled page templates.
pub struct Views {
    engine: Engine<'static>,
}

impl Views {
    /// Compile every embedded template.
    pub fn new() -> Result<Self> {
        let mut engine = Engine::new();
        engine.set_default_formatter(&escape_html);
        for name in Templates::iter() {
            let file = Templates::get(&name).ok_or_raise(|| ErrorKind::Template)?;
            let source = String::from_utf8(file.data.into_owned()).or_raise(|| ErrorKind::Template)?;
            // Templates are named without their extension: `explore.html` is `explore`.
            let key = name.strip_suffix(".html").unwrap_or(&name).to_string();
            engine.add_template(key, source).or_raise(|| ErrorKind::Template)?;
        }
        tracing::debug!(templates = Templates::iter().count(), "Compiled templates");
        Ok(Self { engine })
    }

    fn render(&self, template: &str, context: Value) -> Result<String> {
        self.engine.template(template).render(context).to_string().or_raise(|| ErrorKind::Template)
    }

    /// The document listing. With `error` set, the table is shown empty
    /// alongside the message.
    pub fn explore(&self, records: &[BlobRecord], error: Option<&str>) -> Result<String> {
        let documents: Vec<Value> = records
            .iter()
            .map(|record| {
                upon::value! {
                    name: record.name.as_str(),
                    size: record.size_display(),
                    modified: format_timestamp(record.last_modified),
                    view_url: document_link(&record.name),
                    raw_url: blob_path(&record.name),
                }
            })
            .collect();
        self.render(
            "explore",
            upon::value! {
                title: "Documents",
                documents: documents,
                error: error,
            },
        )
    }

    /// The upload form, with one note per file of the previous upload.
    pub fn upload(&self, report: &UploadReport) -> Result<String> {
        let notes: Vec<Value> = report
            .outcomes()
            .iter()
            .map(|outcome| {
                upon::value! {
                    text: outcome.to_string(),
                    failed: outcome.is_failure(),
                }
            })
            .collect();
        self.render(
            "upload",
            upon::value! {
                title: "Upload",
                notes: notes,
            },
        )
    }

    /// The viewer page; an empty `name` renders the "nothing selected" state.
    pub fn document(&self, name: &str) -> Result<String> {
        let raw_url = (!name.is_empty()).then(|| blob_path(name));
        let title = if name.is_empty() { "Document" } else { name };
        self.render(
            "document",
            upon::value! {
                title: title,
                name: name,
                raw_url: raw_url,
            },
        )
    }

    pub fn error(&self, status: StatusCode, message: &str) -> Result<String> {
        let title = status.canonical_reason().unwrap_or("Error");
        self.render(
            "error",
            upon::value! {
                title: title,
                status: i64::from(status.as_u16()),
                message: message,
            },
        )
    }
}

/// Default formatter: like upon's, but HTML-escaped.
fn escape_html(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
    let mut raw = String::new();
    match value {
        Value::String(s) => raw.push_str(s),
        Value::None => {},
        Value::Bool(b) => write!(raw, "{b}")?,
        Value::Integer(n) => write!(raw, "{n}")?,
        Value::Float(n) => write!(raw, "{n}")?,
        v => return upon_fmt::default(f, v),
    }
    for c in raw.chars() {
        match c {
            '&' => f.write_str("&amp;")?,
            '<' => f.write_str("&lt;")?,
            '>' => f.write_str("&gt;")?,
            '"' => f.write_str("&quot;")?,
            '\'' => f.write_str("&#x27;")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshelf_library::{UploadReport, Uploaded};
    use rstest::rstest;
    use time::macros::datetime;

    #[rstest]
    #[case("report.pdf", "/blobs/report.pdf")]
    #[case("Q1 report #2?.pdf", "/blobs/Q1%20report%20%232%3F.pdf")]
    #[case("2024/march.pdf", "/blobs/2024/march.pdf")]
    #[case("100%.pdf", "/blobs/100%25.pdf")]
    fn test_blob_path(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(blob_path(name), expected);
    }

    #[test]
    fn test_all_templates_compile() {
        Views::new().unwrap();
    }

    #[test]
    fn test_explore_escapes_names() {
        let views = Views::new().unwrap();
        let records = [BlobRecord {
            name: "<script>alert(1)</script>.pdf".into(),
            last_modified: datetime!(2024-01-02 10:30 UTC),
            size_bytes: 1536,
        }];
        let html = views.explore(&records, None).unwrap();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;.pdf"));
        assert!(html.contains("1.5 KB"));
        assert!(html.contains("2024-01-02 10:30:00 UTC"));
    }

    #[test]
    fn test_explore_error_state() {
        let views = Views::new().unwrap();
        let html = views.explore(&[], Some("Storage is unavailable")).unwrap();
        assert!(html.contains("Storage is unavailable"));
    }

    #[test]
    fn test_upload_notes() {
        let views = Views::new().unwrap();
        let mut report = UploadReport::new();
        report.record("a.pdf", Ok(Some(Uploaded { name: "a.pdf".into(), size: 3 })));
        let html = views.upload(&report).unwrap();
        assert!(html.contains("a.pdf uploaded."));
    }

    #[test]
    fn test_document_embeds_raw_route() {
        let views = Views::new().unwrap();
        let html = views.document("Q1 report.pdf").unwrap();
        assert!(html.contains(r#"src="/blobs/Q1%20report.pdf""#));
        let empty = views.document("").unwrap();
        assert!(!empty.contains("<iframe"));
    }

    #[test]
    fn test_static_stylesheet() {
        let (data, content_type) = Static::load("style.css").unwrap();
        assert!(!data.is_empty());
        assert!(content_type.starts_with("text/css"));
        assert!(Static::load("missing.css").is_none());
    }
}
