use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use docshelf_config::{Config, ServerConfig, StorageConfig};
use docshelf_storage::StorageBackend;
use docshelf_storage::backend::MockBackend;
use docshelf_web::{AppState, router};
use std::sync::Arc;
use time::macros::datetime;
use tower::ServiceExt;

const BOUNDARY: &str = "docshelf-test-boundary";

fn app_with_limit(backend: MockBackend, upload_limit: u64) -> (Router, Arc<MockBackend>) {
    let mock = Arc::new(backend);
    let config = Config {
        server: ServerConfig { upload_limit, ..ServerConfig::default() },
        storage: StorageConfig::Local { root: "/unused".into() },
    };
    let state = AppState::new(config, mock.clone()).unwrap();
    (router(state), mock)
}

fn app(backend: MockBackend) -> (Router, Arc<MockBackend>) {
    app_with_limit(backend, ServerConfig::default().upload_limit)
}

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap()
}

async fn text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn multipart(files: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    for (file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"postedFiles\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn delete_form(file_name: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/explore/delete")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("fileName={file_name}")))
        .unwrap()
}

#[tokio::test]
async fn test_listing_shows_pdfs_newest_first() {
    let (app, _) = app(MockBackend::with_files_at([
        ("older.pdf", Vec::from(*b"1"), datetime!(2024-01-01 0:00 UTC)),
        ("notes.txt", Vec::from(*b"2"), datetime!(2024-06-01 0:00 UTC)),
        ("Newer.PDF", vec![0u8; 2048], datetime!(2024-03-01 0:00 UTC)),
    ]));
    let response = get(app, "/explore").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = text(response).await;
    let newer = html.find("Newer.PDF").unwrap();
    let older = html.find("older.pdf").unwrap();
    assert!(newer < older);
    assert!(!html.contains("notes.txt"));
    assert!(html.contains("2 KB"));
    assert!(html.contains("/document?fn=Newer.PDF"));
}

#[tokio::test]
async fn test_root_is_the_listing() {
    let (app, _) = app(MockBackend::with_files([("a.pdf", Vec::from(*b"1"))]));
    let response = get(app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("a.pdf"));
}

#[tokio::test]
async fn test_listing_when_storage_is_down() {
    let (app, _) = app(MockBackend::default().unavailable());
    let response = get(app, "/explore").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(text(response).await.contains("unavailable"));
}

#[tokio::test]
async fn test_delete_redirects_to_listing() {
    let (app, mock) = app(MockBackend::with_files([("a.pdf", Vec::from(*b"1"))]));
    let response = app.clone().oneshot(delete_form("a.pdf")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/explore");
    assert!(!mock.exists("a.pdf").await.unwrap());

    // Deleting again is still a redirect, not an error.
    let response = app.oneshot(delete_form("a.pdf")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_delete_without_name_is_a_bad_request() {
    let (app, _) = app(MockBackend::default());
    let response = app.oneshot(delete_form("")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_form() {
    let (app, _) = app(MockBackend::default());
    let response = get(app, "/upload").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains(r#"name="postedFiles""#));
}

#[tokio::test]
async fn test_upload_stores_files_and_reports_each() {
    let (app, mock) = app(MockBackend::default().with_failing_writes(["b.pdf"]));
    let request = multipart(&[("a.pdf", "%PDF-a"), ("b.pdf", "%PDF-b"), ("", ""), ("c.pdf", "%PDF-c")]);
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = text(response).await;
    assert!(html.contains("a.pdf uploaded."));
    assert!(html.contains("b.pdf could not be uploaded"));
    assert!(html.contains("c.pdf uploaded."));

    assert_eq!(mock.read("a.pdf").await.unwrap(), b"%PDF-a");
    assert_eq!(mock.content_type("c.pdf").await.as_deref(), Some("application/pdf"));
    assert!(!mock.exists("b.pdf").await.unwrap());
    assert_eq!(mock.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_upload_overwrites() {
    let (app, mock) = app(MockBackend::with_files([("a.pdf", Vec::from(*b"old"))]));
    let response = app.oneshot(multipart(&[("a.pdf", "newer contents")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.read("a.pdf").await.unwrap(), b"newer contents");
    assert_eq!(mock.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_over_the_limit_stores_nothing() {
    let (app, mock) = app_with_limit(MockBackend::default(), 64);
    let big = "x".repeat(4096);
    let response = app.oneshot(multipart(&[("big.pdf", big.as_str())])).await.unwrap();
    let html = text(response).await;
    assert!(html.contains("could not be uploaded"));
    assert!(!mock.exists("big.pdf").await.unwrap());
}

#[tokio::test]
async fn test_upload_with_broken_body() {
    let (app, mock) = app(MockBackend::default());
    let request = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from("this is not a multipart body"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = text(response).await;
    assert!(html.contains("The rest of the upload could not be read"));
    assert!(!html.contains("Upload could not be uploaded"));
    assert!(mock.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_document_page_decodes_name_once() {
    let (app, _) = app(MockBackend::default());
    let response = get(app, "/document?fn=Q1+report%2541.pdf").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = text(response).await;
    assert!(html.contains("Q1 report%41.pdf"));
    assert!(html.contains(r#"src="/blobs/Q1%20report%2541.pdf""#));
}

#[tokio::test]
async fn test_document_page_without_name() {
    let (app, _) = app(MockBackend::default());
    let response = get(app, "/document").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("No document selected"));
}

#[tokio::test]
async fn test_raw_document() {
    let (app, _) = app(MockBackend::with_files([("Q1 report.pdf", Vec::from(*b"%PDF-1.7"))]));
    let response = get(app.clone(), "/blobs/Q1%20report.pdf").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(text(response).await, "%PDF-1.7");

    let response = get(app, "/blobs/missing.pdf").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_and_fallback() {
    let (app, _) = app(MockBackend::default());
    let response = get(app.clone(), "/static/style.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/css"));

    assert_eq!(get(app.clone(), "/static/nope.css").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(app, "/no/such/page").await.status(), StatusCode::NOT_FOUND);
}
