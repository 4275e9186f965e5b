//! HTTP API tests.
//!
//! Drive the full router in-process with `tower::ServiceExt::oneshot`.

use std::fs;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use protocol::{ErrorCode, ErrorMessage, ListResponse, ManifestResponse};
use server::{router, AppState, PathSandbox, SessionGate};
use tempfile::TempDir;
use tower::ServiceExt;

const PASSWORD: &str = "040805";

struct TestServer {
    app: Router,
    cookie: String,
    _temp_dir: TempDir,
}

impl TestServer {
    /// Share root:
    /// ```text
    /// docs/
    ///   readme.md
    ///   2024/report.pdf
    /// photos/
    /// notes.txt
    /// résumé.txt
    /// ```
    fn new() -> Self {
        Self::build(|sandbox| sandbox)
    }

    /// Same tree plus `.env` and `.git/config`, with hidden names disallowed.
    fn without_hidden() -> Self {
        Self::build(|sandbox| {
            fs::write(sandbox.root().join(".env"), "SECRET=1").unwrap();
            fs::create_dir_all(sandbox.root().join(".git")).unwrap();
            fs::write(sandbox.root().join(".git/config"), "[core]").unwrap();
            sandbox.allow_hidden(false)
        })
    }

    fn build(configure: impl FnOnce(PathSandbox) -> PathSandbox) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("docs/2024")).unwrap();
        fs::create_dir_all(root.join("photos")).unwrap();
        fs::write(root.join("docs/readme.md"), "# readme").unwrap();
        fs::write(root.join("docs/2024/report.pdf"), vec![7u8; 200_000]).unwrap();
        fs::write(root.join("notes.txt"), "hello world").unwrap();
        fs::write(root.join("résumé.txt"), "cv").unwrap();

        let gate = SessionGate::new(PASSWORD, "auth");
        let cookie = gate
            .login_cookie()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let sandbox = configure(PathSandbox::new(root).unwrap());
        let state = AppState::new(sandbox, gate);

        Self {
            app: router(Arc::new(state)),
            cookie,
            _temp_dir: temp_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(
            Request::get(uri)
                .header(header::COOKIE, &self.cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn get_anonymous(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Session gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_gate_redirects_anonymous_requests() {
    let server = TestServer::new();

    for uri in [
        "/",
        "/browse",
        "/api/list?path=docs",
        "/api/folder-files?path=docs",
        "/download?path=notes.txt",
    ] {
        let response = server.get_anonymous(uri).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/login", "{uri}");
    }
}

#[tokio::test]
async fn test_gate_rejects_forged_cookie() {
    let server = TestServer::new();

    let response = server
        .send(
            Request::get("/api/list")
                .header(header::COOKIE, "auth=ok")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_page_is_public() {
    let server = TestServer::new();

    let response = server.get_anonymous("/login").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("type=\"password\""));
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let server = TestServer::new();

    let response = server
        .send(
            Request::post("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("password={PASSWORD}")))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/browse");
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));

    // The issued cookie opens the gate.
    let cookie = set_cookie.split(';').next().unwrap();
    assert_eq!(cookie, server.cookie);
    let response = server.get("/api/list").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let server = TestServer::new();

    let response = server
        .send(
            Request::post("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("password=wrong"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert!(body_text(response).await.contains("Wrong password"));
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let server = TestServer::new();

    let response = server.get("/logout").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    let set_cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(set_cookie.to_str().unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn test_index_redirects_to_browse() {
    let server = TestServer::new();

    let response = server.get("/").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/browse");
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_api_list_root() {
    let server = TestServer::new();

    let response = server.get("/api/list").await;
    assert_eq!(response.status(), StatusCode::OK);

    let listing: ListResponse = body_json(response).await;
    assert_eq!(listing.path, "");
    assert_eq!(listing.parent, None);
    let dirs: Vec<_> = listing.dirs.iter().map(|e| e.name.as_str()).collect();
    let files: Vec<_> = listing.files.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(dirs, vec!["docs", "photos"]);
    assert_eq!(files, vec!["notes.txt", "résumé.txt"]);
}

#[tokio::test]
async fn test_api_list_normalizes_path() {
    let server = TestServer::new();

    let response = server.get("/api/list?path=.%2Fdocs%2F%2F2024%2F").await;
    assert_eq!(response.status(), StatusCode::OK);

    let listing: ListResponse = body_json(response).await;
    assert_eq!(listing.path, "docs/2024");
    assert_eq!(listing.parent.as_deref(), Some("docs"));
    assert_eq!(listing.files.len(), 1);
    assert_eq!(listing.files[0].name, "report.pdf");
}

#[tokio::test]
async fn test_api_list_errors() {
    let server = TestServer::new();

    let cases = [
        ("/api/list?path=..%2F..%2Fetc", StatusCode::BAD_REQUEST, ErrorCode::InvalidPath),
        ("/api/list?path=missing", StatusCode::NOT_FOUND, ErrorCode::NotFound),
        ("/api/list?path=notes.txt", StatusCode::BAD_REQUEST, ErrorCode::NotADirectory),
    ];

    for (uri, status, code) in cases {
        let response = server.get(uri).await;
        assert_eq!(response.status(), status, "{uri}");
        let error: ErrorMessage = body_json(response).await;
        assert_eq!(error.code, code, "{uri}");
    }
}

#[tokio::test]
async fn test_error_body_hides_root() {
    let server = TestServer::new();
    let root = server._temp_dir.path().to_string_lossy().to_string();

    let response = server.get("/api/list?path=missing").await;
    let text = body_text(response).await;
    assert!(!text.contains(&root));
}

#[tokio::test]
async fn test_browse_page() {
    let server = TestServer::new();

    let response = server.get("/browse?path=docs").await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/html"));

    let html = body_text(response).await;
    assert!(html.contains("/browse?path=docs%2F2024"));
    assert!(html.contains("/download?path=docs%2Freadme.md"));
    assert!(html.contains("batchDownloadFolder"));
    assert!(html.contains("/browse?path=\">&larr; Up"));
}

#[tokio::test]
async fn test_browse_traversal_is_plain_text_error() {
    let server = TestServer::new();

    let response = server.get("/browse?path=..").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "invalid path");
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_folder_files() {
    let server = TestServer::new();

    let response = server.get("/api/folder-files?path=docs").await;
    assert_eq!(response.status(), StatusCode::OK);

    let manifest: ManifestResponse = body_json(response).await;
    assert_eq!(manifest.files, vec!["docs/readme.md", "docs/2024/report.pdf"]);
}

#[tokio::test]
async fn test_folder_files_empty_and_errors() {
    let server = TestServer::new();

    let manifest: ManifestResponse = body_json(server.get("/api/folder-files?path=photos").await).await;
    assert!(manifest.files.is_empty());

    let response = server.get("/api/folder-files?path=..").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server.get("/api/folder-files?path=nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_download_file() {
    let server = TestServer::new();

    let response = server.get("/download?path=notes.txt").await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "11");
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "application/octet-stream"
    );
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"notes.txt\"; filename*=UTF-8''notes.txt"
    );
    assert_eq!(body_bytes(response).await, b"hello world");
}

#[tokio::test]
async fn test_download_large_file() {
    let server = TestServer::new();

    let response = server.get("/download?path=docs%2F2024%2Freport.pdf").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "200000");

    let body = body_bytes(response).await;
    assert_eq!(body.len(), 200_000);
    assert!(body.iter().all(|&b| b == 7));
}

#[tokio::test]
async fn test_download_unicode_name() {
    let server = TestServer::new();

    let response = server.get("/download?path=r%C3%A9sum%C3%A9.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.txt"));
    assert_eq!(body_bytes(response).await, b"cv");
}

#[tokio::test]
async fn test_download_errors() {
    let server = TestServer::new();

    let cases = [
        ("/download?path=docs", StatusCode::BAD_REQUEST),
        ("/download", StatusCode::BAD_REQUEST),
        ("/download?path=missing.txt", StatusCode::NOT_FOUND),
        ("/download?path=..%2F..%2Fetc%2Fpasswd", StatusCode::BAD_REQUEST),
        ("/download?path=docs%2F..%2F..%2Fnotes.txt", StatusCode::BAD_REQUEST),
    ];

    for (uri, status) in cases {
        let response = server.get(uri).await;
        assert_eq!(response.status(), status, "{uri}");
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    }
}

#[tokio::test]
async fn test_download_dot_segments_inside_root() {
    let server = TestServer::new();

    let response = server.get("/download?path=docs%2F..%2Fnotes.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"hello world");
}

#[tokio::test]
async fn test_hidden_entries_unreachable_when_disallowed() {
    let server = TestServer::without_hidden();

    let listing: ListResponse = body_json(server.get("/api/list").await).await;
    assert!(listing.dirs.iter().all(|e| !e.name.starts_with('.')));
    assert!(listing.files.iter().all(|e| !e.name.starts_with('.')));

    let manifest: ManifestResponse = body_json(server.get("/api/folder-files").await).await;
    assert!(manifest.files.iter().all(|p| !p.starts_with('.')));

    for uri in [
        "/download?path=.env",
        "/download?path=.git%2Fconfig",
        "/download?path=docs%2F..%2F.env",
        "/api/list?path=.git",
        "/api/folder-files?path=.git",
        "/browse?path=.git",
    ] {
        let response = server.get(uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert!(!body_text(response).await.contains("SECRET"), "{uri}");
    }

    let response = server.get("/download?path=notes.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
}
