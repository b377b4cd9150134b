// Web服务器模块

pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod render;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::ServerError;
pub use lifecycle::{FileServer, ServerState};
pub use state::AppState;

/// 构建路由
///
/// `max_upload_bytes` 为 None 时不限制上传请求体大小
pub fn build_router(state: AppState, max_upload_bytes: Option<u64>) -> Router {
    let upload_limit = match max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX)),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/", get(handlers::index))
        .route("/browse", get(handlers::browse))
        .route("/download", get(handlers::download_archive))
        .route("/upload", post(handlers::upload_files).layer(upload_limit))
        .route("/delete", post(handlers::delete_entries))
        // 各根目录的直链：/{root}/{path...}
        .route("/:root/*path", get(handlers::serve_file))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::filesystem::RootRegistry;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use std::fs;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct Fixture {
        storage: TempDir,
        archives: TempDir,
        router: Router,
    }

    /// storage/
    /// ├── a.txt
    /// ├── My Docs/
    /// │   └── b.txt
    /// └── empty/
    fn fixture() -> Fixture {
        let storage = TempDir::new().unwrap();
        let archives = TempDir::new().unwrap();
        fs::write(storage.path().join("a.txt"), "alpha").unwrap();
        fs::create_dir_all(storage.path().join("My Docs")).unwrap();
        fs::write(storage.path().join("My Docs/b.txt"), "bravo").unwrap();
        fs::create_dir_all(storage.path().join("empty")).unwrap();

        let mut config = AppConfig::default();
        config.transfer.archive_dir = archives.path().join("zips");
        let registry = RootRegistry::from_paths([("internal", storage.path())]);
        let router = build_router(AppState::new(registry, &config), None);

        Fixture {
            storage,
            archives,
            router,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> Response {
        router.clone().oneshot(request).await.unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8_lossy(&bytes).to_string()
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    fn archive_count(fx: &Fixture) -> usize {
        fs::read_dir(fx.archives.path().join("zips"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_index_lists_roots() {
        let fx = fixture();
        let response = send(&fx.router, get("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Internal Storage"));
        assert!(html.contains("/browse?root=internal"));
    }

    #[tokio::test]
    async fn test_browse_directory() {
        let fx = fixture();
        let response = send(&fx.router, get("/browse?root=internal&path=My%20Docs")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("b.txt"));
        assert!(html.contains("href=\"/internal/My%20Docs/b.txt\""));
        assert!(html.contains("(up)"));
    }

    #[tokio::test]
    async fn test_browse_missing_is_plain_text() {
        let fx = fixture();
        let response = send(&fx.router, get("/browse?path=nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Directory not found or access denied"));
    }

    #[tokio::test]
    async fn test_browse_escape_rejected() {
        let fx = fixture();
        let response = send(&fx.router, get("/browse?root=internal&path=..%2F..%2Fetc")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_without_paths_creates_no_archive() {
        let fx = fixture();
        let response = send(&fx.router, get("/download?root=internal")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "No files selected for download");
        assert_eq!(archive_count(&fx), 0);
    }

    #[tokio::test]
    async fn test_download_blank_paths_rejected() {
        let fx = fixture();
        let response = send(&fx.router, get("/download?root=internal&paths=&paths=%20")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "No files selected for download");
        assert_eq!(archive_count(&fx), 0);
    }

    #[tokio::test]
    async fn test_download_zip() {
        let fx = fixture();
        let response = send(
            &fx.router,
            get("/download?root=internal&paths=a.txt&paths=My%20Docs&paths=empty&paths=missing.txt"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        assert!(response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("files.zip"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["My Docs/b.txt", "a.txt", "empty/"]);

        let mut content = String::new();
        archive.by_name("a.txt").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "alpha");

        // 响应体析构后临时文件被删除
        assert_eq!(archive_count(&fx), 0);
    }

    #[tokio::test]
    async fn test_download_escape_rejects_whole_request() {
        let fx = fixture();
        let response = send(&fx.router, get("/download?paths=a.txt&paths=..%2Fsecret")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(archive_count(&fx), 0);
    }

    #[tokio::test]
    async fn test_delete_redirects_and_skips_missing() {
        let fx = fixture();
        let request = Request::builder()
            .method("POST")
            .uri("/delete")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("root=internal&currentPath=&paths=a.txt&paths=missing.txt"))
            .unwrap();

        let response = send(&fx.router, request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/browse?root=internal&path=");
        assert!(!fx.storage.path().join("a.txt").exists());
        assert!(fx.storage.path().join("My Docs/b.txt").exists());
    }

    #[tokio::test]
    async fn test_upload_redirects_to_browse() {
        let fx = fixture();
        let body = "--B\r\nContent-Disposition: form-data; name=\"files\"; filename=\"photo.jpg\"\r\n\r\nJPEG\r\n--B--\r\n";
        let request = Request::builder()
            .method("POST")
            .uri("/upload?root=internal&path=My%20Docs")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=B")
            .body(Body::from(body))
            .unwrap();

        let response = send(&fx.router, request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/browse?root=internal&path=My%20Docs");
        assert_eq!(fs::read(fx.storage.path().join("My Docs/photo.jpg")).unwrap(), b"JPEG");
    }

    #[tokio::test]
    async fn test_upload_without_files() {
        let fx = fixture();
        let body = "--B\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--B--\r\n";
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=B")
            .body(Body::from(body))
            .unwrap();

        let response = send(&fx.router, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "No files were uploaded");
    }

    #[tokio::test]
    async fn test_static_file_and_directory() {
        let fx = fixture();
        let response = send(&fx.router, get("/internal/My%20Docs/b.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "bravo");

        let response = send(&fx.router, get("/internal/My%20Docs")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = send(&fx.router, get("/unknown/a.txt")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&fx.router, get("/internal/nope.txt")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_static_symlink_escape_rejected() {
        let fx = fixture();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), fx.storage.path().join("link")).unwrap();

        let response = send(&fx.router, get("/internal/link/secret.txt")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
