// 单文件直链
//
// 路径同样经过 PathResolver，防止符号链接越界

use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Redirect, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::filesystem::{FsError, FsErrorCode};
use crate::server::render::browse_url;
use crate::server::state::AppState;

/// GET /{root}/{path...}
///
/// 文件交给 ServeFile（支持 Range / Content-Type），目录跳转到浏览页
pub async fn serve_file(
    State(state): State<AppState>,
    Path((root, path)): Path<(String, String)>,
    request: Request,
) -> Response {
    // 直链必须带已注册的根名称，不回退到主存储
    if state.registry.get(&root).is_none() {
        return FsError::new(FsErrorCode::NotFound).with_path(root).into_response();
    }

    let resolved = match state.resolver.resolve(Some(&root), &path) {
        Ok(resolved) => resolved,
        Err(e) => return e.into_response(),
    };

    match tokio::fs::metadata(&resolved.absolute_path).await {
        Ok(metadata) if metadata.is_dir() => {
            Redirect::to(&browse_url(&root, &resolved.relative_path)).into_response()
        }
        Ok(_) => match ServeFile::new(&resolved.absolute_path).oneshot(request).await {
            Ok(response) => response.into_response(),
            Err(never) => match never {},
        },
        Err(e) => FsError::from_io(&e, resolved.relative_path).into_response(),
    }
}
