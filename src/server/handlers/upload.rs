// 文件上传

use axum::extract::{Multipart, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::warn;

use crate::filesystem::FsError;
use crate::server::error::status_for;
use crate::server::render::browse_url;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub root: Option<String>,
    #[serde(default)]
    pub path: String,
}

/// POST /upload?root=internal&path=Download
///
/// 至少写入一个文件时跳回浏览页，否则返回纯文本说明
pub async fn upload_files(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Response {
    let target = match state.resolver.resolve(query.root.as_deref(), &query.path) {
        Ok(target) => target,
        Err(e) => return upload_failed(e),
    };

    match state.ingestor.ingest(&mut multipart, &target).await {
        Ok(summary) if summary.files_written > 0 => {
            Redirect::to(&browse_url(&target.root.name, &target.relative_path)).into_response()
        }
        Ok(summary) => match summary.failures.into_iter().next() {
            Some(e) => upload_failed(e),
            None => "No files were uploaded".into_response(),
        },
        Err(e) => upload_failed(e),
    }
}

fn upload_failed(err: FsError) -> Response {
    warn!("上传失败: {}", err);
    (status_for(err.code), format!("Upload failed: {}", err)).into_response()
}
