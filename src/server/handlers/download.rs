// 多文件打包下载

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::info;

use super::{all_params, first_param, run_blocking};
use crate::archive::{ArchiveStream, PackageSummary, TempArchive};
use crate::filesystem::{FsError, FsErrorCode};
use crate::server::state::AppState;

/// GET /download?root=internal&paths=a.txt&paths=DCIM
///
/// 打包为 files.zip 返回；临时文件随响应体析构删除
pub async fn download_archive(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, FsError> {
    let root = first_param(&params, "root");
    // 空值（paths=）不算选中
    let paths: Vec<&str> = all_params(&params, "paths")
        .into_iter()
        .filter(|path| !path.trim().is_empty())
        .collect();

    if paths.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "No files selected for download").into_response());
    }

    // 任意一个路径越界都拒绝整个请求
    let sources = paths
        .iter()
        .map(|path| state.resolver.resolve(root, path))
        .collect::<Result<Vec<_>, _>>()?;

    tokio::fs::create_dir_all(state.archive_dir.as_ref())
        .await
        .map_err(|e| FsError::from_io(&e, state.archive_dir.to_string_lossy().to_string()))?;

    let packager = state.packager.clone();
    let archive_dir = state.archive_dir.clone();
    let archive = run_blocking(move || {
        build_archive(&archive_dir, |writer| packager.package(&sources, writer))
    })
    .await?;

    let path = archive.path().to_string_lossy().to_string();
    let stream = ArchiveStream::open(archive)
        .await
        .map_err(|e| FsError::from_io(&e, path))?;

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
        (
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"files.zip\""),
        ),
        (header::CONTENT_LENGTH, HeaderValue::from(stream.len())),
    ];

    Ok((headers, Body::from_stream(stream)).into_response())
}

/// 在临时目录中生成压缩包；失败时临时文件随 TempArchive 一起删除
fn build_archive<F>(dir: &Path, fill: F) -> Result<TempArchive, FsError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<PackageSummary, FsError>,
{
    let (archive, file) = TempArchive::create(dir)
        .map_err(|e| FsError::from_io(&e, dir.to_string_lossy().to_string()))?;

    let write_error =
        |e: std::io::Error| FsError::new(FsErrorCode::Io).with_message(format!("Failed to write archive: {}", e));

    let mut writer = BufWriter::new(file);
    let summary = fill(&mut writer)?;
    // 被撤销的条目可能在目录区之后留下残余字节
    let end = writer.stream_position().map_err(write_error)?;
    writer.flush().map_err(write_error)?;
    writer.get_ref().set_len(end).map_err(write_error)?;

    info!(
        "压缩包已生成: {:?}, 条目 {} 个, 跳过 {} 个",
        archive.path(),
        summary.entries_written,
        summary.skipped.len()
    );
    Ok(archive)
}
