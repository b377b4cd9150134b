// HTTP 处理器模块

pub mod browse;
pub mod delete;
pub mod download;
pub mod files;
pub mod index;
pub mod upload;

pub use browse::browse;
pub use delete::delete_entries;
pub use download::download_archive;
pub use files::serve_file;
pub use index::index;
pub use upload::upload_files;

use crate::filesystem::{FsError, FsErrorCode};

/// 在阻塞线程池中执行文件系统操作
pub(crate) async fn run_blocking<T, F>(task: F) -> Result<T, FsError>
where
    F: FnOnce() -> Result<T, FsError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        tracing::error!("后台任务异常退出: {}", e);
        FsError::new(FsErrorCode::Io).with_message(format!("Background task failed: {}", e))
    })?
}

/// 取第一个同名参数
pub(crate) fn first_param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// 取所有同名参数（重复键，如 paths=a&paths=b）
pub(crate) fn all_params<'a>(params: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    params
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect()
}
