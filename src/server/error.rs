// 服务器错误与 HTTP 错误响应

use std::io;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::filesystem::{FsError, FsErrorCode};

/// 服务生命周期错误
#[derive(Debug, Error)]
pub enum ServerError {
    /// 没有任何可用的存储根目录
    #[error("no storage root is available, check storage.primary_dir")]
    NoRoots,

    /// 端口被占用等绑定失败
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 临时压缩包目录不可用
    #[error("archive directory {path:?} is not usable: {message}")]
    ArchiveDir { path: PathBuf, message: String },

    /// 监听地址格式错误
    #[error("invalid listen address: {0}")]
    InvalidAddress(String),

    /// 服务运行期间的 IO 错误
    #[error("server error: {0}")]
    Serve(#[from] io::Error),
}

/// 文件系统错误码对应的 HTTP 状态码
pub fn status_for(code: FsErrorCode) -> StatusCode {
    match code {
        FsErrorCode::PathEscape => StatusCode::BAD_REQUEST,
        FsErrorCode::InvalidPathFormat => StatusCode::BAD_REQUEST,
        FsErrorCode::NotADirectory => StatusCode::BAD_REQUEST,
        FsErrorCode::NotFound => StatusCode::NOT_FOUND,
        FsErrorCode::AccessDenied => StatusCode::FORBIDDEN,
        FsErrorCode::UploadPartFailure => StatusCode::INTERNAL_SERVER_ERROR,
        FsErrorCode::PackagingPartialFailure => StatusCode::INTERNAL_SERVER_ERROR,
        FsErrorCode::Io => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 纯文本错误响应（浏览器直接展示给使用者）
impl IntoResponse for FsError {
    fn into_response(self) -> Response {
        (status_for(self.code), self.to_string()).into_response()
    }
}
