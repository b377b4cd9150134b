// 文件系统模块数据类型定义

use std::io;
use std::path::{Path, PathBuf};

/// 文件系统错误码
/// 错误码范围：50001 - 50099
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorCode {
    /// 路径穿越（试图访问根目录之外）
    PathEscape = 50001,
    /// 根目录或路径不存在
    NotFound = 50002,
    /// 存在但无权读写
    AccessDenied = 50003,
    /// 不是目录
    NotADirectory = 50004,
    /// 路径格式无效
    InvalidPathFormat = 50005,
    /// 单个上传分段解析或写入失败
    UploadPartFailure = 50006,
    /// 单个源路径无法加入压缩包
    PackagingPartialFailure = 50007,
    /// 其他 IO 错误
    Io = 50008,
}

impl FsErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::PathEscape => "Path escapes the storage root",
            Self::NotFound => "Not found",
            Self::AccessDenied => "Access denied",
            Self::NotADirectory => "Not a directory",
            Self::InvalidPathFormat => "Invalid path",
            Self::UploadPartFailure => "Upload part failed",
            Self::PackagingPartialFailure => "Entry could not be added to the archive",
            Self::Io => "I/O error",
        }
    }
}

/// 文件系统错误
#[derive(Debug)]
pub struct FsError {
    pub code: FsErrorCode,
    pub message: String,
    pub path: Option<String>,
}

impl FsError {
    pub fn new(code: FsErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// 将 IO 错误映射为文件系统错误码
    pub fn from_io(err: &io::Error, path: impl Into<String>) -> Self {
        let code = match err.kind() {
            io::ErrorKind::NotFound => FsErrorCode::NotFound,
            io::ErrorKind::PermissionDenied => FsErrorCode::AccessDenied,
            _ => FsErrorCode::Io,
        };
        Self::new(code)
            .with_message(format!("{}: {}", code.message(), err))
            .with_path(path)
    }

    /// 以新的错误码包装（保留原因）
    pub fn reclassify(self, code: FsErrorCode) -> Self {
        Self {
            message: format!("{}: {}", code.message(), self.message),
            code,
            path: self.path,
        }
    }
}

impl std::fmt::Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.path {
            Some(ref path) if !path.is_empty() => write!(f, "{}: {}", self.message, path),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for FsError {}

/// 存储根目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    /// 唯一名称（如 "internal"、"sdcard1"）
    pub name: String,
    /// 规范化后的绝对路径
    pub base_path: PathBuf,
}

/// 经过校验的路径，保证位于所属根目录之内
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub root: Root,
    /// 相对根目录的路径，使用 '/' 分隔，根目录本身为空串
    pub relative_path: String,
    pub absolute_path: PathBuf,
}

impl ResolvedPath {
    /// 是否为根目录本身
    pub fn is_root(&self) -> bool {
        self.relative_path.is_empty()
    }

    /// 最后一级名称，根目录返回根名称
    pub fn file_name(&self) -> String {
        self.relative_path
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.root.name)
            .to_string()
    }

    /// 父目录的相对路径，根目录返回 None
    pub fn parent_relative(&self) -> Option<String> {
        if self.is_root() {
            return None;
        }
        Some(
            self.relative_path
                .rsplit_once('/')
                .map(|(parent, _)| parent.to_string())
                .unwrap_or_default(),
        )
    }

    /// 拼接子条目的相对路径
    pub fn child_relative(&self, name: &str) -> String {
        if self.is_root() {
            name.to_string()
        } else {
            format!("{}/{}", self.relative_path, name)
        }
    }
}

/// 目录条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// 文件名
    pub name: String,
    pub is_directory: bool,
    /// 相对浏览根目录的路径
    pub relative_path: String,
    /// 文件大小（文件夹为 None）
    pub size: Option<u64>,
    /// 图标建议
    pub icon: Option<&'static str>,
}

/// 单个目录的浏览结果
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    pub location: ResolvedPath,
    /// 返回上级的相对路径，位于根目录时为 None
    pub parent: Option<String>,
    pub entries: Vec<DirectoryEntry>,
}

/// 获取文件扩展名对应的图标建议
pub fn get_icon_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let icon = match ext.as_str() {
        // 图片
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "svg" | "heic" => "image",
        // 视频
        "mp4" | "mkv" | "avi" | "mov" | "wmv" | "flv" | "webm" | "3gp" => "video",
        // 音频
        "mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a" | "opus" => "audio",
        // 文档
        "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "odt" => "document",
        "txt" | "md" | "rtf" | "log" | "csv" => "text",
        // 压缩包
        "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" => "archive",
        // 安装包
        "apk" | "exe" | "msi" | "deb" | "rpm" | "sh" => "executable",
        _ => return None,
    };
    Some(icon)
}
