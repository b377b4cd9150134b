// WiFi File Transfer Library
// 局域网文件传输服务核心库

// 配置管理模块
pub mod config;

// 宿主平台协作接口
pub mod platform;

// 本地文件系统模块（根目录、路径解析、浏览、删除）
pub mod filesystem;

// 打包下载模块
pub mod archive;

// 上传接收模块
pub mod uploader;

// Web服务器模块
pub mod server;

// 日志系统
pub mod logging;

// 导出常用类型
pub use archive::{PackageSummary, ZipPackager};
pub use config::AppConfig;
pub use filesystem::{
    DirectoryEntry, DirectoryListing, DirectoryRenderer, FsError, FsErrorCode, PathResolver, ResolvedPath, Root,
    RootRegistry,
};
pub use platform::{HostPlatform, LoggingListener, ServerListener, SystemPlatform};
pub use server::{AppState, FileServer, ServerError, ServerState};
pub use uploader::{UploadIngestor, UploadSummary};
