// 配置管理模块

pub mod mount_detector;
pub mod path_validator;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub use mount_detector::{MountDetector, MountPoint};
pub use path_validator::{PathValidationResult, PathValidator};

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 存储根目录配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 文件系统浏览配置
    #[serde(default)]
    pub filesystem: FilesystemConfig,
    /// 打包/上传配置
    #[serde(default)]
    pub transfer: TransferConfig,
    /// 🔥 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 50MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址（局域网共享，默认监听所有网卡）
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// 具名路径（用于提权后才开放的根目录）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPath {
    pub name: String,
    pub path: PathBuf,
}

impl NamedPath {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// 存储根目录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 主存储目录，始终以 "internal" 名称开放
    #[serde(default = "default_primary_dir")]
    pub primary_dir: PathBuf,
    /// 宿主是否已授予完整文件系统访问权限
    #[serde(default)]
    pub broad_access: bool,
    /// 仅在完整访问权限下开放的根目录
    #[serde(default = "default_elevated_roots")]
    pub elevated_roots: Vec<NamedPath>,
    /// 额外的辅助存储目录（可移动介质）
    #[serde(default)]
    pub secondary_mounts: Vec<PathBuf>,
    /// 是否自动探测挂载点
    #[serde(default = "default_detect_mounts")]
    pub detect_mounts: bool,
    /// 辅助存储目录中需要剥离的应用私有后缀标记
    #[serde(default = "default_app_private_marker")]
    pub app_private_marker: String,
}

fn default_primary_dir() -> PathBuf {
    dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_elevated_roots() -> Vec<NamedPath> {
    vec![NamedPath::new("root", "/"), NamedPath::new("system", "/system")]
}

fn default_detect_mounts() -> bool {
    true
}

fn default_app_private_marker() -> String {
    "/Android".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            primary_dir: default_primary_dir(),
            broad_access: false,
            elevated_roots: default_elevated_roots(),
            secondary_mounts: Vec::new(),
            detect_mounts: default_detect_mounts(),
            app_private_marker: default_app_private_marker(),
        }
    }
}

/// 文件系统浏览配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemConfig {
    /// 是否显示隐藏文件
    #[serde(default = "default_show_hidden")]
    pub show_hidden: bool,
    /// 是否跟随符号链接
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_show_hidden() -> bool {
    true
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            show_hidden: default_show_hidden(),
            follow_symlinks: false,
        }
    }
}

/// 打包下载与上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// 临时 ZIP 存放目录
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
    /// 上传请求体大小上限（字节），None 表示不限制
    #[serde(default)]
    pub max_upload_bytes: Option<u64>,
}

fn default_archive_dir() -> PathBuf {
    std::env::temp_dir().join("wifi-file-transfer")
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir(),
            max_upload_bytes: None,
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        if !config.storage.primary_dir.is_absolute() {
            anyhow::bail!(
                "主存储目录必须是绝对路径: {:?}",
                config.storage.primary_dir
            );
        }

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        Ok(())
    }

    /// 加载配置，失败时使用默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("已加载配置文件: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("加载配置文件失败，使用默认配置: {:#}", e);
                Self::default()
            }
        }
    }
}
