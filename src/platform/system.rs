// 默认平台实现（桌面 / Linux / 容器环境）

use std::path::PathBuf;

use tracing::info;

use super::{HostPlatform, ServerListener};
use crate::config::{MountDetector, StorageConfig};

/// 基于配置文件和系统探测的平台实现
pub struct SystemPlatform {
    storage: StorageConfig,
}

impl SystemPlatform {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }
}

impl HostPlatform for SystemPlatform {
    fn has_broad_filesystem_access(&self) -> bool {
        self.storage.broad_access
    }

    fn secondary_storage_mounts(&self) -> Vec<PathBuf> {
        // 下标 0 固定为主存储
        let mut mounts = vec![self.storage.primary_dir.clone()];
        mounts.extend(self.storage.secondary_mounts.iter().cloned());

        if self.storage.detect_mounts {
            for path in MountDetector::removable_paths() {
                if !mounts.contains(&path) {
                    mounts.push(path);
                }
            }
        }

        mounts
    }

    fn current_lan_address(&self) -> Option<String> {
        match local_ip_address::local_ip() {
            Ok(ip) => Some(ip.to_string()),
            Err(e) => {
                tracing::warn!("获取局域网地址失败: {}", e);
                None
            }
        }
    }
}

/// 仅记录日志的状态监听器
#[derive(Debug, Default)]
pub struct LoggingListener;

impl ServerListener for LoggingListener {
    fn on_server_started(&self, address: &str) {
        info!("📡 文件传输服务已启动: {}", address);
    }

    fn on_server_stopped(&self) {
        info!("文件传输服务已停止");
    }
}
