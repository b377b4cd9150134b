use std::sync::Arc;

use tracing::{error, info};
use wifi_file_transfer::{config::LogConfig, logging, AppConfig, FileServer, LoggingListener, SystemPlatform};

const CONFIG_PATH: &str = "config/app.toml";

/// 加载日志配置
///
/// 日志系统要先于完整配置初始化，这里只读取 [log] 段，失败时返回默认配置
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 🔥 先加载日志配置（必须保持 _log_guard 存活）
    let log_config = load_log_config().await;
    let _log_guard = logging::init_logging(&log_config);

    info!("WiFi File Transfer v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_or_default(CONFIG_PATH).await;
    let platform = Arc::new(SystemPlatform::new(config.storage.clone()));
    let server = FileServer::new(config, platform, Arc::new(LoggingListener));

    let address = server.start().await?;
    info!("在同一网络的设备上打开浏览器访问: {}", address);

    tokio::signal::ctrl_c().await?;
    info!("收到 Ctrl+C，开始优雅关闭...");

    if let Err(e) = server.stop().await {
        error!("关闭服务时出错: {}", e);
    }
    info!("应用已安全退出");

    Ok(())
}
