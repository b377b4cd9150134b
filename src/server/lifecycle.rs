// 服务生命周期
//
// Stopped -> start() -> Running -> stop() -> Stopped

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::error::ServerError;
use super::state::AppState;
use crate::archive::sweep_stale_archives;
use crate::config::{AppConfig, PathValidator};
use crate::filesystem::RootRegistry;
use crate::platform::{HostPlatform, ServerListener};

/// 优雅关闭等待时间，超时后强制中止
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// 服务状态快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerState {
    pub listening: bool,
    /// 供其他设备访问的地址，如 http://192.168.1.5:8080
    pub bound_address: Option<String>,
    /// 实际监听的套接字地址
    pub local_addr: Option<SocketAddr>,
}

struct RunningServer {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
}

/// 文件传输服务
pub struct FileServer {
    config: AppConfig,
    platform: Arc<dyn HostPlatform>,
    listener: Arc<dyn ServerListener>,
    /// 串行化 start/stop
    running: Mutex<Option<RunningServer>>,
    state: RwLock<ServerState>,
}

impl FileServer {
    pub fn new(config: AppConfig, platform: Arc<dyn HostPlatform>, listener: Arc<dyn ServerListener>) -> Self {
        Self {
            config,
            platform,
            listener,
            running: Mutex::new(None),
            state: RwLock::new(ServerState::default()),
        }
    }

    /// 启动服务，返回对外地址
    ///
    /// 已在运行时直接返回当前地址，不会重复绑定端口
    pub async fn start(&self) -> Result<String, ServerError> {
        let mut running = self.running.lock().await;

        if running.is_some() {
            if let Some(address) = self.state.read().bound_address.clone() {
                info!("服务已在运行: {}", address);
                return Ok(address);
            }
        }

        // 根目录在每次启动时重新发现，运行期间不变
        let registry = RootRegistry::discover(&self.config.storage, self.platform.as_ref());
        if registry.is_empty() {
            error!("没有可用的存储根目录，无法启动");
            return Err(ServerError::NoRoots);
        }

        let archive_dir = &self.config.transfer.archive_dir;
        PathValidator::prepare_writable_dir(archive_dir).map_err(|e| ServerError::ArchiveDir {
            path: archive_dir.clone(),
            message: format!("{:#}", e),
        })?;
        sweep_stale_archives(archive_dir);

        let host = &self.config.server.host;
        let ip = host
            .parse::<IpAddr>()
            .map_err(|_| ServerError::InvalidAddress(host.clone()))?;
        let socket_addr = SocketAddr::new(ip, self.config.server.port);
        let addr = socket_addr.to_string();
        let tcp_listener = TcpListener::bind(socket_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = tcp_listener.local_addr()?;

        let app = super::build_router(
            AppState::new(registry, &self.config),
            self.config.transfer.max_upload_bytes,
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(tcp_listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let address = self.public_address(local_addr);
        *self.state.write() = ServerState {
            listening: true,
            bound_address: Some(address.clone()),
            local_addr: Some(local_addr),
        };
        *running = Some(RunningServer { shutdown_tx, handle });

        info!("文件传输服务已监听: {} (对外地址 {})", local_addr, address);
        warn!("⚠️  未启用任何客户端认证：同一网络内可访问该端口的设备都拥有完整的读写删除权限");
        self.listener.on_server_started(&address);

        Ok(address)
    }

    /// 停止服务；未运行时为空操作
    pub async fn stop(&self) -> Result<(), ServerError> {
        let mut running = self.running.lock().await;
        let Some(server) = running.take() else {
            return Ok(());
        };

        info!("正在停止文件传输服务...");
        let _ = server.shutdown_tx.send(());

        let mut handle = server.handle;
        let result = match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle).await {
            Ok(Ok(serve_result)) => serve_result.map_err(ServerError::Serve),
            Ok(Err(join_error)) => {
                error!("服务任务异常退出: {}", join_error);
                Ok(())
            }
            Err(_) => {
                warn!("优雅关闭超时，强制中止仍在进行的连接");
                handle.abort();
                Ok(())
            }
        };

        *self.state.write() = ServerState::default();
        self.listener.on_server_stopped();

        result
    }

    pub fn is_running(&self) -> bool {
        self.state.read().listening
    }

    /// 对外地址，未运行时为 None
    pub fn bound_address(&self) -> Option<String> {
        self.state.read().bound_address.clone()
    }

    pub fn server_state(&self) -> ServerState {
        self.state.read().clone()
    }

    /// 监听在通配地址时使用宿主的局域网地址，拿不到时退回回环地址
    fn public_address(&self, local_addr: SocketAddr) -> String {
        let ip = if local_addr.ip().is_unspecified() {
            self.platform
                .current_lan_address()
                .and_then(|ip| ip.parse::<IpAddr>().ok())
                .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
        } else {
            local_addr.ip()
        };
        format!("http://{}", SocketAddr::new(ip, local_addr.port()))
    }
}
