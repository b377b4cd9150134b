// 应用状态

use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::ZipPackager;
use crate::config::AppConfig;
use crate::filesystem::{DirectoryRenderer, PathResolver, RootRegistry};
use crate::uploader::UploadIngestor;

/// 请求处理共享状态
///
/// 服务运行期间只读，请求之间不共享可变状态
#[derive(Clone)]
pub struct AppState {
    /// 存储根目录
    pub registry: Arc<RootRegistry>,
    /// 路径解析器
    pub resolver: Arc<PathResolver>,
    /// 目录浏览
    pub renderer: Arc<DirectoryRenderer>,
    /// ZIP 打包
    pub packager: Arc<ZipPackager>,
    /// 上传接收
    pub ingestor: Arc<UploadIngestor>,
    /// 临时压缩包目录
    pub archive_dir: Arc<PathBuf>,
}

impl AppState {
    /// 根据已发现的根目录组装各组件
    pub fn new(registry: RootRegistry, config: &AppConfig) -> Self {
        let registry = Arc::new(registry);
        let resolver = Arc::new(PathResolver::new(registry.clone()));

        Self {
            renderer: Arc::new(DirectoryRenderer::new(resolver.clone(), config.filesystem.clone())),
            packager: Arc::new(ZipPackager::new(&config.filesystem)),
            ingestor: Arc::new(UploadIngestor::new(resolver.clone())),
            archive_dir: Arc::new(config.transfer.archive_dir.clone()),
            registry,
            resolver,
        }
    }
}
