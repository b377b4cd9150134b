// 多文件打包下载模块

mod packager;
mod temp;

pub use packager::{PackageSummary, ZipPackager};
pub use temp::{sweep_stale_archives, ArchiveStream, TempArchive};
