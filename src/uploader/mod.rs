// 上传接收模块
//
// 将浏览器提交的 multipart 文件流式写入目标目录

mod ingest;

pub use ingest::{UploadIngestor, UploadSummary};
