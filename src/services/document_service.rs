//! 文档 / 存储服务接口 - 业务能力层
//!
//! 文档组装只依赖这个 trait，真实实现是 `clients::GoogleWorkspace`

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// 待上传的本地文件
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub path: PathBuf,
    /// 远端文件名
    pub name: String,
    pub mime_type: String,
    /// 上传到哪个目录
    pub parent_folder: String,
}

/// 远端目录中的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
}

/// 文档 / 存储服务
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// 新建文档，返回文档 ID
    async fn create_document(&self, title: &str) -> Result<String>;

    /// 当前文档末尾的插入位置
    async fn end_index(&self, document_id: &str) -> Result<i64>;

    /// 批量修改文档内容
    async fn batch_update(&self, document_id: &str, requests: Vec<Value>) -> Result<()>;

    /// 设置"任何人可查看"
    async fn make_public(&self, file_id: &str) -> Result<()>;

    /// 上传文件，返回文件 ID
    async fn upload_file(&self, upload: &FileUpload) -> Result<String>;

    async fn delete_file(&self, file_id: &str) -> Result<()>;

    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteFile>>;

    /// 把文档导出为 PDF
    async fn export_pdf(&self, document_id: &str) -> Result<Vec<u8>>;
}

/// 文档的公开访问地址
pub fn document_url(document_id: &str) -> String {
    format!("https://docs.google.com/document/d/{}", document_id)
}

/// 图片直链（用于插入文档）
pub fn image_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?id={}", file_id)
}

/// 文件预览页地址
pub fn file_view_url(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{}/view", file_id)
}
