//! 文档组装服务 - 业务能力层
//!
//! 把一次任务的截图 / PDF 依次上传并追加到新建的 Google 文档末尾

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::clients::doc_requests::{self, IMAGE_SIZE_PT};
use crate::config::Config;
use crate::models::{Artifact, ArtifactKind, StockTarget};
use crate::services::document_service::{
    document_url, file_view_url, image_url, DocumentService, FileUpload,
};
use crate::utils::retry::{retry_with_backoff, RetryPolicy};

/// PDF 报告链接的文字
pub const REPORT_LINK_LABEL: &str = "Full Stock Report PDF:";

/// 文档组装参数
#[derive(Debug, Clone)]
pub struct AssemblySettings {
    pub images_folder: String,
    pub reports_folder: String,
    pub upload_policy: RetryPolicy,
    /// 设置公开权限后等待链接生效
    pub public_link_settle: Duration,
    pub export_pdf: bool,
}

impl AssemblySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            images_folder: config.drive_images_folder_id.clone(),
            reports_folder: config.drive_reports_folder_id.clone(),
            upload_policy: config.upload_retry_policy(),
            public_link_settle: config.public_link_settle(),
            export_pdf: config.export_pdf,
        }
    }
}

/// 本次任务上传到图片目录的文件
///
/// 图片插入文档后 Docs 会保存副本，任务结束时这些文件可以删掉
#[derive(Debug, Default, Clone)]
pub struct UploadLedger {
    image_ids: Vec<String>,
}

impl UploadLedger {
    pub fn record_image(&mut self, file_id: impl Into<String>) {
        self.image_ids.push(file_id.into());
    }

    pub fn image_ids(&self) -> &[String] {
        &self.image_ids
    }

    pub fn is_empty(&self) -> bool {
        self.image_ids.is_empty()
    }
}

/// 组装文档所需的输入
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    pub target: &'a StockTarget,
    /// 按截图顺序排列
    pub artifacts: &'a [Artifact],
    pub user_image: Option<&'a Path>,
    pub comment: &'a str,
    /// 导出 PDF 时的本地暂存目录
    pub work_dir: &'a Path,
}

/// 组装结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutcome {
    pub document_id: String,
    pub document_url: String,
    pub report_pdf_url: Option<String>,
    pub exported_pdf_url: Option<String>,
}

/// 文档组装服务
///
/// 职责：
/// - 新建文档并公开
/// - 依次插入备注、用户图片、截图和 PDF 报告链接
/// - 每次插入都先取最新的文档末尾位置，保证内容是追加而不是覆盖
pub struct DocumentAssembler {
    service: Arc<dyn DocumentService>,
    settings: AssemblySettings,
}

impl DocumentAssembler {
    pub fn new(service: Arc<dyn DocumentService>, settings: AssemblySettings) -> Self {
        Self { service, settings }
    }

    pub async fn assemble(
        &self,
        input: AssemblyInput<'_>,
        ledger: &mut UploadLedger,
    ) -> Result<DocumentOutcome> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let title = format!("{}-{}", input.target.display_symbol(), timestamp);

        info!("📝 正在创建 Google 文档...");
        let document_id = self.service.create_document(&title).await?;
        self.service.make_public(&document_id).await?;
        info!("✓ Google 文档已创建: {}", title);

        let comment = input.comment.trim();
        if !comment.is_empty() {
            let index = self.service.end_index(&document_id).await?;
            self.service
                .batch_update(
                    &document_id,
                    vec![doc_requests::insert_text(index, &format!("{}\n\n", comment))],
                )
                .await?;
            info!("✓ 已插入备注");
        }

        info!("🖼️ 正在向文档插入截图...");
        if let Some(path) = input.user_image {
            self.insert_user_image(&document_id, path, ledger).await?;
        }

        let mut report_pdf_url = None;
        let mut image_counter = 0usize;
        for artifact in input.artifacts {
            if !tokio::fs::try_exists(&artifact.path).await.unwrap_or(false) {
                warn!("⚠️ 文件不存在，跳过: {}", artifact.path.display());
                continue;
            }
            match artifact.kind {
                ArtifactKind::Pdf => {
                    let name = format!("{}-{}-report.pdf", input.target.name, timestamp);
                    let url = self.insert_report_link(&document_id, artifact, name).await?;
                    report_pdf_url = Some(url);
                }
                ArtifactKind::Image => {
                    image_counter += 1;
                    self.insert_image(&document_id, artifact, image_counter, ledger)
                        .await?;
                }
            }
        }

        let exported_pdf_url = if self.settings.export_pdf {
            Some(self.export_document(&document_id, &title, input.work_dir).await?)
        } else {
            None
        };

        let url = document_url(&document_id);
        info!("✅ Google 文档已就绪: {}", url);
        Ok(DocumentOutcome {
            document_id,
            document_url: url,
            report_pdf_url,
            exported_pdf_url,
        })
    }

    /// 用户图片单独起一页
    async fn insert_user_image(
        &self,
        document_id: &str,
        path: &Path,
        ledger: &mut UploadLedger,
    ) -> Result<()> {
        let upload = self.image_upload(path, "png");
        let file_id = self.upload(&upload).await?;
        ledger.record_image(&file_id);
        self.publish(&file_id).await?;

        let index = self.service.end_index(document_id).await?;
        self.service
            .batch_update(
                document_id,
                vec![
                    doc_requests::insert_page_break(index),
                    doc_requests::insert_inline_image(index + 1, &image_url(&file_id), IMAGE_SIZE_PT),
                    doc_requests::insert_text(index + 2, "\n"),
                ],
            )
            .await?;
        info!("✓ 已插入用户图片");
        Ok(())
    }

    /// 截图之后换行，每两张图换一页
    async fn insert_image(
        &self,
        document_id: &str,
        artifact: &Artifact,
        image_counter: usize,
        ledger: &mut UploadLedger,
    ) -> Result<()> {
        let ext = artifact
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
            .to_ascii_lowercase();
        let mut upload = self.image_upload(&artifact.path, &ext);
        upload.mime_type = artifact.mime_type().to_string();

        let file_id = self.upload(&upload).await?;
        ledger.record_image(&file_id);
        self.publish(&file_id).await?;

        let index = self.service.end_index(document_id).await?;
        let mut requests = vec![
            doc_requests::insert_inline_image(index, &image_url(&file_id), IMAGE_SIZE_PT),
            doc_requests::insert_text(index + 1, "\n"),
        ];
        if image_counter % 2 == 0 {
            requests.push(doc_requests::insert_page_break(index + 2));
        }
        self.service.batch_update(document_id, requests).await?;
        Ok(())
    }

    /// 上传 PDF 报告并插入带链接的文字，返回报告链接
    async fn insert_report_link(
        &self,
        document_id: &str,
        artifact: &Artifact,
        name: String,
    ) -> Result<String> {
        let upload = FileUpload {
            path: artifact.path.clone(),
            name,
            mime_type: artifact.mime_type().to_string(),
            parent_folder: self.settings.reports_folder.clone(),
        };
        let file_id = self.upload(&upload).await?;
        self.service.make_public(&file_id).await?;
        let url = file_view_url(&file_id);

        let index = self.service.end_index(document_id).await?;
        let label_end = index + doc_requests::text_len(REPORT_LINK_LABEL);
        self.service
            .batch_update(
                document_id,
                vec![
                    doc_requests::insert_text(index, &format!("{}\n", REPORT_LINK_LABEL)),
                    doc_requests::link_text(index, label_end, &url),
                ],
            )
            .await?;
        info!("✓ 已上传并链接股票报告 PDF");
        Ok(url)
    }

    /// 导出整份文档为 PDF 并上传到报告目录
    async fn export_document(&self, document_id: &str, title: &str, work_dir: &Path) -> Result<String> {
        let bytes = self.service.export_pdf(document_id).await?;
        let path = work_dir.join(format!("{}.pdf", title));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("无法保存导出的 PDF: {}", path.display()))?;

        let upload = FileUpload {
            path,
            name: format!("{}.pdf", title),
            mime_type: "application/pdf".to_string(),
            parent_folder: self.settings.reports_folder.clone(),
        };
        let file_id = self.upload(&upload).await?;
        self.service.make_public(&file_id).await?;
        info!("✓ 文档 PDF 已导出");
        Ok(file_view_url(&file_id))
    }

    fn image_upload(&self, path: &Path, ext: &str) -> FileUpload {
        FileUpload {
            path: path.to_path_buf(),
            name: format!("{}.{}", uuid::Uuid::new_v4(), ext),
            mime_type: "image/png".to_string(),
            parent_folder: self.settings.images_folder.clone(),
        }
    }

    /// 带重试的上传
    async fn upload(&self, upload: &FileUpload) -> Result<String> {
        let label = format!("上传 {}", upload.name);
        retry_with_backoff(&label, self.settings.upload_policy, |_| {
            self.service.upload_file(upload)
        })
        .await
        .map_err(|e| e.last_error.context(format!("{}，已尝试 {} 次", label, e.attempts)))
    }

    /// 公开图片并等待链接生效，Docs 需要能访问到图片地址
    async fn publish(&self, file_id: &str) -> Result<()> {
        self.service.make_public(file_id).await?;
        sleep(self.settings.public_link_settle).await;
        Ok(())
    }
}
