//! 单个任务处理器 - 编排层
//!
//! ## 职责
//!
//! 1. 创建任务临时目录
//! 2. 委托 Capturer 截图
//! 3. 委托 DocumentAssembler 生成文档
//! 4. 无论成功失败都清理本地和远端的临时文件
//!
//! 不做具体的页面操作或文档排版

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::clients::AuthError;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::ScratchDir;
use crate::models::{JobReport, JobRequest};
use crate::services::{
    AssemblyInput, AssemblySettings, DocumentAssembler, DocumentOutcome, DocumentService,
    UploadLedger,
};
use crate::utils::log_hub::LogHub;
use crate::utils::logging::{log_job_finished, log_job_start};
use crate::workflow::Capturer;

/// 执行一次完整任务的能力，HTTP 层只依赖这个 trait
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, request: JobRequest) -> AppResult<JobReport>;
}

/// 截图 + 生成文档
pub struct StockJob {
    config: Config,
    capturer: Arc<dyn Capturer>,
    service: Arc<dyn DocumentService>,
    assembler: DocumentAssembler,
    hub: LogHub,
}

impl StockJob {
    pub fn new(
        config: &Config,
        capturer: Arc<dyn Capturer>,
        service: Arc<dyn DocumentService>,
        hub: LogHub,
    ) -> Self {
        let assembler = DocumentAssembler::new(service.clone(), AssemblySettings::from_config(config));
        Self {
            config: config.clone(),
            capturer,
            service,
            assembler,
            hub,
        }
    }

    async fn execute(
        &self,
        request: &JobRequest,
        scratch: &ScratchDir,
        ledger: &mut UploadLedger,
    ) -> AppResult<(DocumentOutcome, usize)> {
        let artifacts = self
            .capturer
            .capture(&request.target, scratch)
            .await
            .map_err(AppError::Capture)?;
        if artifacts.is_empty() {
            warn!("⚠️ 没有任何截图，放弃生成文档");
            return Err(AppError::NoArtifacts);
        }

        let user_image = match &request.user_image {
            Some(image) => Some(scratch.save_user_image(&image.bytes).await?),
            None => None,
        };

        let input = AssemblyInput {
            target: &request.target,
            artifacts: &artifacts,
            user_image: user_image.as_deref(),
            comment: &request.comment,
            work_dir: scratch.base(),
        };
        let outcome = self
            .assembler
            .assemble(input, ledger)
            .await
            .map_err(document_error)?;
        Ok((outcome, artifacts.len()))
    }

    /// 清理本地临时目录和本次上传的图片，错误只记日志
    async fn cleanup(&self, scratch: &ScratchDir, ledger: &UploadLedger) {
        info!("🧹 正在清理临时文件...");
        scratch.remove().await;

        for file_id in ledger.image_ids() {
            if let Err(e) = self.service.delete_file(file_id).await {
                warn!("⚠️ 删除已上传图片失败 ({}): {:#}", file_id, e);
            }
        }
        if !ledger.is_empty() {
            info!("✓ 已删除 {} 张已上传图片", ledger.image_ids().len());
        }

        if self.config.sweep_image_folder {
            self.sweep_image_folder().await;
        }
    }

    /// 清空整个图片目录
    async fn sweep_image_folder(&self) {
        let folder = &self.config.drive_images_folder_id;
        let files = match self.service.list_folder(folder).await {
            Ok(files) => files,
            Err(e) => {
                warn!("⚠️ 无法列出图片目录 ({}): {:#}", folder, e);
                return;
            }
        };
        for file in &files {
            if let Err(e) = self.service.delete_file(&file.id).await {
                warn!("⚠️ 删除 {} 失败: {:#}", file.name, e);
            }
        }
        info!("✓ 图片目录已清空，共 {} 个文件", files.len());
    }
}

#[async_trait]
impl JobRunner for StockJob {
    async fn run(&self, request: JobRequest) -> AppResult<JobReport> {
        let started = Instant::now();
        log_job_start(&request.target, &request.comment);

        let scratch = ScratchDir::create(&self.config.scratch_root, &request.target).await?;
        let mut ledger = UploadLedger::default();

        let result = self.execute(&request, &scratch, &mut ledger).await;
        let report = match result {
            Ok((outcome, artifact_count)) => {
                let elapsed = started.elapsed();
                self.hub.done(&outcome.document_url);
                log_job_finished(&outcome.document_url, elapsed);
                Ok(JobReport {
                    document_url: outcome.document_url,
                    elapsed,
                    artifact_count,
                    report_pdf_url: outcome.report_pdf_url,
                    exported_pdf_url: outcome.exported_pdf_url,
                })
            }
            Err(e) => {
                error!("❌ 任务失败 [{}]: {}", request.target, e);
                Err(e)
            }
        };

        self.cleanup(&scratch, &ledger).await;
        report
    }
}

/// 授权相关的失败视为缺少前置条件，其余都是文档生成失败
fn document_error(e: anyhow::Error) -> AppError {
    match e.chain().find_map(|cause| cause.downcast_ref::<AuthError>()) {
        Some(auth) => AppError::MissingPrerequisite(auth.to_string()),
        None => AppError::Document(e),
    }
}
