//! 集成测试共用的假实现
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use stock_snapshot::clients::AuthError;
use stock_snapshot::infrastructure::ScratchDir;
use stock_snapshot::models::{Artifact, StockTarget};
use stock_snapshot::services::{AssemblySettings, DocumentService, FileUpload, RemoteFile};
use stock_snapshot::utils::retry::{Backoff, RetryPolicy};
use stock_snapshot::{Capturer, Config};

pub const DOCUMENT_ID: &str = "doc-1";

#[derive(Debug, Default)]
struct DocsState {
    end_index: i64,
    calls: Vec<String>,
    /// 每次 batchUpdate 第一个插入位置，以及当时的文档末尾
    batch_starts: Vec<(i64, i64)>,
    batches: Vec<Vec<Value>>,
    upload_attempts: u32,
    failing_uploads: u32,
    /// 允许成功的上传次数，用完之后全部失败
    upload_budget: Option<u32>,
    /// 上传时令牌刷新失败
    upload_auth_failure: bool,
    uploaded: Vec<FileUpload>,
    public: Vec<String>,
    deleted: Vec<String>,
    folder: Vec<RemoteFile>,
}

/// 在内存里模拟文档：记录每次调用，按插入内容推进文档末尾
#[derive(Clone, Default)]
pub struct FakeDocs {
    state: Arc<Mutex<DocsState>>,
}

impl FakeDocs {
    pub fn new() -> Self {
        let docs = Self::default();
        docs.state().end_index = 1;
        docs
    }

    /// 前 `n` 次上传失败
    pub fn failing_uploads(self, n: u32) -> Self {
        self.state().failing_uploads = n;
        self
    }

    /// 前 `n` 次上传成功，之后全部失败
    pub fn allow_uploads(self, n: u32) -> Self {
        self.state().upload_budget = Some(n);
        self
    }

    /// 上传时报告授权失败
    pub fn failing_upload_auth(self) -> Self {
        self.state().upload_auth_failure = true;
        self
    }

    pub fn with_folder(self, files: Vec<RemoteFile>) -> Self {
        self.state().folder = files;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn batch_starts(&self) -> Vec<(i64, i64)> {
        self.state().batch_starts.clone()
    }

    pub fn batches(&self) -> Vec<Vec<Value>> {
        self.state().batches.clone()
    }

    pub fn upload_attempts(&self) -> u32 {
        self.state().upload_attempts
    }

    pub fn uploaded(&self) -> Vec<FileUpload> {
        self.state().uploaded.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    pub fn public(&self) -> Vec<String> {
        self.state().public.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, DocsState> {
        self.state.lock().unwrap()
    }
}

/// 单个请求插入的字符数（UTF-16）
fn inserted_len(request: &Value) -> i64 {
    if let Some(text) = request.pointer("/insertText/text").and_then(Value::as_str) {
        text.encode_utf16().count() as i64
    } else if request.get("insertInlineImage").is_some() || request.get("insertPageBreak").is_some() {
        1
    } else {
        0
    }
}

fn first_index(request: &Value) -> Option<i64> {
    ["insertText", "insertInlineImage", "insertPageBreak"]
        .iter()
        .find_map(|kind| request.pointer(&format!("/{}/location/index", kind)))
        .and_then(Value::as_i64)
}

#[async_trait]
impl DocumentService for FakeDocs {
    async fn create_document(&self, title: &str) -> Result<String> {
        self.state().calls.push(format!("create_document {}", title));
        Ok(DOCUMENT_ID.to_string())
    }

    async fn end_index(&self, _document_id: &str) -> Result<i64> {
        let mut state = self.state();
        state.calls.push("end_index".to_string());
        Ok(state.end_index)
    }

    async fn batch_update(&self, _document_id: &str, requests: Vec<Value>) -> Result<()> {
        let mut state = self.state();
        state.calls.push("batch_update".to_string());
        if let Some(start) = requests.first().and_then(first_index) {
            let end = state.end_index;
            state.batch_starts.push((start, end));
        }
        let added: i64 = requests.iter().map(inserted_len).sum();
        state.end_index += added;
        state.batches.push(requests);
        Ok(())
    }

    async fn make_public(&self, file_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("make_public {}", file_id));
        state.public.push(file_id.to_string());
        Ok(())
    }

    async fn upload_file(&self, upload: &FileUpload) -> Result<String> {
        let mut state = self.state();
        state.calls.push(format!("upload_file {}", upload.name));
        state.upload_attempts += 1;
        if state.upload_auth_failure {
            return Err(AuthError::NoRefreshToken.into());
        }
        if state.failing_uploads > 0 {
            state.failing_uploads -= 1;
            bail!("simulated upload failure");
        }
        if state.upload_budget == Some(state.uploaded.len() as u32) {
            bail!("simulated upload failure");
        }
        state.uploaded.push(upload.clone());
        Ok(format!("file-{}", state.uploaded.len()))
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("delete_file {}", file_id));
        state.deleted.push(file_id.to_string());
        Ok(())
    }

    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        let mut state = self.state();
        state.calls.push(format!("list_folder {}", folder_id));
        Ok(state.folder.clone())
    }

    async fn export_pdf(&self, document_id: &str) -> Result<Vec<u8>> {
        self.state().calls.push(format!("export_pdf {}", document_id));
        Ok(b"%PDF-1.4".to_vec())
    }
}

/// 在临时目录里写几个假文件当作截图结果
#[derive(Clone, Default)]
pub struct FakeCapturer {
    images: usize,
    with_pdf: bool,
    fail: bool,
    seen_scratch: Arc<Mutex<Option<PathBuf>>>,
}

impl FakeCapturer {
    pub fn images(count: usize) -> Self {
        Self {
            images: count,
            ..Self::default()
        }
    }

    pub fn with_pdf(mut self) -> Self {
        self.with_pdf = true;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// 最近一次任务使用的临时目录
    pub fn scratch_path(&self) -> Option<PathBuf> {
        self.seen_scratch.lock().unwrap().clone()
    }
}

#[async_trait]
impl Capturer for FakeCapturer {
    async fn capture(&self, _target: &StockTarget, scratch: &ScratchDir) -> Result<Vec<Artifact>> {
        *self.seen_scratch.lock().unwrap() = Some(scratch.base().to_path_buf());
        if self.fail {
            bail!("browser failed to launch");
        }

        let mut artifacts = Vec::new();
        if self.with_pdf {
            let path = scratch.report_dir().join("report.pdf");
            tokio::fs::write(&path, b"%PDF-1.4").await?;
            artifacts.push(Artifact::pdf(path));
        }
        for i in 1..=self.images {
            let path = scratch.overview_dir().join(format!("moneycontrol_scroll_{}.png", i));
            tokio::fs::write(&path, b"PNG").await?;
            artifacts.push(Artifact::image(path));
        }
        Ok(artifacts)
    }
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn test_settings() -> AssemblySettings {
    AssemblySettings {
        images_folder: "images-folder".to_string(),
        reports_folder: "reports-folder".to_string(),
        upload_policy: RetryPolicy::new(3, Backoff::Linear(Duration::from_millis(1))),
        public_link_settle: Duration::ZERO,
        export_pdf: false,
    }
}

pub fn test_config(scratch_root: &Path) -> Config {
    Config {
        scratch_root: scratch_root.display().to_string(),
        drive_images_folder_id: "images-folder".to_string(),
        drive_reports_folder_id: "reports-folder".to_string(),
        upload_max_attempts: 3,
        upload_backoff_ms: 1,
        public_link_settle_ms: 0,
        sweep_image_folder: false,
        export_pdf: false,
        output_log_file: String::new(),
        ..Config::default()
    }
}
