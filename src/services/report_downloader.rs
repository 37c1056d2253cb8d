//! 报告下载服务 - 业务能力层
//!
//! 只负责"把 PDF 地址下载到本地"，不关心页面流程

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::utils::retry::{retry_with_backoff, RetryError, RetryPolicy};

const USER_AGENT: &str = "Mozilla/5.0";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// PDF 报告下载
pub struct ReportDownloader {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl ReportDownloader {
    pub fn new(http: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    /// 下载到 `dest`，重试耗尽时返回最后一次的错误
    pub async fn download(&self, url: &str, dest: &Path) -> Result<(), RetryError<anyhow::Error>> {
        retry_with_backoff("下载股票报告 PDF", self.policy, |_| self.fetch_once(url, dest)).await
    }

    async fn fetch_once(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("请求失败: {}", url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("下载返回错误状态 {}: {}", status, url);
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            bail!("下载内容为空: {}", url);
        }
        tokio::fs::write(dest, &bytes)
            .await
            .with_context(|| format!("无法写入文件: {}", dest.display()))?;
        debug!("已下载 {} 字节到 {}", bytes.len(), dest.display());
        Ok(())
    }
}

/// 把 iframe 里的相对地址转成绝对地址
pub fn resolve_url(page_url: Option<&str>, src: &str) -> Option<String> {
    if let Ok(url) = reqwest::Url::parse(src) {
        return Some(url.into());
    }
    let base = reqwest::Url::parse(page_url?).ok()?;
    base.join(src).ok().map(Into::into)
}
