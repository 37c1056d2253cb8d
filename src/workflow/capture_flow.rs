//! 截图流程 - 流程层
//!
//! 核心职责：定义"一只股票"的完整截图流程
//!
//! 流程顺序：
//! 1. 股票报告 → 下载 PDF（没有 PDF 时截取预览）
//! 2. 股票概览 → 滚动截图 → 财务 / 股权标签页
//! 3. 图表页
//! 4. 第二账号的图表页（可选）
//!
//! 每一步单独兜底：失败只记录日志并尽量截一张 error.png，不影响后续步骤。
//! 只有浏览器本身启动失败才让整个任务失败。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserAccount, BrowserHost, BrowserLauncher, ChromeLauncher};
use crate::config::Config;
use crate::infrastructure::{PageActions, ScratchDir};
use crate::models::{Artifact, StockTarget};
use crate::services::report_downloader::{resolve_url, ReportDownloader};
use crate::workflow::capture_ctx::CaptureCtx;
use crate::workflow::sites::{self, TabGroup, TabTarget};

/// 逐字输入的间隔
const TYPING_DELAY: Duration = Duration::from_millis(150);
/// 每次滚动的视口比例
const SCROLL_FRACTION: f64 = 0.9;
/// 等待概览页搜索建议
const SUGGESTION_TIMEOUT: Duration = Duration::from_secs(60);

/// 截图能力
#[async_trait]
pub trait Capturer: Send + Sync {
    /// 截取目标股票的所有页面，返回按截图顺序排列的产物
    async fn capture(&self, target: &StockTarget, scratch: &ScratchDir) -> Result<Vec<Artifact>>;
}

/// 基于浏览器的截图流程
///
/// - 编排完整的截图流程
/// - 决定何时兜底、何时跳过
/// - 浏览器由 BrowserLauncher 提供，页面操作全部交给 PageActions
pub struct BrowserCapturer {
    config: Config,
    downloader: ReportDownloader,
    launcher: Arc<dyn BrowserLauncher>,
}

impl BrowserCapturer {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self::with_launcher(config, http, Arc::new(ChromeLauncher::new(config)))
    }

    pub fn with_launcher(config: &Config, http: reqwest::Client, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            config: config.clone(),
            downloader: ReportDownloader::new(http, config.pdf_fetch_retry_policy()),
            launcher,
        }
    }

    async fn run_sections(&self, host: &dyn BrowserHost, ctx: &mut CaptureCtx<'_>) -> Result<()> {
        let page = host.open_page("about:blank").await?;

        // ========== 1. 股票报告 ==========
        info!("{} 📄 正在获取股票报告...", ctx);
        if let Err(e) = self.capture_report(host, page.as_ref(), ctx).await {
            error!("{} ❌ 股票报告截取失败: {:#}", ctx, e);
            error_shot(page.as_ref(), &ctx.scratch.report_dir()).await;
        }

        // ========== 2. 股票概览 ==========
        info!("{} 📊 正在截取股票概览...", ctx);
        if let Err(e) = self.capture_overview(page.as_ref(), ctx).await {
            error!("{} ❌ 股票概览截取失败: {:#}", ctx, e);
            error_shot(page.as_ref(), &ctx.scratch.overview_dir()).await;
        }

        // ========== 3. 图表 ==========
        info!("{} 📈 正在截取图表...", ctx);
        match self.capture_chart(page.as_ref(), ctx, "tradingview_chart.png").await {
            Ok(()) => info!("{} ✓ 图表已截取", ctx),
            Err(e) => {
                error!("{} ❌ 图表截取失败: {:#}", ctx, e);
                error_shot(page.as_ref(), &ctx.scratch.chart_dir()).await;
            }
        }

        if let Err(e) = page.close().await {
            debug!("关闭页面失败: {}", e);
        }
        Ok(())
    }

    async fn capture_report(
        &self,
        host: &dyn BrowserHost,
        page: &dyn PageActions,
        ctx: &mut CaptureCtx<'_>,
    ) -> Result<()> {
        page.goto(&self.config.report_url, self.config.step_timeout()).await?;
        page.pause(2000).await;

        page.fill(sites::REPORT_SEARCH_INPUT, &ctx.target.name).await?;
        page.pause(1000).await;

        page.wait_for_selector(sites::REPORT_FIRST_SUGGESTION, self.config.action_timeout())
            .await?;
        let href = page
            .attribute(sites::REPORT_FIRST_SUGGESTION, "href")
            .await?
            .context("搜索建议没有链接")?;
        let report_url = resolve_url(page.current_url().await?.as_deref(), &href)
            .with_context(|| format!("无法解析报告地址: {}", href))?;

        let report_page = host.open_page(&report_url).await?;
        report_page.pause(2000).await;
        let outcome = self.save_report(report_page.as_ref(), ctx).await;
        if let Err(e) = report_page.close().await {
            debug!("关闭报告页失败: {}", e);
        }
        outcome
    }

    /// 有 PDF 就下载，没有就截取预览
    async fn save_report(&self, report_page: &dyn PageActions, ctx: &mut CaptureCtx<'_>) -> Result<()> {
        let frame_src = report_page
            .attribute(sites::REPORT_PDF_FRAME, "src")
            .await?
            .filter(|src| !src.trim().is_empty());

        let Some(src) = frame_src else {
            let shot = report_page
                .screenshot(&ctx.scratch.report_dir().join("report_preview.png"))
                .await?;
            ctx.record_image(shot);
            info!("{} ✓ 未找到 PDF，已截取报告预览", ctx);
            return Ok(());
        };

        let pdf_url = resolve_url(report_page.current_url().await?.as_deref(), &src)
            .with_context(|| format!("无法解析 PDF 地址: {}", src))?;
        let dest = ctx.scratch.report_dir().join("report.pdf");
        match self.downloader.download(&pdf_url, &dest).await {
            Ok(()) => {
                ctx.record(Artifact::pdf(dest));
                info!("{} ✓ 股票报告 PDF 下载成功", ctx);
            }
            Err(e) => warn!(
                "{} ⚠️ 股票报告 PDF 下载失败 (已尝试 {} 次): {:#}",
                ctx, e.attempts, e.last_error
            ),
        }
        Ok(())
    }

    async fn capture_overview(&self, page: &dyn PageActions, ctx: &mut CaptureCtx<'_>) -> Result<()> {
        page.goto(&self.config.overview_url, self.config.step_timeout()).await?;
        page.clear(sites::OVERVIEW_SEARCH_INPUT).await?;
        page.pause(300).await;
        page.type_slowly(sites::OVERVIEW_SEARCH_INPUT, &ctx.target.name, TYPING_DELAY)
            .await?;

        page.wait_for_selector(sites::OVERVIEW_FIRST_SUGGESTION, SUGGESTION_TIMEOUT)
            .await?;
        page.click_and_wait_for_navigation(sites::OVERVIEW_FIRST_SUGGESTION, self.config.step_timeout())
            .await?;
        page.pause(3000).await;

        self.scroll_capture(page, ctx).await?;
        info!("{} ✓ 概览页滚动截图完成，共 {} 张", ctx, ctx.len());

        for group in sites::TAB_GROUPS {
            self.capture_tab_group(page, ctx, group).await;
        }
        Ok(())
    }

    /// 一屏一屏往下截，直到页面不再滚动
    async fn scroll_capture(&self, page: &dyn PageActions, ctx: &mut CaptureCtx<'_>) -> Result<()> {
        let dir = ctx.scratch.overview_dir();
        let mut previous = None;

        for index in 1..=self.config.max_scroll_shots {
            let shot = page
                .screenshot(&dir.join(format!("moneycontrol_scroll_{}.png", index)))
                .await?;
            ctx.record_image(shot);

            let current = page.scroll_viewport(SCROLL_FRACTION).await?;
            if reached_bottom(previous, current) {
                return Ok(());
            }
            previous = Some(current);
            page.pause(1000).await;
        }

        debug!("{} 已达到滚动截图上限 {}", ctx, self.config.max_scroll_shots);
        Ok(())
    }

    async fn capture_tab_group(&self, page: &dyn PageActions, ctx: &mut CaptureCtx<'_>, group: &TabGroup) {
        match page.is_visible(group.section).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("{} {} 区块不存在或不可见，跳过", ctx, group.name);
                return;
            }
            Err(e) => {
                warn!("{} ⚠️ 无法检查 {} 区块: {:#}", ctx, group.name, e);
                return;
            }
        }

        for tab in group.tabs {
            if let Err(e) = self.capture_tab(page, ctx, tab).await {
                warn!("{} ⚠️ 无法截取标签 {}: {:#}", ctx, tab.label, e);
            }
        }
    }

    async fn capture_tab(&self, page: &dyn PageActions, ctx: &mut CaptureCtx<'_>, tab: &TabTarget) -> Result<()> {
        page.click(tab.selector).await?;
        page.pause(1500).await;
        let shot = page
            .screenshot(
                &ctx.scratch
                    .overview_dir()
                    .join(format!("moneycontrol_{}.png", tab.file_stem)),
            )
            .await?;
        ctx.record_image(shot);
        Ok(())
    }

    async fn capture_chart(&self, page: &dyn PageActions, ctx: &mut CaptureCtx<'_>, file_name: &str) -> Result<()> {
        let url = sites::chart_url(&self.config.chart_url, &ctx.target.name);
        page.goto(&url, self.config.step_timeout()).await?;
        page.pause(4000).await;
        let shot = page.screenshot(&ctx.scratch.chart_dir().join(file_name)).await?;
        ctx.record_image(shot);
        Ok(())
    }

    /// 用第二个账号的浏览器再截一张图表
    async fn capture_second_account(&self, ctx: &mut CaptureCtx<'_>) -> Result<()> {
        let host = self.launcher.open(BrowserAccount::Second).await?;
        let result = async {
            let page = host.open_page("about:blank").await?;
            self.capture_chart(page.as_ref(), ctx, "tradingview_chart_2.png").await?;
            page.close().await
        }
        .await;
        host.shutdown().await;
        result
    }
}

#[async_trait]
impl Capturer for BrowserCapturer {
    async fn capture(&self, target: &StockTarget, scratch: &ScratchDir) -> Result<Vec<Artifact>> {
        let mut ctx = CaptureCtx::new(target, scratch);

        let host = self.launcher.open(BrowserAccount::Primary).await?;
        let result = self.run_sections(host.as_ref(), &mut ctx).await;
        host.shutdown().await;
        result?;

        if self.launcher.has_second_account() {
            match self.capture_second_account(&mut ctx).await {
                Ok(()) => info!("{} ✓ 第二账号图表已截取", ctx),
                Err(e) => error!("{} ❌ 第二账号图表截取失败: {:#}", ctx, e),
            }
        }

        if ctx.is_empty() {
            warn!("{} ⚠️ 所有页面都没有截到", ctx);
        } else {
            info!("{} 📸 截图完成，共 {} 个文件", ctx, ctx.len());
        }
        Ok(ctx.into_artifacts())
    }
}

/// 滚动前后位置相同说明已经到底
fn reached_bottom(previous: Option<f64>, current: f64) -> bool {
    previous.is_some_and(|p| (p - current).abs() < 0.5)
}

/// 出错时尽量截一张图留档，不计入产物
async fn error_shot(page: &dyn PageActions, dir: &Path) {
    if let Err(e) = page.screenshot(&dir.join("error.png")).await {
        debug!("错误截图失败: {}", e);
    }
}
