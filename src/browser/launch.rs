use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// 浏览器启动参数
///
/// 每个账号一个独立的配置目录，登录状态保存在目录里
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub user_data_dir: PathBuf,
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub window: (u32, u32),
    pub request_timeout: Duration,
}

impl BrowserProfile {
    pub fn new(user_data_dir: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            user_data_dir: user_data_dir.into(),
            executable: config.chrome_executable.as_ref().map(PathBuf::from),
            headless: config.headless,
            window: (1366, 900),
            request_timeout: config.step_timeout(),
        }
    }

    /// 主账号配置
    pub fn primary(config: &Config) -> Self {
        Self::new(&config.browser_profile_dir, config)
    }

    /// 第二账号配置（未配置时为 None）
    pub fn secondary(config: &Config) -> Option<Self> {
        config
            .second_profile_dir
            .as_ref()
            .map(|dir| Self::new(dir, config))
    }
}

/// 一个正在运行的浏览器及其事件处理任务
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    /// 是否由本程序启动（连接到外部浏览器时不负责关闭）
    owned: bool,
}

impl BrowserSession {
    pub(crate) fn new(browser: Browser, handler_task: JoinHandle<()>, owned: bool) -> Self {
        Self {
            browser,
            handler_task,
            owned,
        }
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// 关闭浏览器并等待事件处理任务结束
    pub async fn shutdown(mut self) {
        if self.owned {
            if let Err(e) = self.browser.close().await {
                warn!("⚠️ 关闭浏览器失败: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                debug!("等待浏览器进程退出失败: {}", e);
            }
        }
        self.handler_task.abort();
        let _ = self.handler_task.await;
        debug!("浏览器会话已结束");
    }
}

/// 使用持久化配置目录启动浏览器
pub async fn launch_browser(profile: &BrowserProfile) -> Result<BrowserSession> {
    info!("🚀 启动浏览器 (配置目录: {})", profile.user_data_dir.display());

    let (width, height) = profile.window;
    let mut builder = BrowserConfig::builder()
        .user_data_dir(&profile.user_data_dir)
        .window_size(width, height)
        .viewport(Viewport {
            width,
            height,
            ..Default::default()
        })
        .request_timeout(profile.request_timeout)
        .args(vec![
            "--no-sandbox",            // 禁用沙盒，防止权限问题导致的崩溃
            "--disable-dev-shm-usage", // 防止共享内存不足
            "--no-first-run",
        ]);

    builder = if profile.headless {
        builder.new_headless_mode().arg("--disable-gpu")
    } else {
        builder.with_head()
    };

    if let Some(executable) = &profile.executable {
        builder = builder.chrome_executable(executable);
    }

    let config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        anyhow::anyhow!("配置浏览器失败: {}", e)
    })?;

    // 启动浏览器
    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        anyhow::anyhow!("启动浏览器失败: {}", e)
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    Ok(BrowserSession::new(browser, handler_task, true))
}
