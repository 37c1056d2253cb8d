use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::utils::retry::{Backoff, RetryPolicy};

/// 默认配置文件名（可通过 CONFIG_FILE 覆盖）
pub const DEFAULT_CONFIG_FILE: &str = "stock_snapshot.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 监听地址
    pub bind_addr: String,
    /// 截图临时目录根路径
    pub scratch_root: String,
    // --- 浏览器配置 ---
    /// 主账号浏览器配置目录（保存登录状态）
    pub browser_profile_dir: String,
    /// 第二账号浏览器配置目录，为空则跳过第二张图表
    pub second_profile_dir: Option<String>,
    /// Chrome 可执行文件路径，为空则自动查找
    pub chrome_executable: Option<String>,
    /// 已运行浏览器的调试端口，设置后不再启动新浏览器
    pub browser_debug_port: Option<u16>,
    /// 是否使用无头模式
    pub headless: bool,
    /// 单个导航步骤的超时（秒）
    pub step_timeout_secs: u64,
    /// 单个页面操作（点击、输入、等待元素）的超时（秒）
    pub action_timeout_secs: u64,
    /// 滚动截图的最大张数
    pub max_scroll_shots: usize,
    // --- 目标站点 ---
    pub report_url: String,
    pub overview_url: String,
    pub chart_url: String,
    // --- Google 配置 ---
    pub credentials_path: String,
    pub token_path: String,
    /// 图片上传目录
    pub drive_images_folder_id: String,
    /// PDF 报告上传目录
    pub drive_reports_folder_id: String,
    /// 任务结束后是否清空整个图片目录
    pub sweep_image_folder: bool,
    /// 是否额外导出整份文档的 PDF
    pub export_pdf: bool,
    // --- 重试与等待 ---
    pub upload_max_attempts: u32,
    /// 上传重试的线性退避基数（毫秒）
    pub upload_backoff_ms: u64,
    pub pdf_fetch_attempts: u32,
    pub pdf_fetch_delay_ms: u64,
    /// 设置公开权限后等待链接生效的时间（毫秒）
    pub public_link_settle_ms: u64,
    /// 单个任务的最长处理时间（秒）
    pub job_timeout_secs: u64,
    // --- 日志 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件，为空则不写文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            scratch_root: "screenshots".to_string(),
            browser_profile_dir: "browser-session".to_string(),
            second_profile_dir: Some("browser-session-2".to_string()),
            chrome_executable: None,
            browser_debug_port: None,
            headless: false,
            step_timeout_secs: 180,
            action_timeout_secs: 30,
            max_scroll_shots: 40,
            report_url: "https://www.moneycontrol.com/stock-reports/account".to_string(),
            overview_url: "https://www.moneycontrol.com/".to_string(),
            chart_url: "https://www.tradingview.com/chart/".to_string(),
            credentials_path: "oauth2-credentials.json".to_string(),
            token_path: "token.json".to_string(),
            drive_images_folder_id: "1IsjdBQapOOcJZcHW7RGRU-avLMCOf79S".to_string(),
            drive_reports_folder_id: "1VUnSvxReJjrPXVF7haGDu3HTq8UzyUmn".to_string(),
            sweep_image_folder: false,
            export_pdf: false,
            upload_max_attempts: 3,
            upload_backoff_ms: 1000,
            pdf_fetch_attempts: 3,
            pdf_fetch_delay_ms: 2000,
            public_link_settle_ms: 1000,
            job_timeout_secs: 15 * 60,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    /// 默认值 → 配置文件 → 环境变量，后者覆盖前者
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = if Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        Ok(base.with_env_overrides())
    }

    /// 只使用默认值和环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("无法解析配置文件: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn with_env_overrides(self) -> Self {
        Self {
            bind_addr: env_string("BIND_ADDR").unwrap_or(self.bind_addr),
            scratch_root: env_string("SCRATCH_ROOT").unwrap_or(self.scratch_root),
            browser_profile_dir: env_string("BROWSER_PROFILE_DIR").unwrap_or(self.browser_profile_dir),
            second_profile_dir: env_optional("SECOND_PROFILE_DIR").unwrap_or(self.second_profile_dir),
            chrome_executable: env_optional("CHROME_EXECUTABLE").unwrap_or(self.chrome_executable),
            browser_debug_port: env_parse::<u16>("BROWSER_DEBUG_PORT").map(Some).unwrap_or(self.browser_debug_port),
            headless: env_parse("HEADLESS").unwrap_or(self.headless),
            step_timeout_secs: env_parse("STEP_TIMEOUT_SECS").unwrap_or(self.step_timeout_secs),
            action_timeout_secs: env_parse("ACTION_TIMEOUT_SECS").unwrap_or(self.action_timeout_secs),
            max_scroll_shots: env_parse("MAX_SCROLL_SHOTS").unwrap_or(self.max_scroll_shots),
            report_url: env_string("REPORT_URL").unwrap_or(self.report_url),
            overview_url: env_string("OVERVIEW_URL").unwrap_or(self.overview_url),
            chart_url: env_string("CHART_URL").unwrap_or(self.chart_url),
            credentials_path: env_string("CREDENTIALS_PATH").unwrap_or(self.credentials_path),
            token_path: env_string("TOKEN_PATH").unwrap_or(self.token_path),
            drive_images_folder_id: env_string("DRIVE_IMAGES_FOLDER_ID").unwrap_or(self.drive_images_folder_id),
            drive_reports_folder_id: env_string("DRIVE_REPORTS_FOLDER_ID").unwrap_or(self.drive_reports_folder_id),
            sweep_image_folder: env_parse("SWEEP_IMAGE_FOLDER").unwrap_or(self.sweep_image_folder),
            export_pdf: env_parse("EXPORT_PDF").unwrap_or(self.export_pdf),
            upload_max_attempts: env_parse("UPLOAD_MAX_ATTEMPTS").unwrap_or(self.upload_max_attempts),
            upload_backoff_ms: env_parse("UPLOAD_BACKOFF_MS").unwrap_or(self.upload_backoff_ms),
            pdf_fetch_attempts: env_parse("PDF_FETCH_ATTEMPTS").unwrap_or(self.pdf_fetch_attempts),
            pdf_fetch_delay_ms: env_parse("PDF_FETCH_DELAY_MS").unwrap_or(self.pdf_fetch_delay_ms),
            public_link_settle_ms: env_parse("PUBLIC_LINK_SETTLE_MS").unwrap_or(self.public_link_settle_ms),
            job_timeout_secs: env_parse("JOB_TIMEOUT_SECS").unwrap_or(self.job_timeout_secs),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            output_log_file: env_string("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
        }
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn public_link_settle(&self) -> Duration {
        Duration::from_millis(self.public_link_settle_ms)
    }

    /// 上传重试：等待时间随尝试次数线性增长
    pub fn upload_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.upload_max_attempts,
            Backoff::Linear(Duration::from_millis(self.upload_backoff_ms)),
        )
    }

    /// PDF 下载重试：固定间隔
    pub fn pdf_fetch_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.pdf_fetch_attempts,
            Backoff::Fixed(Duration::from_millis(self.pdf_fetch_delay_ms)),
        )
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// 设置为空字符串表示显式关闭该项
fn env_optional(name: &str) -> Option<Option<String>> {
    std::env::var(name)
        .ok()
        .map(|v| if v.trim().is_empty() { None } else { Some(v) })
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
