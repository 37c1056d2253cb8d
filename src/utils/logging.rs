/// 日志工具模块
///
/// 日志统一走 tracing，输出端按层拼装：
/// - 控制台（受 RUST_LOG 控制）
/// - 日志文件（可选）
/// - 广播给网页上的 SSE 监听者（只转发本程序的 INFO 及以上日志）
use std::fmt;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tracing::field::{Field, Visit};
use tracing::{info, Event, Level, Subscriber};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tfmt, EnvFilter, Layer};

use crate::config::Config;
use crate::models::StockTarget;
use crate::utils::log_hub::LogHub;

const CRATE_TARGET: &str = "stock_snapshot";

/// 初始化全部日志输出端
pub fn init(config: &Config, hub: &LogHub) -> Result<()> {
    let console = tfmt::layer()
        .with_target(false)
        .with_filter(console_filter(config.verbose_logging));

    let file = if config.output_log_file.is_empty() {
        None
    } else {
        init_log_file(&config.output_log_file)?;
        let file = OpenOptions::new()
            .append(true)
            .open(&config.output_log_file)
            .with_context(|| format!("无法打开日志文件: {}", config.output_log_file))?;
        Some(
            tfmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(Targets::new().with_target(CRATE_TARGET, Level::DEBUG)),
        )
    };

    let broadcast = HubLayer::new(hub.clone())
        .with_filter(Targets::new().with_target(CRATE_TARGET, Level::INFO));

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(broadcast)
        .try_init()?;
    Ok(())
}

/// 仅控制台输出，供辅助命令使用
pub fn init_console(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(tfmt::layer().with_target(false).with_filter(console_filter(verbose)))
        .try_init();
}

fn console_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n截图任务日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 把 tracing 事件转成一行文本推送给 [`LogHub`]
pub struct HubLayer {
    hub: LogHub,
}

impl HubLayer {
    pub fn new(hub: LogHub) -> Self {
        Self { hub }
    }
}

impl<S: Subscriber> Layer<S> for HubLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let line = visitor.into_line();
        if !line.is_empty() {
            self.hub.line(line);
        }
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: Vec<String>,
}

impl LineVisitor {
    fn into_line(self) -> String {
        let mut line = self.message.trim().to_string();
        for field in self.fields {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&field);
        }
        line
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 股票截图文档服务");
    info!("🌐 监听地址: http://{}", config.bind_addr);
    info!("📁 临时目录: {}", config.scratch_root);
    info!("{}", "=".repeat(60));
}

/// 记录任务开始信息
pub fn log_job_start(target: &StockTarget, comment: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始截图并生成文档: {}", target);
    if !comment.trim().is_empty() {
        info!("💬 备注: {}", truncate_text(comment, 40));
    }
    info!("{}", "=".repeat(60));
}

/// 记录任务完成信息
pub fn log_job_finished(document_url: &str, elapsed: Duration) {
    info!("\n{}", "─".repeat(60));
    info!("✅ 文档已生成: {}", document_url);
    info!("⏱️ 总耗时: {:.2} 秒", elapsed.as_secs_f64());
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::log_hub::LogEvent;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("一二三四五六", 3), "一二三...");
    }

    #[tokio::test]
    async fn test_hub_layer_forwards_crate_events() {
        let hub = LogHub::new();
        let mut sub = hub.subscribe();

        let subscriber = tracing_subscriber::registry().with(
            HubLayer::new(hub.clone())
                .with_filter(Targets::new().with_target(CRATE_TARGET, Level::INFO)),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "stock_snapshot::workflow", "📸 已截图 {}", 3);
            tracing::debug!(target: "stock_snapshot::workflow", "不会被转发");
            tracing::info!(target: "hyper::proto", "第三方日志不转发");
            tracing::warn!(target: "stock_snapshot::services", attempt = 2, "上传失败");
        });

        assert_eq!(sub.recv().await, Some(LogEvent::Line("📸 已截图 3".into())));
        assert_eq!(sub.recv().await, Some(LogEvent::Line("上传失败 attempt=2".into())));
        assert_eq!(hub.listener_count(), 1);
    }
}
