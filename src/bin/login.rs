//! 打开带界面的浏览器，手动登录目标网站
//!
//! 登录状态保存在配置目录里，之后的截图任务直接复用。
//! 传入 `--second` 时打开第二账号的配置目录。

use anyhow::{Context, Result};
use stock_snapshot::browser::{launch_browser, BrowserProfile};
use stock_snapshot::utils::logging;
use stock_snapshot::Config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::init_console(config.verbose_logging);

    let second = std::env::args().any(|arg| arg == "--second");
    let mut profile = if second {
        BrowserProfile::secondary(&config).context("没有配置第二账号的浏览器目录")?
    } else {
        BrowserProfile::primary(&config)
    };
    profile.headless = false;

    let session = launch_browser(&profile).await?;
    let page = session.browser().new_page(config.overview_url.as_str()).await?;
    info!("🔐 请在浏览器中登录，完成后按 Ctrl-C 退出");

    tokio::signal::ctrl_c().await?;
    drop(page);
    session.shutdown().await;
    info!("✓ 登录状态已保存到 {}", profile.user_data_dir.display());
    Ok(())
}
