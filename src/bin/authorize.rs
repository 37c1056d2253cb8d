//! 一次性 Google 授权
//!
//! 打开打印出的地址同意授权，再把页面给出的授权码粘贴回来

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use stock_snapshot::clients::GoogleAuth;
use stock_snapshot::utils::logging;
use stock_snapshot::Config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::init_console(config.verbose_logging);

    let auth = GoogleAuth::new(&config, reqwest::Client::new());
    let url = auth.client_secret().await?.authorization_url()?;

    println!("{}", "=".repeat(60));
    println!("请在浏览器中打开以下地址完成授权:\n\n{}\n", url);
    print!("粘贴授权码: ");
    io::stdout().flush()?;

    let mut code = String::new();
    io::stdin()
        .lock()
        .read_line(&mut code)
        .context("无法读取授权码")?;

    auth.exchange_code(&code).await?;
    info!("✅ 授权完成，令牌已保存到 {}", config.token_path);
    Ok(())
}
