use std::sync::Arc;

use anyhow::Result;
use stock_snapshot::clients::{GoogleAuth, GoogleWorkspace};
use stock_snapshot::utils::logging;
use stock_snapshot::{server, AppState, BrowserCapturer, Config, LogHub, StockJob};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志（控制台 + 文件 + SSE 广播）
    let hub = LogHub::new();
    logging::init(&config, &hub)?;
    logging::log_startup(&config);

    let http = reqwest::Client::new();
    let auth = Arc::new(GoogleAuth::new(&config, http.clone()));
    let docs = Arc::new(GoogleWorkspace::new(http.clone(), auth));
    let capturer = Arc::new(BrowserCapturer::new(&config, http));

    let runner = Arc::new(StockJob::new(&config, capturer, docs, hub.clone()));
    let state = AppState::new(config.clone(), hub, runner);

    server::serve(&config, state).await
}
