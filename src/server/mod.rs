//! HTTP 服务
//!
//! - `GET /` 表单页面
//! - `POST /screenshot` 提交任务
//! - `GET /events` 实时日志（SSE）

pub mod handlers;
pub mod state;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
pub use state::AppState;

/// 上传图片的大小上限
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/assets/js/main.js", get(handlers::main_js))
        .route("/screenshot", post(handlers::screenshot))
        .route("/events", get(handlers::events))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 绑定地址并一直运行
pub async fn serve(config: &Config, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("无法监听地址: {}", config.bind_addr))?;
    info!("🌐 服务已启动: http://{}", config.bind_addr);
    axum::serve(listener, router(state))
        .await
        .context("HTTP 服务异常退出")?;
    Ok(())
}
