//! HTTP 处理函数

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use futures::stream::{self, Stream, StreamExt};
use tracing::{error, info};

use crate::error::AppError;
use crate::models::{JobKey, JobRequest, StockTarget, UserImage};
use crate::server::state::AppState;
use crate::utils::log_hub::LogEvent;

const INDEX_HTML: &str = include_str!("../../public/index.html");
const MAIN_JS: &str = include_str!("../../public/assets/js/main.js");

/// 浏览器断线后重连的间隔
const SSE_RETRY: Duration = Duration::from_millis(10_000);

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn main_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript; charset=utf-8")], MAIN_JS)
}

/// 表单字段
#[derive(Debug, Default)]
struct ScreenshotForm {
    stock_name: String,
    stock_symbol: Option<String>,
    comment: String,
    image: Option<UserImage>,
}

impl ScreenshotForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InvalidRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "stockName" => form.stock_name = field_text(field).await?,
                "stockSymbol" => form.stock_symbol = Some(field_text(field).await?),
                "comment" => form.comment = field_text(field).await?,
                "image" => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
                    // 没选文件时浏览器也会提交一个空字段
                    if !bytes.is_empty() {
                        form.image = Some(UserImage {
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn into_request(self) -> JobRequest {
        let mut request = JobRequest::new(StockTarget::new(self.stock_name, self.stock_symbol))
            .with_comment(self.comment);
        if let Some(image) = self.image {
            request = request.with_user_image(image);
        }
        request
    }
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))
}

/// 提交截图任务，等任务结束后返回文档链接
pub async fn screenshot(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<String, AppError> {
    let form = ScreenshotForm::read(multipart).await?;
    let key = JobKey::normalize(&form.stock_name)
        .ok_or_else(|| AppError::InvalidRequest("Missing stock name".to_string()))?;
    let request = form.into_request();

    let guard = state.jobs.try_acquire(key).ok_or_else(|| AppError::JobConflict {
        name: request.target.name.clone(),
    })?;
    info!("📥 收到截图请求: {}", request.target);

    // 任务和占位一起放进独立的 task，客户端断开也会跑完并释放占位
    let runner = state.runner.clone();
    let handle = tokio::spawn(async move {
        let _guard = guard;
        runner.run(request).await
    });

    let limit = state.config.job_timeout();
    let report = match tokio::time::timeout(limit, handle).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => return Err(AppError::Other(format!("任务异常退出: {}", e))),
        Err(_) => return Err(AppError::Timeout(limit.as_secs())),
    };

    Ok(format!(
        "Done. Document created: {}\nTotal time: {:.2} seconds",
        report.document_url,
        report.elapsed.as_secs_f64()
    ))
}

/// 实时日志流
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.hub.subscribe();
    let retry = stream::once(async { Ok::<_, Infallible>(Event::default().retry(SSE_RETRY)) });
    let logs = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        Some((Ok(to_sse_event(event)), subscription))
    });
    Sse::new(retry.chain(logs)).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: LogEvent) -> Event {
    match event {
        LogEvent::Line(line) => Event::default().data(line.replace('\r', "")),
        LogEvent::Done(url) => Event::default().event("done").data(url),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::InvalidRequest(message) => message.clone(),
            AppError::JobConflict { .. } => self.to_string(),
            _ => {
                error!("❌ 请求处理失败: {}", self);
                format!("Failed to complete the process: {}", self)
            }
        };
        (status, body).into_response()
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::JobConflict { .. } => StatusCode::CONFLICT,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
