//! 页面驱动 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"操作页面"的能力

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

/// 等待元素 / 页面跳转时的轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 截图流程用到的页面操作
///
/// 真实实现是 [`PageDriver`]，流程层只依赖这个 trait
#[async_trait]
pub trait PageActions: Send + Sync {
    /// 导航到 `url` 并等待页面加载
    async fn goto(&self, url: &str, load_timeout: Duration) -> Result<()>;

    /// 当前页面地址
    async fn current_url(&self) -> Result<Option<String>>;

    /// 固定等待，给页面脚本留出渲染时间
    async fn pause(&self, millis: u64);

    /// 等待元素出现
    async fn wait_for_selector(&self, selector: &str, limit: Duration) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// 点击元素，等到地址变化并加载完成
    async fn click_and_wait_for_navigation(&self, selector: &str, load_timeout: Duration) -> Result<()>;

    /// 清空输入框并一次性输入文本
    async fn fill(&self, selector: &str, text: &str) -> Result<()>;

    /// 逐字输入，触发站点的联想搜索
    async fn type_slowly(&self, selector: &str, text: &str, delay: Duration) -> Result<()>;

    /// 清空输入框，返回元素是否存在
    async fn clear(&self, selector: &str) -> Result<bool>;

    /// 读取第一个匹配元素的属性
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;

    /// 元素是否存在且可见
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    /// 向下滚动 `fraction` 个视口高度，返回滚动后的 scrollY
    async fn scroll_viewport(&self, fraction: f64) -> Result<f64>;

    /// 截取当前视口并保存为 PNG
    async fn screenshot(&self, path: &Path) -> Result<PathBuf>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// 页面驱动
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露导航、点击、输入、截图等能力，所有等待都有超时
/// - 不认识股票 / 站点
/// - 不处理业务流程
pub struct PageDriver {
    page: Page,
    action_timeout: Duration,
}

impl PageDriver {
    /// 创建新的页面驱动
    ///
    /// `action_timeout` 用于点击、输入、等待元素等单个操作
    pub fn new(page: Page, action_timeout: Duration) -> Self {
        Self {
            page,
            action_timeout,
        }
    }

    /// 在浏览器中新开一个页面并打开 `url`
    pub async fn open(
        browser: &Browser,
        url: &str,
        load_timeout: Duration,
        action_timeout: Duration,
    ) -> Result<Self> {
        debug!("新建页面: {}", url);
        let page = bounded(load_timeout, &format!("打开 {}", url), browser.new_page(url)).await?;
        Ok(Self::new(page, action_timeout))
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    async fn find(&self, selector: &str, limit: Duration) -> Result<Element> {
        let started = Instant::now();
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if started.elapsed() >= limit {
                bail!("等待元素 {} 超时 ({} 秒)", selector, limit.as_secs());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// 关闭页面
    pub async fn close(self) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}

#[async_trait]
impl PageActions for PageDriver {
    async fn goto(&self, url: &str, load_timeout: Duration) -> Result<()> {
        debug!("导航到: {}", url);
        bounded(load_timeout, &format!("导航到 {}", url), self.page.goto(url)).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.page.url().await?)
    }

    async fn pause(&self, millis: u64) {
        sleep(Duration::from_millis(millis)).await;
    }

    async fn wait_for_selector(&self, selector: &str, limit: Duration) -> Result<()> {
        self.find(selector, limit).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self.find(selector, self.action_timeout).await?;
        bounded(self.action_timeout, &format!("点击 {}", selector), element.click()).await?;
        Ok(())
    }

    async fn click_and_wait_for_navigation(&self, selector: &str, load_timeout: Duration) -> Result<()> {
        let before = self.current_url().await?;
        self.click(selector).await?;

        let what = format!("点击 {} 后等待页面跳转", selector);
        let before = &before;
        poll_until(load_timeout, &what, move || async move {
            Ok(self.current_url().await?.as_ref() != before.as_ref())
        })
        .await?;
        bounded(load_timeout, "等待页面加载", self.page.wait_for_navigation()).await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.find(selector, self.action_timeout).await?;
        self.clear(selector).await?;
        bounded(self.action_timeout, &format!("聚焦 {}", selector), element.click()).await?;
        bounded(self.action_timeout, &format!("输入 {}", selector), element.type_str(text)).await?;
        Ok(())
    }

    async fn type_slowly(&self, selector: &str, text: &str, delay: Duration) -> Result<()> {
        let element = self.find(selector, self.action_timeout).await?;
        bounded(self.action_timeout, &format!("聚焦 {}", selector), element.click()).await?;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            let key: &str = ch.encode_utf8(&mut buf);
            bounded(self.action_timeout, &format!("输入 {}", selector), element.type_str(key)).await?;
            sleep(delay).await;
        }
        Ok(())
    }

    async fn clear(&self, selector: &str) -> Result<bool> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) return false;
                el.value = '';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                return true;
            }})()
            "#,
            js_string(selector)?
        );
        self.eval_as(script).await
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                return el ? el.getAttribute({}) : null;
            }})()
            "#,
            js_string(selector)?,
            js_string(name)?
        );
        self.eval_as(script).await
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                if (style.display === 'none' || style.visibility === 'hidden') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }})()
            "#,
            js_string(selector)?
        );
        self.eval_as(script).await
    }

    async fn scroll_viewport(&self, fraction: f64) -> Result<f64> {
        let script = format!(
            r#"
            (() => {{
                window.scrollBy(0, window.innerHeight * {});
                return window.scrollY;
            }})()
            "#,
            fraction
        );
        self.eval_as(script).await
    }

    async fn screenshot(&self, path: &Path) -> Result<PathBuf> {
        let params = ScreenshotParams::builder().build();
        bounded(
            self.action_timeout,
            &format!("截图 {}", path.display()),
            self.page.save_screenshot(params, path),
        )
        .await?;
        debug!("已保存截图: {}", path.display());
        Ok(path.to_path_buf())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        PageDriver::close(*self).await
    }
}

/// 给单个页面操作加上超时
async fn bounded<T, E, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<anyhow::Error>,
{
    match timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into).with_context(|| format!("{} 失败", what)),
        Err(_) => bail!("{} 超时 ({} 秒)", what, limit.as_secs()),
    }
}

/// 反复检查直到条件成立，超过 `limit` 报错
async fn poll_until<F, Fut>(limit: Duration, what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let started = Instant::now();
    loop {
        if check().await? {
            return Ok(());
        }
        if started.elapsed() >= limit {
            bail!("{} 超时 ({} 秒)", what, limit.as_secs());
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// 转成 JS 字符串字面量
fn js_string(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string(r##"a[href="#x"]"##).unwrap(), r##""a[href=\"#x\"]""##);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let never = std::future::pending::<std::result::Result<(), std::io::Error>>();
        let err = bounded(Duration::from_millis(10), "等待", never).await.unwrap_err();
        assert!(err.to_string().contains("超时"));
    }

    #[tokio::test]
    async fn test_bounded_adds_context() {
        let failing = async {
            Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
        };
        let err = bounded(Duration::from_secs(1), "点击 #x", failing).await.unwrap_err();
        assert_eq!(err.to_string(), "点击 #x 失败");
        assert_eq!(err.root_cause().to_string(), "boom");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_waits_for_url_change() {
        // 点击后第三次检查时地址才变化
        let checks = &AtomicU32::new(0);
        let before = &Some("https://www.example.com/".to_string());
        let result = poll_until(Duration::from_secs(5), "等待页面跳转", move || async move {
            let n = checks.fetch_add(1, Ordering::SeqCst) + 1;
            let url = if n >= 3 {
                Some("https://www.example.com/stock/infy".to_string())
            } else {
                before.clone()
            };
            Ok(url.as_ref() != before.as_ref())
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_fails_when_page_never_navigates() {
        let err = poll_until(Duration::from_secs(2), "等待页面跳转", || async { Ok(false) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("超时"));
    }
}
