//! 浏览器启动器
//!
//! 截图流程只通过 [`BrowserLauncher`] / [`BrowserHost`] 拿页面，
//! 不直接接触 chromiumoxide

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::connection::connect_to_browser;
use super::launch::{launch_browser, BrowserProfile, BrowserSession};
use crate::config::Config;
use crate::infrastructure::page_driver::{PageActions, PageDriver};

/// 使用哪个账号的浏览器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserAccount {
    /// 主账号（配置了调试端口时连接已开着的浏览器）
    Primary,
    /// 第二账号，只用来截图表
    Second,
}

/// 一个已经打开的浏览器
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// 新开一个页面并打开 `url`
    async fn open_page(&self, url: &str) -> Result<Box<dyn PageActions>>;

    /// 结束会话（连接到外部浏览器时只断开，不关闭）
    async fn shutdown(self: Box<Self>);
}

/// 按账号打开浏览器
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// 是否配置了第二账号
    fn has_second_account(&self) -> bool;

    async fn open(&self, account: BrowserAccount) -> Result<Box<dyn BrowserHost>>;
}

/// 基于本机 Chrome 的启动器
pub struct ChromeLauncher {
    config: Config,
}

impl ChromeLauncher {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    fn has_second_account(&self) -> bool {
        self.config.second_profile_dir.is_some()
    }

    async fn open(&self, account: BrowserAccount) -> Result<Box<dyn BrowserHost>> {
        let session = match account {
            BrowserAccount::Primary => match self.config.browser_debug_port {
                Some(port) => connect_to_browser(port).await?,
                None => launch_browser(&BrowserProfile::primary(&self.config)).await?,
            },
            BrowserAccount::Second => {
                let profile = BrowserProfile::secondary(&self.config).context("未配置第二账号的浏览器目录")?;
                launch_browser(&profile).await?
            }
        };

        Ok(Box::new(ChromeHost {
            session,
            load_timeout: self.config.step_timeout(),
            action_timeout: self.config.action_timeout(),
        }))
    }
}

struct ChromeHost {
    session: BrowserSession,
    load_timeout: Duration,
    action_timeout: Duration,
}

#[async_trait]
impl BrowserHost for ChromeHost {
    async fn open_page(&self, url: &str) -> Result<Box<dyn PageActions>> {
        let page = PageDriver::open(self.session.browser(), url, self.load_timeout, self.action_timeout).await?;
        Ok(Box::new(page))
    }

    async fn shutdown(self: Box<Self>) {
        self.session.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_account_follows_config() {
        let config = Config {
            second_profile_dir: None,
            ..Config::default()
        };
        assert!(!ChromeLauncher::new(&config).has_second_account());

        let config = Config {
            second_profile_dir: Some("./profiles/second".into()),
            ..Config::default()
        };
        assert!(ChromeLauncher::new(&config).has_second_account());
    }

    #[tokio::test]
    async fn test_second_account_requires_profile() {
        let config = Config {
            second_profile_dir: None,
            ..Config::default()
        };
        let err = ChromeLauncher::new(&config)
            .open(BrowserAccount::Second)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("第二账号"));
    }
}
