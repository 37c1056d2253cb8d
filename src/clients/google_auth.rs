/// Google OAuth2 授权
///
/// 使用"已安装应用"流程：
/// 1. 首次运行 `authorize` 命令，浏览器里同意授权后把 code 粘贴回来，换到 refresh_token 存入 token 文件
/// 2. 之后每次调用前检查 access_token，快过期时用 refresh_token 自动刷新
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/drive.file",
    "https://www.googleapis.com/auth/documents",
];

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// 距离过期不足这个时间（毫秒）就提前刷新
const EXPIRY_MARGIN_MS: i64 = 60_000;

/// 授权前置条件缺失
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("凭据文件不存在: {0}")]
    MissingCredentials(String),
    #[error("凭据文件格式错误: {0}")]
    InvalidCredentials(String),
    #[error("授权令牌不存在: {0}，请先运行 authorize 完成授权")]
    MissingToken(String),
    #[error("授权令牌中没有 refresh_token，请重新运行 authorize")]
    NoRefreshToken,
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

/// OAuth 客户端信息（来自 Google Cloud 控制台下载的凭据文件）
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

impl ClientSecret {
    /// 解析凭据文件内容，支持 installed 和 web 两种类型
    pub fn from_json(content: &str) -> std::result::Result<Self, AuthError> {
        let file: CredentialsFile = serde_json::from_str(content)
            .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;
        let client = file
            .installed
            .or(file.web)
            .ok_or_else(|| AuthError::InvalidCredentials("缺少 installed / web 字段".into()))?;
        if client.client_id.is_empty()
            || client.client_secret.is_empty()
            || client.redirect_uris.is_empty()
        {
            return Err(AuthError::InvalidCredentials(
                "client_id / client_secret / redirect_uris 不完整".into(),
            ));
        }
        Ok(client)
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris.first().map(String::as_str).unwrap_or_default()
    }

    /// 生成离线授权链接
    pub fn authorization_url(&self) -> Result<String> {
        let scope = SCOPES.join(" ");
        let url = reqwest::Url::parse_with_params(
            AUTH_ENDPOINT,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri()),
                ("response_type", "code"),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("scope", scope.as_str()),
            ],
        )?;
        Ok(url.into())
    }
}

/// 保存在 token 文件中的令牌（字段与 googleapis 的 token.json 兼容）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredToken {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// 过期时间（毫秒时间戳）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl StoredToken {
    /// access_token 存在且距离过期还有余量
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        self.access_token.is_some()
            && self
                .expiry_date
                .is_some_and(|expiry| expiry - EXPIRY_MARGIN_MS > now_ms)
    }

    /// 合并令牌接口的响应；刷新时接口通常不返回 refresh_token，沿用旧值
    fn merge(&self, response: TokenResponse, now_ms: i64) -> Self {
        Self {
            access_token: Some(response.access_token),
            refresh_token: response.refresh_token.or_else(|| self.refresh_token.clone()),
            scope: response.scope.or_else(|| self.scope.clone()),
            token_type: response.token_type.or_else(|| self.token_type.clone()),
            expiry_date: response.expires_in.map(|secs| now_ms + secs * 1000),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    token_type: Option<String>,
}

/// Google 授权管理
pub struct GoogleAuth {
    credentials_path: PathBuf,
    token_path: PathBuf,
    http: reqwest::Client,
    cached: Mutex<Option<StoredToken>>,
}

impl GoogleAuth {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            credentials_path: PathBuf::from(&config.credentials_path),
            token_path: PathBuf::from(&config.token_path),
            http,
            cached: Mutex::new(None),
        }
    }

    /// 读取凭据文件
    pub async fn client_secret(&self) -> Result<ClientSecret> {
        let content = read_if_exists(&self.credentials_path)
            .await?
            .ok_or_else(|| AuthError::MissingCredentials(self.credentials_path.display().to_string()))?;
        Ok(ClientSecret::from_json(&content)?)
    }

    /// 获取可用的 access_token，必要时自动刷新
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = now_ms();

        if cached.is_none() {
            *cached = Some(self.load_token().await?);
        }
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            if let Some(access) = &token.access_token {
                return Ok(access.clone());
            }
        }

        let current = cached.clone().unwrap_or_default();
        let refreshed = self.refresh(&current).await?;
        self.save_token(&refreshed).await?;
        let access = refreshed
            .access_token
            .clone()
            .context("刷新后没有 access_token")?;
        *cached = Some(refreshed);
        Ok(access)
    }

    /// 用一次性授权码换取令牌并写入 token 文件
    pub async fn exchange_code(&self, code: &str) -> Result<StoredToken> {
        let code = code.trim();
        if code.is_empty() {
            bail!("没有提供授权码");
        }
        let client = self.client_secret().await?;
        let response = self
            .token_request(&[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("redirect_uri", client.redirect_uri()),
                ("grant_type", "authorization_code"),
                ("code", code),
            ])
            .await?;
        let token = StoredToken::default().merge(response, now_ms());
        self.save_token(&token).await?;
        *self.cached.lock().await = Some(token.clone());
        info!("✓ 授权令牌已保存到 {}", self.token_path.display());
        Ok(token)
    }

    async fn refresh(&self, current: &StoredToken) -> Result<StoredToken> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or(AuthError::NoRefreshToken)?;
        let client = self.client_secret().await?;
        debug!("刷新 Google access_token");
        let response = self
            .token_request(&[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;
        Ok(current.merge(response, now_ms()))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(form)
            .send()
            .await
            .context("令牌接口请求失败")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("令牌接口返回错误 ({}): {}", status, body);
        }
        Ok(response.json().await.context("无法解析令牌接口响应")?)
    }

    async fn load_token(&self) -> Result<StoredToken> {
        let content = read_if_exists(&self.token_path)
            .await?
            .ok_or_else(|| AuthError::MissingToken(self.token_path.display().to_string()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("无法解析令牌文件: {}", self.token_path.display()))
    }

    async fn save_token(&self, token: &StoredToken) -> Result<()> {
        let json = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&self.token_path, json)
            .await
            .with_context(|| format!("无法写入令牌文件: {}", self.token_path.display()))
    }
}

async fn read_if_exists(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("无法读取文件: {}", path.display())),
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
