//! 任务相关数据结构

use std::fmt::{self, Display};
use std::time::Duration;

/// 要截图的股票
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockTarget {
    /// 股票名称（用于站内搜索）
    pub name: String,
    /// 股票代码（用于文档标题），可为空
    pub symbol: Option<String>,
}

impl StockTarget {
    pub fn new(name: impl Into<String>, symbol: Option<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            symbol: symbol
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }

    /// 文档标题用的代码，没有代码时退回名称
    pub fn display_symbol(&self) -> &str {
        self.symbol.as_deref().unwrap_or(&self.name)
    }
}

impl Display for StockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbol {
            Some(symbol) => write!(f, "{} ({})", self.name, symbol),
            None => write!(f, "{}", self.name),
        }
    }
}

/// 去重用的任务键
///
/// 规范化规则：去掉首尾空白，内部连续空白合并为一个空格，统一转大写。
/// 因此 " tata  motors" 和 "TATA MOTORS" 视为同一个任务。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey(String);

impl JobKey {
    /// 规范化后为空则返回 None
    pub fn normalize(raw: &str) -> Option<Self> {
        let key = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if key.is_empty() {
            None
        } else {
            Some(Self(key.to_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 用户随表单上传的图片
#[derive(Debug, Clone)]
pub struct UserImage {
    pub bytes: Vec<u8>,
}

/// 一次截图任务请求
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub target: StockTarget,
    pub comment: String,
    pub user_image: Option<UserImage>,
}

impl JobRequest {
    pub fn new(target: StockTarget) -> Self {
        Self {
            target,
            comment: String::new(),
            user_image: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into().trim().to_string();
        self
    }

    pub fn with_user_image(mut self, image: UserImage) -> Self {
        self.user_image = Some(image);
        self
    }
}

/// 任务完成结果
#[derive(Debug, Clone)]
pub struct JobReport {
    pub document_url: String,
    pub elapsed: Duration,
    pub artifact_count: usize,
    /// 股票报告 PDF 的公开链接
    pub report_pdf_url: Option<String>,
    /// 整份文档导出的 PDF 链接
    pub exported_pdf_url: Option<String>,
}
