//! # Stock Snapshot
//!
//! 输入一个股票名称，自动截取多个网站的页面，下载股票报告 PDF，
//! 再把所有截图整理成一份公开的 Google 文档
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动或连接浏览器，每个账号一个配置目录；`BrowserLauncher` 按账号提供浏览器
//! - `infrastructure/` - `PageDriver` 持有 Page，通过 `PageActions` 只暴露页面操作能力；`ScratchDir` 管理任务临时目录
//! - `clients/` - Google OAuth / Docs / Drive 的 REST 客户端
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `DocumentService` - 文档 / 存储接口
//! - `DocumentAssembler` - 把截图依次追加到文档
//! - `ReportDownloader` - 下载 PDF 报告
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一只股票"的完整截图流程
//! - `CaptureCtx` - 上下文封装（股票 + 临时目录 + 已截图文件）
//! - `BrowserCapturer` - 流程编排（报告 → 概览 → 图表 → 第二账号图表）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/in_flight` - 同一股票同时只允许一个任务
//! - `orchestrator/job_runner` - 截图 → 生成文档 → 清理
//! - `server/` - HTTP 表单和 SSE 实时日志
//!
//! ## 模块结构

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod server;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{PageDriver, ScratchDir};
pub use models::{Artifact, ArtifactKind, JobKey, JobReport, JobRequest, StockTarget};
pub use orchestrator::{InFlightJobs, JobRunner, StockJob};
pub use server::AppState;
pub use services::{DocumentAssembler, DocumentService};
pub use utils::log_hub::LogHub;
pub use workflow::{BrowserCapturer, Capturer};
