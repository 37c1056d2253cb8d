//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `in_flight` - 正在运行的任务登记表
//! - 同一个股票同一时间只允许一个任务
//! - `JobGuard` 被 drop 时自动释放
//!
//! ### `job_runner` - 单个任务处理器
//! - 临时目录 → 截图 → 生成文档 → 清理
//!
//! ## 层次关系
//!
//! ```text
//! server (HTTP 请求)
//!     ↓
//! job_runner (处理单个任务)
//!     ↓
//! workflow::Capturer / services::DocumentAssembler
//!     ↓
//! infrastructure (PageDriver / ScratchDir)
//! ```

pub mod in_flight;
pub mod job_runner;

pub use in_flight::{InFlightJobs, JobGuard};
pub use job_runner::{JobRunner, StockJob};
