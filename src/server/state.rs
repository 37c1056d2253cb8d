use std::sync::Arc;

use crate::config::Config;
use crate::orchestrator::{InFlightJobs, JobRunner};
use crate::utils::log_hub::LogHub;

/// 所有请求共享的状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// 正在运行的任务
    pub jobs: InFlightJobs,
    /// SSE 日志广播
    pub hub: LogHub,
    pub runner: Arc<dyn JobRunner>,
}

impl AppState {
    pub fn new(config: Config, hub: LogHub, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            config: Arc::new(config),
            jobs: InFlightJobs::new(),
            hub,
            runner,
        }
    }
}
