//! 截图上下文
//!
//! 封装"我正在给哪只股票截图、截到哪了"这一信息

use std::fmt::Display;
use std::path::PathBuf;

use crate::infrastructure::ScratchDir;
use crate::models::{Artifact, StockTarget};

/// 截图上下文
///
/// 包含单次截图流程所需的上下文，以及按顺序收集到的产物
#[derive(Debug)]
pub struct CaptureCtx<'a> {
    /// 目标股票
    pub target: &'a StockTarget,

    /// 本次任务的临时目录
    pub scratch: &'a ScratchDir,

    /// 已截取的产物（按截图顺序）
    artifacts: Vec<Artifact>,
}

impl<'a> CaptureCtx<'a> {
    /// 创建新的截图上下文
    pub fn new(target: &'a StockTarget, scratch: &'a ScratchDir) -> Self {
        Self {
            target,
            scratch,
            artifacts: Vec::new(),
        }
    }

    pub fn record(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    pub fn record_image(&mut self, path: PathBuf) {
        self.record(Artifact::image(path));
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }
}

impl Display for CaptureCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.target.name)
    }
}
