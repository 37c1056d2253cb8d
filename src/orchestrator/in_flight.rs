//! 正在运行的任务登记表
//!
//! 同一个股票名（规范化之后）同一时间只允许一个任务

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::models::JobKey;

/// 正在运行的任务，可随意 clone
#[derive(Clone, Default)]
pub struct InFlightJobs {
    keys: Arc<Mutex<HashSet<JobKey>>>,
}

impl InFlightJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记任务，已有同名任务时返回 None
    ///
    /// 检查和插入在同一把锁里完成
    pub fn try_acquire(&self, key: JobKey) -> Option<JobGuard> {
        if !self.lock().insert(key.clone()) {
            return None;
        }
        debug!("登记任务: {}", key.as_str());
        Some(JobGuard {
            key,
            jobs: self.clone(),
        })
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<JobKey>> {
        self.keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 任务占位，drop 时释放
pub struct JobGuard {
    key: JobKey,
    jobs: InFlightJobs,
}

impl JobGuard {
    pub fn key(&self) -> &JobKey {
        &self.key
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.jobs.lock().remove(&self.key);
        debug!("释放任务: {}", self.key.as_str());
    }
}
