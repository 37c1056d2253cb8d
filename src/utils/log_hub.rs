//! 日志广播中心
//!
//! 维护所有 SSE 监听者：连接时注册，断开（subscription 被 drop）时注销

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

/// 推送给监听者的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// 普通日志行
    Line(String),
    /// 任务完成，携带文档链接
    Done(String),
}

type Listeners = HashMap<u64, mpsc::UnboundedSender<LogEvent>>;

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    listeners: Mutex<Listeners>,
}

/// 日志广播中心，可随意 clone
#[derive(Clone, Default)]
pub struct LogHub {
    inner: Arc<HubInner>,
}

impl LogHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个新的监听者
    pub fn subscribe(&self) -> LogSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners().insert(id, tx);
        LogSubscription {
            id,
            rx,
            hub: self.clone(),
        }
    }

    /// 向所有监听者推送事件，顺便清理已关闭的监听者
    pub fn publish(&self, event: LogEvent) {
        self.listeners()
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    pub fn line(&self, message: impl Into<String>) {
        self.publish(LogEvent::Line(message.into()));
    }

    pub fn done(&self, document_url: impl Into<String>) {
        self.publish(LogEvent::Done(document_url.into()));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    fn remove(&self, id: u64) {
        self.listeners().remove(&id);
    }

    // 日志层在任意线程里调用，锁中毒时继续使用内部数据
    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 单个监听者的接收端，drop 时自动注销
pub struct LogSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<LogEvent>,
    hub: LogHub,
}

impl LogSubscription {
    pub async fn recv(&mut self) -> Option<LogEvent> {
        self.rx.recv().await
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}
