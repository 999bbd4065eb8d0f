use crate::client::{BrokerClient, OutboundMessage};
use crate::error::SenderError;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// 进程内客户端（用于接线、试运行与测试）。
///
/// 可注入连接失败与发布失败，模拟断线。
#[derive(Debug, Default)]
pub struct MemoryClient {
    connected: AtomicBool,
    refuse_connect: AtomicBool,
    failing_publishes: AtomicU32,
    connects: AtomicU32,
    published: Mutex<Vec<OutboundMessage>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已发布消息的副本。
    pub fn published(&self) -> Vec<OutboundMessage> {
        self.published
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// 模拟连接丢失。
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// 之后的 `connect` 调用是否失败。
    pub fn refuse_connect(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::Release);
    }

    /// 接下来 `count` 次发布失败。
    pub fn fail_next_publishes(&self, count: u32) {
        self.failing_publishes.store(count, Ordering::Release);
    }

    /// 成功建立连接的次数。
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::Acquire)
    }
}

#[async_trait]
impl BrokerClient for MemoryClient {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> Result<(), SenderError> {
        if self.refuse_connect.load(Ordering::Acquire) {
            return Err(SenderError::Connect("connection refused".to_string()));
        }
        self.connected.store(true, Ordering::Release);
        self.connects.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn publish(&self, message: &OutboundMessage) -> Result<(), SenderError> {
        if !self.is_connected() {
            return Err(SenderError::NotConnected);
        }
        let failing = self
            .failing_publishes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(SenderError::Publish("injected failure".to_string()));
        }
        let mut published = self
            .published
            .lock()
            .map_err(|_| SenderError::Publish("memory buffer poisoned".to_string()))?;
        published.push(message.clone());
        Ok(())
    }
}
