use crate::envelope::ControlReply;
use crate::error::ControlError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// 会话内请求/回复通道容量。
pub const SESSION_BUFFER: usize = 64;

/// 一次控制通道会话。
///
/// `requests` 关闭即视为断线；`replies` 为出站回复。
pub struct ControlSession {
    pub requests: mpsc::Receiver<Vec<u8>>,
    pub replies: mpsc::Sender<ControlReply>,
}

/// 控制通道传输抽象（双向流）。
#[async_trait]
pub trait ControlTransport: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn connect(&self) -> Result<ControlSession, ControlError>;
}

#[derive(Default)]
struct LoopbackShared {
    inbound: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    refuse: AtomicBool,
}

/// 进程内控制通道（用于测试与嵌入）。
pub struct LoopbackTransport {
    shared: Arc<LoopbackShared>,
    replies: mpsc::Sender<ControlReply>,
    sessions: watch::Sender<u64>,
}

/// 平台侧句柄：注入请求、读取回复、模拟断线。
pub struct LoopbackPeer {
    shared: Arc<LoopbackShared>,
    replies: mpsc::Receiver<ControlReply>,
    sessions: watch::Receiver<u64>,
}

impl LoopbackTransport {
    pub fn new() -> (Self, LoopbackPeer) {
        let shared = Arc::new(LoopbackShared::default());
        let (reply_tx, reply_rx) = mpsc::channel(SESSION_BUFFER);
        let (sessions_tx, sessions_rx) = watch::channel(0u64);
        (
            Self {
                shared: Arc::clone(&shared),
                replies: reply_tx,
                sessions: sessions_tx,
            },
            LoopbackPeer {
                shared,
                replies: reply_rx,
                sessions: sessions_rx,
            },
        )
    }
}

#[async_trait]
impl ControlTransport for LoopbackTransport {
    fn name(&self) -> &'static str {
        "loopback"
    }

    async fn connect(&self) -> Result<ControlSession, ControlError> {
        if self.shared.refuse.load(Ordering::Acquire) {
            return Err(ControlError::Connect("loopback refused".to_string()));
        }
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        let mut inbound = self
            .shared
            .inbound
            .lock()
            .map_err(|_| ControlError::Connect("loopback state poisoned".to_string()))?;
        *inbound = Some(tx);
        drop(inbound);
        self.sessions.send_modify(|count| *count += 1);
        Ok(ControlSession {
            requests: rx,
            replies: self.replies.clone(),
        })
    }
}

impl LoopbackPeer {
    /// 发送一条 JSON 请求。
    pub async fn send(&self, envelope: serde_json::Value) -> Result<(), ControlError> {
        let frame =
            serde_json::to_vec(&envelope).map_err(|err| ControlError::Envelope(err.to_string()))?;
        self.send_raw(frame).await
    }

    pub async fn send_raw(&self, frame: Vec<u8>) -> Result<(), ControlError> {
        let sender = self
            .shared
            .inbound
            .lock()
            .map_err(|_| ControlError::Closed)?
            .clone()
            .ok_or(ControlError::Closed)?;
        sender.send(frame).await.map_err(|_| ControlError::Closed)
    }

    pub async fn recv_reply(&mut self) -> Option<ControlReply> {
        self.replies.recv().await
    }

    /// 断开当前会话，分发器将按重连间隔重新连接。
    pub fn disconnect(&self) {
        if let Ok(mut inbound) = self.shared.inbound.lock() {
            inbound.take();
        }
    }

    /// 之后的连接请求是否失败。
    pub fn refuse_connect(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::Release);
    }

    /// 等待累计会话数达到 `count`。
    pub async fn wait_for_session(&mut self, count: u64) -> Result<(), ControlError> {
        self.sessions
            .wait_for(|sessions| *sessions >= count)
            .await
            .map(|_| ())
            .map_err(|_| ControlError::Closed)
    }
}
