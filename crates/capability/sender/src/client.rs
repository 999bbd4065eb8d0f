use crate::error::SenderError;
use async_trait::async_trait;

/// 待发布的一条消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// topic / routing key。
    pub routing_key: String,
    /// 分区键（设备 id），仅 Kafka 使用。
    pub key: String,
    pub payload: Vec<u8>,
}

/// 消息中间件客户端抽象。
///
/// 实现方独占自己的连接资源；`connect` 可重复调用以替换失效连接。
#[async_trait]
pub trait BrokerClient: Send + Sync + 'static {
    /// 后端名（日志字段）。
    fn name(&self) -> &'static str;

    /// 路由键分隔符。
    fn separator(&self) -> char {
        '.'
    }

    async fn connect(&self) -> Result<(), SenderError>;

    async fn close(&self);

    fn is_connected(&self) -> bool;

    async fn publish(&self, message: &OutboundMessage) -> Result<(), SenderError>;
}
