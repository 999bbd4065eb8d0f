//! 遥测发送：生命周期状态机、路由键、JSON 编码与各消息中间件后端。
//!
//! ```text
//! Point / log / Warning
//!        │ codec + routing
//!        ▼
//!  BrokerSender<C> ── supervisor (reconnect) ──┐
//!        │ publish (retry)                     │
//!        ▼                                     ▼
//!  BrokerClient: Mqtt | Amqp(channel pool) | Kafka | Memory
//! ```

mod amqp;
mod client;
pub mod codec;
mod error;
mod kafka;
mod memory;
mod mqtt;
mod pool;
mod routing;
mod sender;

pub use amqp::{AmqpClient, AmqpSenderConfig};
pub use client::{BrokerClient, OutboundMessage};
pub use error::{LogSendError, SenderError};
pub use kafka::{KafkaClient, KafkaSenderConfig};
pub use memory::MemoryClient;
pub use mqtt::{MqttClient, MqttSenderConfig, qos_from_u8};
pub use pool::{ChannelPool, Lease};
pub use routing::RoutingKeys;
pub use sender::{BrokerSender, DataSender, SenderOptions, SenderState};
