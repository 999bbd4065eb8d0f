use crate::client::{BrokerClient, OutboundMessage};
use crate::error::SenderError;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use rdkafka::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Kafka 发送后端配置。
#[derive(Debug, Clone)]
pub struct KafkaSenderConfig {
    /// `host:port[,host:port]`。
    pub brokers: String,
    pub client_id: String,
    /// 元数据探测与投递超时。
    pub timeout: Duration,
}

/// Kafka 后端（rdkafka `FutureProducer`）。
///
/// topic 为完整的点分路由键，消息 key 为设备 id，同一设备的消息落在同一分区。
pub struct KafkaClient {
    config: KafkaSenderConfig,
    producer: ArcSwapOption<FutureProducer>,
    healthy: AtomicBool,
}

impl KafkaClient {
    pub fn new(config: KafkaSenderConfig) -> Self {
        Self {
            config,
            producer: ArcSwapOption::from(None),
            healthy: AtomicBool::new(false),
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", self.config.brokers.as_str());
        cfg.set("client.id", self.config.client_id.as_str());
        cfg.set(
            "message.timeout.ms",
            self.config.timeout.as_millis().to_string(),
        );
        cfg
    }
}

#[async_trait]
impl BrokerClient for KafkaClient {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn connect(&self) -> Result<(), SenderError> {
        self.healthy.store(false, Ordering::Release);
        let producer: FutureProducer = self
            .client_config()
            .create()
            .map_err(|err| SenderError::Connect(err.to_string()))?;

        // 生产者创建不触网，用一次元数据拉取确认 broker 可达
        let probe = producer.clone();
        let timeout = self.config.timeout;
        tokio::task::spawn_blocking(move || {
            probe
                .client()
                .fetch_metadata(None, timeout)
                .map(|_| ())
        })
        .await
        .map_err(|err| SenderError::Connect(err.to_string()))?
        .map_err(|err| SenderError::Connect(err.to_string()))?;

        self.producer.store(Some(Arc::new(producer)));
        self.healthy.store(true, Ordering::Release);
        info!(target: "dsdk.sender", brokers = %self.config.brokers, "kafka_connected");
        Ok(())
    }

    async fn close(&self) {
        self.healthy.store(false, Ordering::Release);
        if let Some(producer) = self.producer.swap(None) {
            let timeout = self.config.timeout;
            let flushed =
                tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout))).await;
            if let Ok(Err(err)) = flushed {
                warn!(target: "dsdk.sender", error = %err, "kafka_flush_failed");
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.healthy.load(Ordering::Acquire) && self.producer.load().is_some()
    }

    async fn publish(&self, message: &OutboundMessage) -> Result<(), SenderError> {
        let Some(producer) = self.producer.load_full() else {
            return Err(SenderError::NotConnected);
        };
        let record = FutureRecord::to(message.routing_key.as_str())
            .key(message.key.as_str())
            .payload(message.payload.as_slice());
        match producer
            .send(record, Timeout::After(self.config.timeout))
            .await
        {
            Ok(_) => Ok(()),
            Err((err, _)) => {
                // 交给监督任务重新探测
                self.healthy.store(false, Ordering::Release);
                Err(SenderError::Publish(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_before_connect_is_not_connected() {
        let client = KafkaClient::new(KafkaSenderConfig {
            brokers: "127.0.0.1:9092".to_string(),
            client_id: "dsdk-test".to_string(),
            timeout: Duration::from_millis(100),
        });
        let message = OutboundMessage {
            routing_key: "data.p1.meter.dev-1".to_string(),
            key: "dev-1".to_string(),
            payload: b"{}".to_vec(),
        };
        assert!(!client.is_connected());
        assert_eq!(
            client.publish(&message).await,
            Err(SenderError::NotConnected)
        );
    }
}
