//! 按配置装配发送端与控制通道。

use dsdk_config::{RuntimeConfig, SenderKind};
use dsdk_control::{ControlTransport, DispatcherOptions, MqttControlConfig, MqttControlTransport};
use dsdk_sender::{
    AmqpClient, AmqpSenderConfig, BrokerSender, DataSender, KafkaClient, KafkaSenderConfig,
    MemoryClient, MqttClient, MqttSenderConfig, SenderOptions,
};
use std::sync::Arc;
use std::time::Duration;

pub fn sender_options(config: &RuntimeConfig) -> SenderOptions {
    SenderOptions {
        reconnect_interval: Duration::from_millis(config.sender_reconnect_interval_ms),
        max_reconnect_attempts: config.sender_max_reconnect_attempts,
        publish_retries: config.sender_publish_retries,
        retry_backoff: Duration::from_millis(config.sender_retry_backoff_ms),
    }
}

pub fn build_sender(config: &RuntimeConfig) -> Arc<dyn DataSender> {
    let options = sender_options(config);
    let project_id = config.project_id.clone();
    match config.sender {
        SenderKind::Mqtt => {
            let mut mqtt = MqttSenderConfig::new(config.mqtt_host.clone(), config.mqtt_port);
            mqtt.username = config.mqtt_username.clone();
            mqtt.password = config.mqtt_password.clone();
            mqtt.keepalive = Duration::from_secs(config.mqtt_keepalive_seconds);
            mqtt.qos = config.mqtt_qos;
            mqtt.clean_session = config.mqtt_clean_session;
            Arc::new(BrokerSender::new(MqttClient::new(mqtt), project_id, options))
        }
        SenderKind::Amqp => {
            let amqp = AmqpSenderConfig {
                uri: config.amqp_uri.clone(),
                exchange: config.amqp_exchange.clone(),
                max_channels: config.amqp_max_channels,
            };
            Arc::new(BrokerSender::new(AmqpClient::new(amqp), project_id, options))
        }
        SenderKind::Kafka => {
            let kafka = KafkaSenderConfig {
                brokers: config.kafka_brokers.clone(),
                client_id: format!("dsdk-{}", config.instance_id),
                timeout: Duration::from_millis(config.kafka_timeout_ms),
            };
            Arc::new(BrokerSender::new(KafkaClient::new(kafka), project_id, options))
        }
        SenderKind::Memory => Arc::new(BrokerSender::new(MemoryClient::new(), project_id, options)),
    }
}

pub fn build_transport(config: &RuntimeConfig) -> Arc<dyn ControlTransport> {
    Arc::new(MqttControlTransport::new(MqttControlConfig {
        host: config.control_host.clone(),
        port: config.control_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        topic_prefix: config.control_topic_prefix.clone(),
        instance_id: config.instance_id.clone(),
        keepalive: Duration::from_secs(config.mqtt_keepalive_seconds),
        qos: config.mqtt_qos,
        clean_session: config.mqtt_clean_session,
        connect_timeout: Duration::from_secs(10),
    }))
}

pub fn dispatcher_options(config: &RuntimeConfig) -> DispatcherOptions {
    DispatcherOptions {
        reconnect_interval: Duration::from_millis(config.control_reconnect_interval_ms),
        max_in_flight: config.control_max_in_flight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sender: &str) -> RuntimeConfig {
        RuntimeConfig::from_lookup(|key| match key {
            "DSDK_PROJECT_ID" => Some("p1".to_string()),
            "DSDK_INSTANCE_ID" => Some("inst-1".to_string()),
            "DSDK_SENDER" => Some(sender.to_string()),
            "DSDK_SENDER_RETRY_BACKOFF_MS" => Some("10".to_string()),
            _ => None,
        })
        .expect("config")
    }

    #[tokio::test]
    async fn memory_sender_starts_and_stops() {
        let sender = build_sender(&config("memory"));
        sender.start().await.expect("start");
        assert!(sender.is_running());
        sender.stop().await.expect("stop");
        assert!(!sender.is_running());
    }

    #[test]
    fn options_follow_config() {
        let config = config("memory");
        assert_eq!(sender_options(&config).retry_backoff, Duration::from_millis(10));
        assert_eq!(dispatcher_options(&config).max_in_flight, 16);
    }
}
