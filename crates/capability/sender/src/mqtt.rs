use crate::client::{BrokerClient, OutboundMessage};
use crate::error::SenderError;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// MQTT 发送后端配置。
#[derive(Debug, Clone)]
pub struct MqttSenderConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keepalive: Duration,
    pub clean_session: bool,
    pub qos: u8,
    /// client_id 前缀，后接随机后缀。
    pub client_id_prefix: String,
    /// 等待 ConnAck 的时长。
    pub connect_timeout: Duration,
}

impl MqttSenderConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            keepalive: Duration::from_secs(30),
            clean_session: true,
            qos: 1,
            client_id_prefix: "dsdk-sender".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

struct MqttSession {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    poll: JoinHandle<()>,
}

/// MQTT 后端（rumqttc）。
///
/// 每次 `connect` 建立新会话；eventloop 出错即退出，由发送端监督任务重建。
pub struct MqttClient {
    config: MqttSenderConfig,
    qos: QoS,
    session: ArcSwapOption<MqttSession>,
}

impl MqttClient {
    pub fn new(config: MqttSenderConfig) -> Self {
        let qos = qos_from_u8(config.qos);
        Self {
            config,
            qos,
            session: ArcSwapOption::from(None),
        }
    }

    fn options(&self) -> MqttOptions {
        let client_id = format!("{}-{}", self.config.client_id_prefix, uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, self.config.host.clone(), self.config.port);
        options.set_keep_alive(self.config.keepalive.max(Duration::from_secs(5)));
        options.set_clean_session(self.config.clean_session);
        if let (Some(username), Some(password)) =
            (self.config.username.as_ref(), self.config.password.as_ref())
        {
            options.set_credentials(username, password);
        }
        options
    }

    async fn drop_session(&self) {
        if let Some(session) = self.session.swap(None) {
            let _ = session.client.disconnect().await;
            session.poll.abort();
        }
    }
}

#[async_trait]
impl BrokerClient for MqttClient {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    fn separator(&self) -> char {
        '/'
    }

    async fn connect(&self) -> Result<(), SenderError> {
        self.drop_session().await;

        let (client, mut eventloop) = AsyncClient::new(self.options(), 64);
        let connected = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();
        let flag = Arc::clone(&connected);
        let host = self.config.host.clone();
        let poll = tokio::spawn(async move {
            let mut ready_tx = Some(ready_tx);
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        let accepted = ack.code == ConnectReturnCode::Success;
                        flag.store(accepted, Ordering::Release);
                        if let Some(tx) = ready_tx.take() {
                            let result = if accepted {
                                Ok(())
                            } else {
                                Err(format!("connack refused: {:?}", ack.code))
                            };
                            let _ = tx.send(result);
                        }
                        if !accepted {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        flag.store(false, Ordering::Release);
                        if let Some(tx) = ready_tx.take() {
                            let _ = tx.send(Err(err.to_string()));
                        } else {
                            warn!(
                                target: "dsdk.sender",
                                host = %host,
                                error = %err,
                                "mqtt_eventloop_error"
                            );
                        }
                        break;
                    }
                }
            }
        });

        let outcome = tokio::time::timeout(self.config.connect_timeout, ready_rx).await;
        let result = match outcome {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(SenderError::Connect(reason)),
            Ok(Err(_)) => Err(SenderError::Connect("mqtt eventloop exited".to_string())),
            Err(_) => Err(SenderError::Connect("timed out waiting for connack".to_string())),
        };
        if let Err(err) = result {
            poll.abort();
            return Err(err);
        }

        self.session.store(Some(Arc::new(MqttSession {
            client,
            connected,
            poll,
        })));
        info!(
            target: "dsdk.sender",
            host = %self.config.host,
            port = self.config.port,
            "mqtt_connected"
        );
        Ok(())
    }

    async fn close(&self) {
        self.drop_session().await;
    }

    fn is_connected(&self) -> bool {
        self.session
            .load()
            .as_ref()
            .map(|session| session.connected.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    async fn publish(&self, message: &OutboundMessage) -> Result<(), SenderError> {
        let Some(session) = self.session.load_full() else {
            return Err(SenderError::NotConnected);
        };
        if !session.connected.load(Ordering::Acquire) {
            return Err(SenderError::NotConnected);
        }
        session
            .client
            .publish(
                message.routing_key.as_str(),
                self.qos,
                false,
                message.payload.clone(),
            )
            .await
            .map_err(|err| SenderError::Publish(err.to_string()))
    }
}

/// 配置中的 QoS 数值转换，未知值按至少一次处理。
pub fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_session_is_not_connected() {
        let client = MqttClient::new(MqttSenderConfig::new("127.0.0.1", 1883));
        let message = OutboundMessage {
            routing_key: "data/p1/meter/dev-1".to_string(),
            key: "dev-1".to_string(),
            payload: b"{}".to_vec(),
        };
        assert!(!client.is_connected());
        assert_eq!(
            client.publish(&message).await,
            Err(SenderError::NotConnected)
        );
    }

    #[test]
    fn qos_mapping_defaults_to_at_least_once() {
        assert_eq!(qos_from_u8(0), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(2), QoS::ExactlyOnce);
        assert_eq!(qos_from_u8(9), QoS::AtLeastOnce);
    }
}
