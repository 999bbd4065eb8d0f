use crate::envelope::ControlReply;
use crate::error::ControlError;
use crate::transport::{ControlSession, ControlTransport, SESSION_BUFFER};
use async_trait::async_trait;
use dsdk_sender::qos_from_u8;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// MQTT 控制通道配置。
#[derive(Debug, Clone)]
pub struct MqttControlConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 请求 topic `<prefix>/<instance>/request`，回复 topic `<prefix>/<instance>/reply`。
    pub topic_prefix: String,
    pub instance_id: String,
    pub keepalive: Duration,
    pub clean_session: bool,
    pub qos: u8,
    pub connect_timeout: Duration,
}

impl MqttControlConfig {
    pub fn request_topic(&self) -> String {
        format!(
            "{}/{}/request",
            self.topic_prefix.trim_end_matches('/'),
            self.instance_id
        )
    }

    pub fn reply_topic(&self) -> String {
        format!(
            "{}/{}/reply",
            self.topic_prefix.trim_end_matches('/'),
            self.instance_id
        )
    }
}

/// 基于 MQTT 请求/回复 topic 的控制通道。
pub struct MqttControlTransport {
    config: MqttControlConfig,
}

impl MqttControlTransport {
    pub fn new(config: MqttControlConfig) -> Self {
        Self { config }
    }

    fn options(&self) -> MqttOptions {
        let client_id = format!("dsdk-control-{}", uuid::Uuid::new_v4());
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
}

#[async_trait]
impl ControlTransport for MqttControlTransport {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn connect(&self) -> Result<ControlSession, ControlError> {
        let qos = qos_from_u8(self.config.qos);
        let request_topic = self.config.request_topic();
        let reply_topic = self.config.reply_topic();
        let (client, mut eventloop) = AsyncClient::new(self.options(), SESSION_BUFFER);
        client
            .subscribe(request_topic.as_str(), qos)
            .await
            .map_err(|err| ControlError::Connect(err.to_string()))?;

        let (request_tx, request_rx) = mpsc::channel::<Vec<u8>>(SESSION_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();
        let topic = request_topic.clone();
        let poll = tokio::spawn(async move {
            let mut ready_tx = Some(ready_tx);
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        let accepted = ack.code == ConnectReturnCode::Success;
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
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if publish.topic != topic {
                            debug!(target: "dsdk.control", topic = %publish.topic, "control_topic_skipped");
                            continue;
                        }
                        if request_tx.send(publish.payload.to_vec()).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        match ready_tx.take() {
                            Some(tx) => {
                                let _ = tx.send(Err(err.to_string()));
                            }
                            None => {
                                warn!(target: "dsdk.control", error = %err, "control_eventloop_error");
                            }
                        }
                        break;
                    }
                }
            }
            // request_tx 在此释放，分发器据此感知断线
        });

        let outcome = tokio::time::timeout(self.config.connect_timeout, ready_rx).await;
        let connected = match outcome {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(ControlError::Connect(reason)),
            Ok(Err(_)) => Err(ControlError::Connect("mqtt eventloop exited".to_string())),
            Err(_) => Err(ControlError::Connect("timed out waiting for connack".to_string())),
        };
        if let Err(err) = connected {
            poll.abort();
            return Err(err);
        }

        let (reply_tx, mut reply_rx) = mpsc::channel::<ControlReply>(SESSION_BUFFER);
        tokio::spawn(async move {
            while let Some(reply) = reply_rx.recv().await {
                let payload = match serde_json::to_vec(&reply) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(target: "dsdk.control", request_id = %reply.request_id, error = %err, "control_reply_encode_failed");
                        continue;
                    }
                };
                if let Err(err) = client.publish(reply_topic.as_str(), qos, false, payload).await {
                    warn!(target: "dsdk.control", request_id = %reply.request_id, error = %err, "control_reply_publish_failed");
                    break;
                }
            }
            let _ = client.disconnect().await;
            poll.abort();
        });

        info!(
            target: "dsdk.control",
            host = %self.config.host,
            port = self.config.port,
            topic = %request_topic,
            "control_connected"
        );
        Ok(ControlSession {
            requests: request_rx,
            replies: reply_tx,
        })
    }
}
