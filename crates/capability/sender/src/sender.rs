use crate::client::{BrokerClient, OutboundMessage};
use crate::codec;
use crate::error::{LogSendError, SenderError};
use crate::routing::RoutingKeys;
use async_trait::async_trait;
use domain::{LogLevel, Point, Warning, WarningRecovery, now_epoch_ms};
use dsdk_telemetry::{
    record_log_send_failure, record_log_written, record_point_write_failure, record_point_written,
    record_recovery_sent, record_sender_reconnect, record_warning_sent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 发送端生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// 遥测发送抽象。
#[async_trait]
pub trait DataSender: Send + Sync {
    /// 已处于 Running 时直接返回成功。
    async fn start(&self) -> Result<(), SenderError>;

    async fn stop(&self) -> Result<(), SenderError>;

    fn state(&self) -> SenderState;

    /// 生命周期处于 Running 且连接健康。
    fn is_running(&self) -> bool;

    async fn write_point(&self, point: &Point) -> Result<(), SenderError>;

    /// 按顺序逐个发布，遇到第一个错误即返回。
    async fn write_points(&self, points: &[Point]) -> Result<(), SenderError> {
        for point in points {
            self.write_point(point).await?;
        }
        Ok(())
    }

    /// 未连接时返回 `LogSendError`，不会静默丢弃。
    async fn write_log(
        &self,
        table_id: &str,
        device_id: &str,
        level: LogLevel,
        message: &str,
    ) -> Result<(), LogSendError>;

    async fn send_warning(&self, warning: &Warning) -> Result<(), SenderError>;

    async fn recover_warning(&self, recovery: &WarningRecovery) -> Result<(), SenderError>;
}

/// 发送端策略。
#[derive(Debug, Clone)]
pub struct SenderOptions {
    pub reconnect_interval: Duration,
    /// 连续重连失败上限；`None` 表示不限。
    pub max_reconnect_attempts: Option<u32>,
    pub publish_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(5),
            max_reconnect_attempts: None,
            publish_retries: 2,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    cancel: Option<CancellationToken>,
    supervisor: Option<JoinHandle<()>>,
}

struct Shared<C> {
    client: C,
    routing: RoutingKeys,
    options: SenderOptions,
    state_tx: watch::Sender<SenderState>,
}

/// 基于 `BrokerClient` 的通用发送端。
///
/// 持有生命周期状态机与一个监督任务：按 `reconnect_interval` 检查连接，
/// 断线后自动重连，连续失败达到上限则转入 Stopped。
pub struct BrokerSender<C: BrokerClient> {
    shared: Arc<Shared<C>>,
    lifecycle: Mutex<Lifecycle>,
}

impl<C: BrokerClient> BrokerSender<C> {
    pub fn new(client: C, project_id: impl Into<String>, options: SenderOptions) -> Self {
        let routing = RoutingKeys::new(project_id, client.separator());
        let (state_tx, _) = watch::channel(SenderState::Stopped);
        Self {
            shared: Arc::new(Shared {
                client,
                routing,
                options,
                state_tx,
            }),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn client(&self) -> &C {
        &self.shared.client
    }

    pub fn routing(&self) -> &RoutingKeys {
        &self.shared.routing
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SenderState> {
        self.shared.state_tx.subscribe()
    }

    async fn publish_with_retry(&self, message: &OutboundMessage) -> Result<(), SenderError> {
        let options = &self.shared.options;
        let mut attempt = 0u32;
        loop {
            match self.shared.client.publish(message).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    attempt += 1;
                    if attempt > options.publish_retries {
                        return Err(err);
                    }
                    debug!(
                        target: "dsdk.sender",
                        backend = self.shared.client.name(),
                        routing_key = %message.routing_key,
                        attempt,
                        error = %err,
                        "publish_retry"
                    );
                    if !options.retry_backoff.is_zero() {
                        tokio::time::sleep(options.retry_backoff).await;
                    }
                }
            }
        }
    }

    fn ensure_running(&self) -> Result<(), SenderError> {
        if *self.shared.state_tx.borrow() == SenderState::Running {
            Ok(())
        } else {
            Err(SenderError::NotConnected)
        }
    }

    async fn write_log_inner(
        &self,
        table_id: &str,
        device_id: &str,
        level: LogLevel,
        message: &str,
    ) -> Result<(), SenderError> {
        let routing = &self.shared.routing;
        let payload = codec::encode_log(
            routing.project_id(),
            table_id,
            device_id,
            level,
            message,
            now_epoch_ms(),
        )?;
        let message = OutboundMessage {
            routing_key: routing.log(level, table_id, device_id),
            key: device_id.to_string(),
            payload,
        };
        self.publish_with_retry(&message).await
    }
}

#[async_trait]
impl<C: BrokerClient> DataSender for BrokerSender<C> {
    async fn start(&self) -> Result<(), SenderError> {
        let mut lifecycle = self.lifecycle.lock().await;
        let state_tx = &self.shared.state_tx;
        let current = *state_tx.borrow();
        match current {
            SenderState::Running => return Ok(()),
            SenderState::Stopped => {}
            other => {
                return Err(SenderError::InvalidState(format!(
                    "cannot start while {:?}",
                    other
                )));
            }
        }
        // 监督任务因致命断线退出后遗留的句柄
        if let Some(cancel) = lifecycle.cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = lifecycle.supervisor.take() {
            let _ = handle.await;
        }

        state_tx.send_replace(SenderState::Starting);
        if let Err(err) = self.shared.client.connect().await {
            state_tx.send_replace(SenderState::Stopped);
            warn!(
                target: "dsdk.sender",
                backend = self.shared.client.name(),
                error = %err,
                "sender_start_failed"
            );
            return Err(err);
        }

        let cancel = CancellationToken::new();
        lifecycle.supervisor = Some(tokio::spawn(supervise(
            Arc::clone(&self.shared),
            cancel.clone(),
        )));
        lifecycle.cancel = Some(cancel);
        state_tx.send_replace(SenderState::Running);
        info!(
            target: "dsdk.sender",
            backend = self.shared.client.name(),
            project_id = %self.shared.routing.project_id(),
            "sender_started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), SenderError> {
        let mut lifecycle = self.lifecycle.lock().await;
        let state_tx = &self.shared.state_tx;
        let was_running = *state_tx.borrow() == SenderState::Running;
        if was_running {
            state_tx.send_replace(SenderState::Stopping);
        }
        if let Some(cancel) = lifecycle.cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = lifecycle.supervisor.take() {
            let _ = handle.await;
        }
        self.shared.client.close().await;
        state_tx.send_replace(SenderState::Stopped);
        if was_running {
            info!(
                target: "dsdk.sender",
                backend = self.shared.client.name(),
                "sender_stopped"
            );
        }
        Ok(())
    }

    fn state(&self) -> SenderState {
        *self.shared.state_tx.borrow()
    }

    fn is_running(&self) -> bool {
        self.state() == SenderState::Running && self.shared.client.is_connected()
    }

    async fn write_point(&self, point: &Point) -> Result<(), SenderError> {
        self.ensure_running()?;
        let message = OutboundMessage {
            routing_key: self.shared.routing.data(&point.table_id, &point.device_id),
            key: point.device_id.clone(),
            payload: codec::encode_point(point)?,
        };
        match self.publish_with_retry(&message).await {
            Ok(()) => {
                record_point_written();
                Ok(())
            }
            Err(err) => {
                record_point_write_failure();
                warn!(
                    target: "dsdk.sender",
                    backend = self.shared.client.name(),
                    table_id = %point.table_id,
                    device_id = %point.device_id,
                    error = %err,
                    "point_write_failed"
                );
                Err(err)
            }
        }
    }

    async fn write_log(
        &self,
        table_id: &str,
        device_id: &str,
        level: LogLevel,
        message: &str,
    ) -> Result<(), LogSendError> {
        if !self.is_running() {
            record_log_send_failure();
            return Err(LogSendError::new(
                table_id,
                device_id,
                level,
                message,
                SenderError::NotConnected.to_string(),
            ));
        }
        match self.write_log_inner(table_id, device_id, level, message).await {
            Ok(()) => {
                record_log_written();
                Ok(())
            }
            Err(err) => {
                record_log_send_failure();
                Err(LogSendError::new(
                    table_id,
                    device_id,
                    level,
                    message,
                    err.to_string(),
                ))
            }
        }
    }

    async fn send_warning(&self, warning: &Warning) -> Result<(), SenderError> {
        self.ensure_running()?;
        let message = OutboundMessage {
            routing_key: self
                .shared
                .routing
                .warning(&warning.table_id, &warning.device_id),
            key: warning.device_id.clone(),
            payload: codec::encode_warning(warning)?,
        };
        self.publish_with_retry(&message).await?;
        record_warning_sent();
        info!(
            target: "dsdk.sender",
            warning_id = %warning.warning_id,
            table_id = %warning.table_id,
            device_id = %warning.device_id,
            level = warning.level,
            "warning_sent"
        );
        Ok(())
    }

    async fn recover_warning(&self, recovery: &WarningRecovery) -> Result<(), SenderError> {
        self.ensure_running()?;
        let message = OutboundMessage {
            routing_key: self
                .shared
                .routing
                .recovery(&recovery.table_id, &recovery.device_id),
            key: recovery.device_id.clone(),
            payload: codec::encode_recovery(recovery)?,
        };
        self.publish_with_retry(&message).await?;
        record_recovery_sent();
        info!(
            target: "dsdk.sender",
            table_id = %recovery.table_id,
            device_id = %recovery.device_id,
            warnings = recovery.warning_ids.len(),
            "warning_recovered"
        );
        Ok(())
    }
}

/// 连接监督：周期检查健康，断线即重连。
async fn supervise<C: BrokerClient>(shared: Arc<Shared<C>>, cancel: CancellationToken) {
    let backend = shared.client.name();
    let mut failures = 0u32;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(shared.options.reconnect_interval) => {}
        }
        if shared.client.is_connected() {
            failures = 0;
            continue;
        }

        warn!(target: "dsdk.sender", backend, failures, "sender_connection_lost");
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = shared.client.connect() => result,
        };
        match result {
            Ok(()) => {
                failures = 0;
                record_sender_reconnect();
                info!(target: "dsdk.sender", backend, "sender_reconnected");
            }
            Err(err) => {
                failures += 1;
                warn!(
                    target: "dsdk.sender",
                    backend,
                    attempt = failures,
                    error = %err,
                    "sender_reconnect_failed"
                );
                let exhausted = match shared.options.max_reconnect_attempts {
                    Some(max) => failures >= max,
                    None => false,
                };
                if exhausted {
                    error!(
                        target: "dsdk.sender",
                        backend,
                        attempts = failures,
                        "sender_connection_abandoned"
                    );
                    shared.client.close().await;
                    shared.state_tx.send_replace(SenderState::Stopped);
                    break;
                }
            }
        }
    }
    debug!(target: "dsdk.sender", backend, "sender_supervisor_exited");
}
