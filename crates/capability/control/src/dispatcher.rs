use crate::driver::{Driver, DriverContext};
use crate::envelope::{ControlEnvelope, ControlReply, ControlRequest, salvage_request_id};
use crate::error::{ControlError, DriverError};
use crate::transport::{ControlSession, ControlTransport};
use domain::{BatchCmd, Cmd, CommandResult, DriverConfig, LogLevel};
use dsdk_registry::RegistrySnapshot;
use dsdk_telemetry::{
    record_command_failed, record_command_received, record_command_rejected,
    record_command_succeeded,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// 控制通道连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    pub reconnect_interval: Duration,
    /// 同时执行的驱动调用上限。
    pub max_in_flight: usize,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(5),
            max_in_flight: 16,
        }
    }
}

/// 命令分发器：维持控制通道，解码请求并调用驱动。
///
/// 读循环只做解码、设备校验与受理回复；驱动调用在受跟踪的任务上执行，
/// 并发数受 `max_in_flight` 限制。
pub struct CommandDispatcher {
    transport: Arc<dyn ControlTransport>,
    driver: Arc<dyn Driver>,
    ctx: DriverContext,
    options: DispatcherOptions,
    state_tx: watch::Sender<DispatcherState>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
    read_loop: Mutex<Option<JoinHandle<()>>>,
}

type Replies = mpsc::Sender<ControlReply>;

impl CommandDispatcher {
    pub fn new(
        transport: Arc<dyn ControlTransport>,
        driver: Arc<dyn Driver>,
        ctx: DriverContext,
        options: DispatcherOptions,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(DispatcherState::Disconnected);
        let permits = Arc::new(Semaphore::new(options.max_in_flight.max(1)));
        Arc::new(Self {
            transport,
            driver,
            ctx,
            options,
            state_tx,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            permits,
            read_loop: Mutex::new(None),
        })
    }

    pub fn state(&self) -> DispatcherState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DispatcherState> {
        self.state_tx.subscribe()
    }

    pub fn context(&self) -> &DriverContext {
        &self.ctx
    }

    /// 启动读循环（重复调用无效果）。
    pub fn spawn(self: &Arc<Self>) {
        let Ok(mut read_loop) = self.read_loop.lock() else {
            return;
        };
        if read_loop.is_some() {
            return;
        }
        let this = Arc::clone(self);
        *read_loop = Some(tokio::spawn(async move { this.run().await }));
    }

    /// 停止：取消读循环，等待已分发的驱动调用完成，再调用驱动 `stop`。
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        self.cancel.cancel();
        let handle = self.read_loop.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.tracker.close();
        self.tracker.wait().await;
        self.state_tx.send_replace(DispatcherState::Disconnected);
        let result = self.driver.stop(&self.ctx).await;
        info!(target: "dsdk.control", "dispatcher_shutdown");
        result
    }

    async fn run(self: Arc<Self>) {
        let transport = self.transport.name();
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.state_tx.send_replace(DispatcherState::Connecting);
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                connected = self.transport.connect() => connected,
            };
            match connected {
                Ok(session) => {
                    self.state_tx.send_replace(DispatcherState::Connected);
                    info!(target: "dsdk.control", transport, "control_session_opened");
                    self.serve(session).await;
                    self.state_tx.send_replace(DispatcherState::Disconnected);
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    warn!(target: "dsdk.control", transport, "control_session_closed");
                }
                Err(err) => {
                    self.state_tx.send_replace(DispatcherState::Disconnected);
                    warn!(target: "dsdk.control", transport, error = %err, "control_connect_failed");
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.options.reconnect_interval) => {}
            }
        }
        self.state_tx.send_replace(DispatcherState::Disconnected);
        debug!(target: "dsdk.control", transport, "control_read_loop_exited");
    }

    async fn serve(self: &Arc<Self>, session: ControlSession) {
        let ControlSession {
            mut requests,
            replies,
        } = session;
        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => break,
                frame = requests.recv() => frame,
            };
            let Some(frame) = frame else {
                break;
            };
            record_command_received();
            self.accept(&frame, &replies).await;
        }
    }

    async fn accept(self: &Arc<Self>, frame: &[u8], replies: &Replies) {
        let envelope: ControlEnvelope = match serde_json::from_slice(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                record_command_rejected();
                warn!(target: "dsdk.control", error = %err, "control_envelope_invalid");
                if let Some(request_id) = salvage_request_id(frame) {
                    reply(replies, ControlReply::reject(request_id, err.to_string())).await;
                }
                return;
            }
        };
        let ControlEnvelope {
            request_id,
            request,
        } = envelope;
        debug!(
            target: "dsdk.control",
            request_id = %request_id,
            kind = request.kind(),
            "control_request_received"
        );

        match &request {
            ControlRequest::Start { config } => {
                // 注册表在读循环内同步替换，后续请求的设备校验即看到新快照
                if let Err(err) = self.install(config) {
                    record_command_failed();
                    warn!(target: "dsdk.control", request_id = %request_id, error = %err, "driver_config_rejected");
                    reply(
                        replies,
                        ControlReply::result(request_id, false, Some(err.to_string()), serde_json::Value::Null),
                    )
                    .await;
                    return;
                }
            }
            ControlRequest::Run { cmd } | ControlRequest::WriteTag { cmd } => {
                if let Err(reason) = self.validate(&cmd.table_id, std::slice::from_ref(&cmd.device_id)) {
                    self.reject(replies, request_id, reason).await;
                    return;
                }
                reply(replies, ControlReply::ack(request_id.clone())).await;
            }
            ControlRequest::BatchRun { cmd } => {
                if let Err(reason) = self.validate(&cmd.table_id, &cmd.device_ids) {
                    self.reject(replies, request_id, reason).await;
                    return;
                }
                reply(replies, ControlReply::ack(request_id.clone())).await;
            }
            ControlRequest::Stop | ControlRequest::Debug { .. } | ControlRequest::Schema => {}
        }

        let this = Arc::clone(self);
        let replies = replies.clone();
        self.tracker.spawn(async move {
            let Ok(_permit) = Arc::clone(&this.permits).acquire_owned().await else {
                return;
            };
            this.execute(request_id, request, replies).await;
        });
    }

    fn install(&self, config: &DriverConfig) -> Result<(), ControlError> {
        let snapshot = RegistrySnapshot::from_config(config)?;
        self.ctx.registry().replace(snapshot)?;
        Ok(())
    }

    fn validate(&self, table_id: &str, device_ids: &[String]) -> Result<(), String> {
        if device_ids.is_empty() {
            return Err("no target device".to_string());
        }
        let snapshot = self.ctx.registry().snapshot();
        match device_ids
            .iter()
            .find(|device_id| !snapshot.contains(table_id, device_id))
        {
            Some(device_id) => Err(format!(
                "device {} not registered in table {}",
                device_id, table_id
            )),
            None => Ok(()),
        }
    }

    async fn reject(&self, replies: &Replies, request_id: String, reason: String) {
        record_command_rejected();
        warn!(target: "dsdk.control", request_id = %request_id, reason = %reason, "control_request_rejected");
        reply(replies, ControlReply::reject(request_id, reason)).await;
    }

    async fn execute(&self, request_id: String, request: ControlRequest, replies: Replies) {
        match request {
            ControlRequest::Start { config } => {
                let result = self.driver.start(&self.ctx, &config).await;
                self.finish_inline(&replies, request_id, "start", result.map(|_| serde_json::Value::Null))
                    .await;
            }
            ControlRequest::Stop => {
                let result = self.driver.stop(&self.ctx).await;
                self.finish_inline(&replies, request_id, "stop", result.map(|_| serde_json::Value::Null))
                    .await;
            }
            ControlRequest::Debug { config } => {
                match self.driver.debug(&self.ctx, &config).await {
                    Ok(info) => {
                        let success = info.success;
                        let message = info.message.clone();
                        let payload = serde_json::to_value(&info).unwrap_or(serde_json::Value::Null);
                        count(success);
                        reply(&replies, ControlReply::result(request_id, success, message, payload)).await;
                    }
                    Err(err) => {
                        self.finish_inline(&replies, request_id, "debug", Err(err)).await;
                    }
                }
            }
            ControlRequest::Schema => {
                let result = self.driver.schema().await.map(serde_json::Value::String);
                self.finish_inline(&replies, request_id, "schema", result).await;
            }
            ControlRequest::Run { cmd } => {
                let result = self.driver.run(&self.ctx, &cmd).await;
                self.report_run(&request_id, &cmd, result).await;
            }
            ControlRequest::WriteTag { cmd } => {
                let result = self.driver.write_tag(&self.ctx, &cmd).await;
                self.report_run(&request_id, &cmd, result).await;
            }
            ControlRequest::BatchRun { cmd } => {
                let result = self.driver.batch_run(&self.ctx, &cmd).await;
                self.report_batch(&request_id, &cmd, result).await;
            }
        }
    }

    async fn finish_inline(
        &self,
        replies: &Replies,
        request_id: String,
        kind: &'static str,
        result: Result<serde_json::Value, DriverError>,
    ) {
        let reply_value = match result {
            Ok(payload) => {
                count(true);
                info!(target: "dsdk.control", request_id = %request_id, kind, "driver_call_succeeded");
                ControlReply::result(request_id, true, None, payload)
            }
            Err(err) => {
                count(false);
                warn!(target: "dsdk.control", request_id = %request_id, kind, error = %err, "driver_call_failed");
                ControlReply::result(request_id, false, Some(err.to_string()), serde_json::Value::Null)
            }
        };
        reply(replies, reply_value).await;
    }

    /// 运行结果通过遥测通道以运行日志回报。
    async fn report_run(
        &self,
        request_id: &str,
        cmd: &Cmd,
        result: Result<CommandResult, DriverError>,
    ) {
        let (level, message) = run_log(request_id, &cmd.serial_no, result);
        self.write_run_log(request_id, &cmd.table_id, &cmd.device_id, level, &message)
            .await;
    }

    async fn report_batch(
        &self,
        request_id: &str,
        cmd: &BatchCmd,
        result: Result<CommandResult, DriverError>,
    ) {
        let (level, message) = run_log(request_id, &cmd.serial_no, result);
        for device_id in &cmd.device_ids {
            self.write_run_log(request_id, &cmd.table_id, device_id, level, &message)
                .await;
        }
    }

    async fn write_run_log(
        &self,
        request_id: &str,
        table_id: &str,
        device_id: &str,
        level: LogLevel,
        message: &str,
    ) {
        if let Err(err) = self
            .ctx
            .sender()
            .write_log(table_id, device_id, level, message)
            .await
        {
            warn!(
                target: "dsdk.control",
                request_id = %request_id,
                table_id = %err.table_id,
                device_id = %err.device_id,
                reason = %err.reason,
                "run_log_send_failed"
            );
        }
    }
}

fn count(success: bool) {
    if success {
        record_command_succeeded();
    } else {
        record_command_failed();
    }
}

fn run_log(
    request_id: &str,
    serial_no: &str,
    result: Result<CommandResult, DriverError>,
) -> (LogLevel, String) {
    let result = result.unwrap_or_else(|err| CommandResult::failed(err.to_string()));
    count(result.success);
    let level = if result.success {
        LogLevel::Info
    } else {
        LogLevel::Error
    };
    let body = serde_json::json!({
        "requestId": request_id,
        "serialNo": serial_no,
        "success": result.success,
        "message": result.message,
        "payload": result.payload,
    });
    (level, body.to_string())
}

async fn reply(replies: &Replies, reply: ControlReply) {
    let request_id = reply.request_id.clone();
    if replies.send(reply).await.is_err() {
        warn!(target: "dsdk.control", request_id = %request_id, "control_reply_dropped");
    }
}
