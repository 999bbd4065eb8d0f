//! 追踪初始化与进程级计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub points_written: u64,
    pub point_write_failures: u64,
    pub fields_discarded: u64,
    pub logs_written: u64,
    pub log_send_failures: u64,
    pub warnings_sent: u64,
    pub recoveries_sent: u64,
    pub sender_reconnects: u64,
    pub commands_received: u64,
    pub commands_succeeded: u64,
    pub commands_failed: u64,
    pub commands_rejected: u64,
}

/// 运行时计数器。
#[derive(Debug, Default)]
pub struct TelemetryMetrics {
    points_written: AtomicU64,
    point_write_failures: AtomicU64,
    fields_discarded: AtomicU64,
    logs_written: AtomicU64,
    log_send_failures: AtomicU64,
    warnings_sent: AtomicU64,
    recoveries_sent: AtomicU64,
    sender_reconnects: AtomicU64,
    commands_received: AtomicU64,
    commands_succeeded: AtomicU64,
    commands_failed: AtomicU64,
    commands_rejected: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            points_written: self.points_written.load(Ordering::Relaxed),
            point_write_failures: self.point_write_failures.load(Ordering::Relaxed),
            fields_discarded: self.fields_discarded.load(Ordering::Relaxed),
            logs_written: self.logs_written.load(Ordering::Relaxed),
            log_send_failures: self.log_send_failures.load(Ordering::Relaxed),
            warnings_sent: self.warnings_sent.load(Ordering::Relaxed),
            recoveries_sent: self.recoveries_sent.load(Ordering::Relaxed),
            sender_reconnects: self.sender_reconnects.load(Ordering::Relaxed),
            commands_received: self.commands_received.load(Ordering::Relaxed),
            commands_succeeded: self.commands_succeeded.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，RUST_LOG 覆盖）。重复调用无副作用。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录 Point 发布成功次数。
pub fn record_point_written() {
    metrics().points_written.fetch_add(1, Ordering::Relaxed);
}

/// 记录 Point 发布失败次数（重试耗尽后）。
pub fn record_point_write_failure() {
    metrics()
        .point_write_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录被处理链或非有限值保护丢弃的字段数。
pub fn record_field_discarded() {
    metrics().fields_discarded.fetch_add(1, Ordering::Relaxed);
}

/// 记录运行日志发布成功次数。
pub fn record_log_written() {
    metrics().logs_written.fetch_add(1, Ordering::Relaxed);
}

/// 记录运行日志发送失败次数。
pub fn record_log_send_failure() {
    metrics().log_send_failures.fetch_add(1, Ordering::Relaxed);
}

pub fn record_warning_sent() {
    metrics().warnings_sent.fetch_add(1, Ordering::Relaxed);
}

pub fn record_recovery_sent() {
    metrics().recoveries_sent.fetch_add(1, Ordering::Relaxed);
}

/// 记录发送端成功重连次数。
pub fn record_sender_reconnect() {
    metrics().sender_reconnects.fetch_add(1, Ordering::Relaxed);
}

/// 记录控制通道收到的请求数。
pub fn record_command_received() {
    metrics().commands_received.fetch_add(1, Ordering::Relaxed);
}

pub fn record_command_succeeded() {
    metrics().commands_succeeded.fetch_add(1, Ordering::Relaxed);
}

pub fn record_command_failed() {
    metrics().commands_failed.fetch_add(1, Ordering::Relaxed);
}

/// 记录因设备未知或信封非法而被拒绝的请求数。
pub fn record_command_rejected() {
    metrics().commands_rejected.fetch_add(1, Ordering::Relaxed);
}
