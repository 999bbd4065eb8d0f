use domain::LogLevel;

/// 发送端错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SenderError {
    #[error("sender not connected")]
    NotConnected,
    #[error("connect error: {0}")]
    Connect(String),
    #[error("publish error: {0}")]
    Publish(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// 运行日志发送失败。
///
/// 携带完整的日志上下文，调用方可据此重试或上报。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to send {level} log for device {device_id} in table {table_id}: {reason}")]
pub struct LogSendError {
    pub table_id: String,
    pub device_id: String,
    pub level: LogLevel,
    pub message: String,
    pub reason: String,
}

impl LogSendError {
    pub fn new(
        table_id: &str,
        device_id: &str,
        level: LogLevel,
        message: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            table_id: table_id.to_string(),
            device_id: device_id.to_string(),
            level,
            message: message.to_string(),
            reason: reason.into(),
        }
    }
}
