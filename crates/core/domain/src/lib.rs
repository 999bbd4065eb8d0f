//! 驱动 SDK 领域模型：点位、设备、遥测样本、告警与命令信封。

pub mod command;
pub mod data;
pub mod device;
pub mod error;
pub mod point;
pub mod tag;
pub mod warning;

pub use command::{BatchCmd, Cmd, CommandResult, DebugInfo, DeviceConfig, DriverConfig};
pub use data::{FieldType, FieldValue, LogLevel};
pub use device::DeviceInfo;
pub use error::DomainError;
pub use point::{Field, Point};
pub use tag::{Tag, TagRange, ValueMapping};
pub use warning::{Warning, WarningRecovery};

/// 当前 Unix 毫秒时间戳。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
