use crate::device::DeviceInfo;
use crate::error::DomainError;
use crate::tag::Tag;
use serde::{Deserialize, Serialize};

/// 单设备命令。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cmd {
    pub request_id: String,
    pub table_id: String,
    pub device_id: String,
    #[serde(default)]
    pub serial_no: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// 批量命令：同一负载下发到多台设备。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCmd {
    pub request_id: String,
    pub table_id: String,
    pub device_ids: Vec<String>,
    #[serde(default)]
    pub serial_no: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// 驱动执行命令的结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandResult {
    pub fn ok(payload: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            payload,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            payload: serde_json::Value::Null,
        }
    }
}

/// 调试能力的返回信息。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// 设备配置（start 命令中的单台设备）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub device_id: String,
    pub table_id: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// 驱动启动配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
    pub instance_id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    /// 驱动私有配置，SDK 不解释。
    #[serde(default)]
    pub driver: serde_json::Value,
}

impl DriverConfig {
    /// 展开为设备信息列表（实例 id 取自本配置）。
    pub fn device_infos(&self) -> Result<Vec<DeviceInfo>, DomainError> {
        self.devices
            .iter()
            .map(|device| {
                if device.device_id.trim().is_empty() {
                    return Err(DomainError::Invalid {
                        field: "deviceId",
                        reason: "empty device id".to_string(),
                    });
                }
                DeviceInfo::new(
                    device.device_id.clone(),
                    device.table_id.clone(),
                    self.instance_id.clone(),
                    device.tags.clone(),
                )
            })
            .collect()
    }
}
