use crate::data::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 告警事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub warning_id: String,
    pub level: u8,
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type_id: Option<String>,
    pub description: String,
    /// 触发告警的字段快照。
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    pub table_id: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_device_id: Option<String>,
    pub rule_id: String,
    pub time_ms: i64,
}

/// 告警恢复记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningRecovery {
    /// 被恢复的原告警 id。
    pub warning_ids: Vec<String>,
    pub table_id: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_device_id: Option<String>,
    pub rule_id: String,
    /// 恢复时刻的字段值。
    #[serde(default)]
    pub values: BTreeMap<String, FieldValue>,
    pub recovered_at_ms: i64,
}
