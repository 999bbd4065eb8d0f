//! 内置透传驱动：`run` 负载中的 `values` 直接作为采集值发布。
//!
//! 负载形如 `{"values": {"ua": 2201}, "childDeviceId": "sub-1", "time": 1700000000000}`，
//! 后两项可省略。

use async_trait::async_trait;
use domain::{Cmd, CommandResult, DebugInfo, DriverConfig, FieldValue};
use dsdk_control::{Driver, DriverContext, DriverError};
use dsdk_normalize::PointRequest;
use serde_json::{Value, json};
use tracing::info;

#[derive(Default)]
pub struct PassthroughDriver;

#[async_trait]
impl Driver for PassthroughDriver {
    async fn start(&self, ctx: &DriverContext, config: &DriverConfig) -> Result<(), DriverError> {
        info!(
            target: "dsdk.runtime",
            project_id = %config.project_id,
            devices = ctx.registry().device_count(),
            "passthrough_started"
        );
        Ok(())
    }

    async fn stop(&self, _ctx: &DriverContext) -> Result<(), DriverError> {
        info!(target: "dsdk.runtime", "passthrough_stopped");
        Ok(())
    }

    async fn run(&self, ctx: &DriverContext, cmd: &Cmd) -> Result<CommandResult, DriverError> {
        let request = point_request(cmd)?;
        let published = ctx.publish_values(request).await?;
        Ok(CommandResult::ok(json!({ "published": published })))
    }

    async fn debug(&self, ctx: &DriverContext, _config: &Value) -> Result<DebugInfo, DriverError> {
        Ok(DebugInfo {
            success: true,
            message: None,
            data: json!({
                "devices": ctx.registry().device_count(),
                "senderRunning": ctx.sender().is_running(),
            }),
        })
    }

    async fn schema(&self) -> Result<String, DriverError> {
        Ok(json!({
            "type": "object",
            "properties": {
                "values": { "type": "object" },
                "childDeviceId": { "type": "string" },
                "time": { "type": "integer" }
            },
            "required": ["values"]
        })
        .to_string())
    }
}

fn point_request(cmd: &Cmd) -> Result<PointRequest, DriverError> {
    let values = cmd
        .payload
        .get("values")
        .and_then(Value::as_object)
        .ok_or_else(|| DriverError::Failed("payload.values must be an object".to_string()))?;

    let mut request = PointRequest::new(cmd.device_id.clone()).in_table(cmd.table_id.clone());
    if let Some(child) = cmd.payload.get("childDeviceId").and_then(Value::as_str) {
        request = request.child(child);
    }
    if let Some(time_ms) = cmd.payload.get("time").and_then(Value::as_i64) {
        request = request.at(time_ms);
    }
    for (tag_id, raw) in values {
        let value = field_value(raw).ok_or_else(|| {
            DriverError::Failed(format!("unsupported value for tag {tag_id}: {raw}"))
        })?;
        request = request.value(tag_id.clone(), value);
    }
    Ok(request)
}

fn field_value(raw: &Value) -> Option<FieldValue> {
    match raw {
        Value::Bool(value) => Some(FieldValue::Bool(*value)),
        Value::Number(number) => number
            .as_i64()
            .map(FieldValue::Int)
            .or_else(|| number.as_f64().map(FieldValue::Float)),
        Value::String(value) => Some(FieldValue::String(value.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(payload: Value) -> Cmd {
        Cmd {
            request_id: "r1".to_string(),
            table_id: "meter".to_string(),
            device_id: "dev-1".to_string(),
            serial_no: "s1".to_string(),
            payload,
        }
    }

    #[test]
    fn json_values_map_to_field_values() {
        assert_eq!(field_value(&json!(3)), Some(FieldValue::Int(3)));
        assert_eq!(field_value(&json!(1.5)), Some(FieldValue::Float(1.5)));
        assert_eq!(field_value(&json!(true)), Some(FieldValue::Bool(true)));
        assert_eq!(field_value(&json!(null)), None);
    }

    #[test]
    fn payload_without_values_is_rejected() {
        assert!(point_request(&cmd(json!({ "time": 1 }))).is_err());
        assert!(point_request(&cmd(json!({ "values": { "ua": [1] } }))).is_err());
        assert!(point_request(&cmd(json!({ "values": { "ua": 220 }, "childDeviceId": "c" }))).is_ok());
    }
}
