use domain::{BatchCmd, Cmd, DriverConfig};
use serde::{Deserialize, Serialize};

/// 控制通道入站信封：`{requestId, type, ...}`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlEnvelope {
    pub request_id: String,
    #[serde(flatten)]
    pub request: ControlRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlRequest {
    Start {
        config: DriverConfig,
    },
    Stop,
    Run {
        cmd: Cmd,
    },
    BatchRun {
        cmd: BatchCmd,
    },
    WriteTag {
        cmd: Cmd,
    },
    Debug {
        #[serde(default)]
        config: serde_json::Value,
    },
    Schema,
}

impl ControlRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlRequest::Start { .. } => "start",
            ControlRequest::Stop => "stop",
            ControlRequest::Run { .. } => "run",
            ControlRequest::BatchRun { .. } => "batchRun",
            ControlRequest::WriteTag { .. } => "writeTag",
            ControlRequest::Debug { .. } => "debug",
            ControlRequest::Schema => "schema",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    /// 已受理（或拒绝）。
    Ack,
    /// 同步结果。
    Result,
}

/// 出站回复：`{requestId, kind, success, message?, payload?}`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlReply {
    pub request_id: String,
    pub kind: ReplyKind,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

impl ControlReply {
    pub fn ack(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            kind: ReplyKind::Ack,
            success: true,
            message: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn reject(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            kind: ReplyKind::Ack,
            success: false,
            message: Some(message.into()),
            payload: serde_json::Value::Null,
        }
    }

    pub fn result(
        request_id: impl Into<String>,
        success: bool,
        message: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            kind: ReplyKind::Result,
            success,
            message,
            payload,
        }
    }
}

/// 从无法解码的帧里尽量取出 requestId，用于回复拒绝。
pub(crate) fn salvage_request_id(frame: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(frame).ok()?;
    value
        .get("requestId")
        .and_then(|id| id.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_envelope_decodes() {
        let frame = json!({
            "requestId": "r-1",
            "type": "run",
            "cmd": {
                "requestId": "r-1",
                "tableId": "meter",
                "deviceId": "dev-1",
                "serialNo": "42",
                "payload": {"values": {"ua": 1}}
            }
        });
        let envelope: ControlEnvelope = serde_json::from_value(frame).expect("decode");
        assert_eq!(envelope.request_id, "r-1");
        let ControlRequest::Run { cmd } = envelope.request else {
            panic!("expected run");
        };
        assert_eq!(cmd.device_id, "dev-1");
        assert_eq!(cmd.serial_no, "42");
    }

    #[test]
    fn unit_requests_decode() {
        let envelope: ControlEnvelope =
            serde_json::from_str(r#"{"requestId":"r-2","type":"schema"}"#).expect("decode");
        assert_eq!(envelope.request, ControlRequest::Schema);
        assert_eq!(envelope.request.kind(), "schema");
    }

    #[test]
    fn unknown_type_is_rejected_but_id_salvaged() {
        let frame = br#"{"requestId":"r-3","type":"reboot"}"#;
        assert!(serde_json::from_slice::<ControlEnvelope>(frame).is_err());
        assert_eq!(salvage_request_id(frame).as_deref(), Some("r-3"));
    }

    #[test]
    fn ack_omits_empty_fields() {
        let text = serde_json::to_string(&ControlReply::ack("r-1")).expect("encode");
        assert_eq!(text, r#"{"requestId":"r-1","kind":"ack","success":true}"#);
    }
}
