use crate::error::SenderError;
use domain::{Field, FieldType, LogLevel, Point, Warning, WarningRecovery};
use serde::Serialize;
use serde::ser::SerializeMap;
use std::collections::{BTreeMap, HashMap};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PointPayload<'a> {
    device_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    child_device_id: Option<&'a str>,
    table: &'a str,
    time: i64,
    values: OrderedValues<'a>,
    types: BTreeMap<&'a str, FieldType>,
}

/// 按字段顺序输出的值映射；有声明类型时先按类型收敛。
struct OrderedValues<'a> {
    fields: &'a [Field],
    field_types: &'a HashMap<String, FieldType>,
}

impl Serialize for OrderedValues<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in self.fields {
            let value = match self.field_types.get(field.tag_id()) {
                Some(field_type) => field.value.clone().coerce(*field_type),
                None => field.value.clone(),
            };
            map.serialize_entry(field.tag_id(), &value)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogPayload<'a> {
    project_id: &'a str,
    table: &'a str,
    device_id: &'a str,
    level: LogLevel,
    message: &'a str,
    time: i64,
}

/// 编码 Point：`{deviceId, childDeviceId?, table, time, values, types}`。
pub fn encode_point(point: &Point) -> Result<Vec<u8>, SenderError> {
    let payload = PointPayload {
        device_id: &point.device_id,
        child_device_id: point.child_device_id.as_deref(),
        table: &point.table_id,
        time: point.time_ms,
        values: OrderedValues {
            fields: &point.fields,
            field_types: &point.field_types,
        },
        types: point
            .field_types
            .iter()
            .map(|(tag_id, field_type)| (tag_id.as_str(), *field_type))
            .collect(),
    };
    serde_json::to_vec(&payload).map_err(|err| SenderError::Encode(err.to_string()))
}

pub fn encode_log(
    project_id: &str,
    table_id: &str,
    device_id: &str,
    level: LogLevel,
    message: &str,
    time_ms: i64,
) -> Result<Vec<u8>, SenderError> {
    let payload = LogPayload {
        project_id,
        table: table_id,
        device_id,
        level,
        message,
        time: time_ms,
    };
    serde_json::to_vec(&payload).map_err(|err| SenderError::Encode(err.to_string()))
}

pub fn encode_warning(warning: &Warning) -> Result<Vec<u8>, SenderError> {
    serde_json::to_vec(warning).map_err(|err| SenderError::Encode(err.to_string()))
}

pub fn encode_recovery(recovery: &WarningRecovery) -> Result<Vec<u8>, SenderError> {
    serde_json::to_vec(recovery).map_err(|err| SenderError::Encode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{FieldValue, Tag};
    use std::sync::Arc;

    fn point() -> Point {
        let mut field_types = HashMap::new();
        field_types.insert("count".to_string(), FieldType::Int);
        Point {
            device_id: "dev-1".to_string(),
            child_device_id: None,
            table_id: "meter".to_string(),
            time_ms: 1_700_000_000_000,
            fields: vec![
                Field {
                    tag: Arc::new(Tag::new("zeta")),
                    value: FieldValue::Float(1.5),
                },
                Field {
                    tag: Arc::new(Tag::new("count")),
                    value: FieldValue::Float(3.0),
                },
            ],
            field_types,
        }
    }

    #[test]
    fn point_values_follow_field_order_and_declared_types() {
        let bytes = encode_point(&point()).expect("encode");
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.contains(r#""values":{"zeta":1.5,"count":3}"#), "{text}");
        assert!(text.contains(r#""types":{"count":"int"}"#), "{text}");
        assert!(!text.contains("childDeviceId"));
    }

    #[test]
    fn log_payload_is_camel_case() {
        let bytes = encode_log("p1", "meter", "dev-1", LogLevel::Info, "ok", 1).expect("encode");
        let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(value["deviceId"], "dev-1");
        assert_eq!(value["level"], "info");
        assert_eq!(value["projectId"], "p1");
    }
}
