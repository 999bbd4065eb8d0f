use crate::data::{FieldType, FieldValue};
use crate::tag::Tag;
use std::collections::HashMap;
use std::sync::Arc;

/// 单个字段：点位定义与处理后的值。
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub tag: Arc<Tag>,
    pub value: FieldValue,
}

impl Field {
    pub fn tag_id(&self) -> &str {
        &self.tag.id
    }
}

/// 一次遥测采样。
///
/// 字段顺序与调用方提供点位的顺序一致；被处理链丢弃的字段不出现在这里。
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub device_id: String,
    pub child_device_id: Option<String>,
    pub table_id: String,
    pub time_ms: i64,
    pub fields: Vec<Field>,
    pub field_types: HashMap<String, FieldType>,
}

impl Point {
    pub fn field(&self, tag_id: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|field| field.tag.id == tag_id)
            .map(|field| &field.value)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
