use crate::data::FieldType;
use serde::{Deserialize, Serialize};

/// 点位定义：一个数据点的标识与其值处理规则。
///
/// 同一驱动代际内不可变，重新配置时整体替换。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<TagRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_value: Option<ValueMapping>,
    /// 保留的小数位数。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<i32>,
    /// 乘法缩放系数（线上字段名为 `mod`）。
    #[serde(default, rename = "mod", skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl Tag {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            data_type: None,
            range: None,
            tag_value: None,
            fixed: None,
            scale: None,
        }
    }

    pub fn with_data_type(mut self, data_type: FieldType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn with_range(mut self, range: TagRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_mapping(mut self, mapping: ValueMapping) -> Self {
        self.tag_value = Some(mapping);
        self
    }

    pub fn with_fixed(mut self, fixed: i32) -> Self {
        self.fixed = Some(fixed);
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// 量程校验配置。
///
/// `active` 保留原始字符串，由量程处理器在首次使用时解析；
/// 无法识别的动作属于配置错误。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRange {
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default, alias = "action")]
    pub active: Option<String>,
    #[serde(default)]
    pub fixed_value: Option<f64>,
}

impl TagRange {
    pub fn new(min_value: f64, max_value: f64, active: impl Into<String>) -> Self {
        Self {
            min_value: Some(min_value),
            max_value: Some(max_value),
            active: Some(active.into()),
            fixed_value: None,
        }
    }

    pub fn with_fixed_value(mut self, fixed_value: f64) -> Self {
        self.fixed_value = Some(fixed_value);
        self
    }
}

/// 原始量程到工程量程的线性映射。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMapping {
    #[serde(default)]
    pub min_raw: Option<f64>,
    #[serde(default)]
    pub max_raw: Option<f64>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
}

impl ValueMapping {
    pub fn new(min_raw: f64, max_raw: f64, min_value: f64, max_value: f64) -> Self {
        Self {
            min_raw: Some(min_raw),
            max_raw: Some(max_raw),
            min_value: Some(min_value),
            max_value: Some(max_value),
        }
    }
}
