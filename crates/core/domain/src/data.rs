use serde::{Deserialize, Serialize};
use std::fmt;

/// 点位值的数据类型。
///
/// 原始读数与处理后的值都使用该类型；数值处理器只作用于具备数值视图的值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl FieldValue {
    /// 数值视图：整数、浮点与可解析为数字的字符串。
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::String(v) => v.trim().parse::<f64>().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            FieldValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }

    /// 按声明类型收敛值的表示，用于编码时消除动态类型的歧义。
    ///
    /// 无法转换时保持原值。
    pub fn coerce(self, field_type: FieldType) -> FieldValue {
        match (field_type, self) {
            (FieldType::Int, FieldValue::Float(v)) if v.is_finite() => {
                FieldValue::Int(v.round() as i64)
            }
            (FieldType::Int, FieldValue::Bool(v)) => FieldValue::Int(i64::from(v)),
            (FieldType::Int, FieldValue::String(v)) => match v.trim().parse::<f64>() {
                Ok(parsed) if parsed.is_finite() => FieldValue::Int(parsed.round() as i64),
                _ => FieldValue::String(v),
            },
            (FieldType::Float, FieldValue::Int(v)) => FieldValue::Float(v as f64),
            (FieldType::Float, FieldValue::String(v)) => match v.trim().parse::<f64>() {
                Ok(parsed) => FieldValue::Float(parsed),
                Err(_) => FieldValue::String(v),
            },
            (FieldType::Bool, FieldValue::Int(v)) => FieldValue::Bool(v != 0),
            (FieldType::Bool, FieldValue::Float(v)) => FieldValue::Bool(v != 0.0),
            (FieldType::Bool, FieldValue::String(v)) => {
                match v.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "on" => FieldValue::Bool(true),
                    "false" | "0" | "off" => FieldValue::Bool(false),
                    _ => FieldValue::String(v),
                }
            }
            (FieldType::String, value @ FieldValue::String(_)) => value,
            (FieldType::String, value) => FieldValue::String(value.to_string()),
            (_, value) => value,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

/// 点位声明类型（Point.fieldTypes 的取值）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[serde(alias = "integer", alias = "long")]
    Int,
    #[serde(alias = "double", alias = "number")]
    Float,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "text")]
    String,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::String => "string",
        }
    }
}

/// 运行日志级别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_json_keeps_integer_and_float_apart() {
        let int: FieldValue = serde_json::from_str("12").expect("int");
        let float: FieldValue = serde_json::from_str("12.5").expect("float");
        assert_eq!(int, FieldValue::Int(12));
        assert_eq!(float, FieldValue::Float(12.5));
    }

    #[test]
    fn coerce_follows_declared_type() {
        assert_eq!(FieldValue::Float(12.6).coerce(FieldType::Int), FieldValue::Int(13));
        assert_eq!(FieldValue::Int(3).coerce(FieldType::Float), FieldValue::Float(3.0));
        assert_eq!(
            FieldValue::Float(1.5).coerce(FieldType::String),
            FieldValue::String("1.5".to_string())
        );
        assert_eq!(FieldValue::Int(0).coerce(FieldType::Bool), FieldValue::Bool(false));
    }

    #[test]
    fn numeric_view_parses_strings() {
        assert_eq!(FieldValue::from(" 4.25 ").as_f64(), Some(4.25));
        assert_eq!(FieldValue::Bool(true).as_f64(), None);
        assert_eq!(FieldValue::from("n/a").as_f64(), None);
    }
}
