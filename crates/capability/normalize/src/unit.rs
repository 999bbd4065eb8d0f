use crate::handler::{HandlerError, ValueHandler};
use domain::{FieldValue, Tag};
use tracing::debug;

/// 单位换算：原始量程钳位后线性映射到工程量程。
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitConversionHandler;

impl UnitConversionHandler {
    pub const PRIORITY: i32 = 100;
}

impl ValueHandler for UnitConversionHandler {
    fn name(&self) -> &'static str {
        "unit_conversion"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn supports(&self, _table_id: &str, _device_id: &str, tag: &Tag, value: &FieldValue) -> bool {
        let Some(mapping) = tag.tag_value.as_ref() else {
            return false;
        };
        mapping.min_raw.is_some()
            && mapping.max_raw.is_some()
            && mapping.min_value.is_some()
            && mapping.max_value.is_some()
            && value.as_f64().is_some()
    }

    fn handle(
        &self,
        table_id: &str,
        device_id: &str,
        tag: &Tag,
        value: FieldValue,
    ) -> Result<Option<FieldValue>, HandlerError> {
        let mapping = tag
            .tag_value
            .as_ref()
            .ok_or_else(|| HandlerError::config(tag, "tagValue mapping missing"))?;
        let (Some(min_raw), Some(max_raw), Some(min_value), Some(max_value)) = (
            mapping.min_raw,
            mapping.max_raw,
            mapping.min_value,
            mapping.max_value,
        ) else {
            return Err(HandlerError::config(tag, "tagValue mapping incomplete"));
        };
        let Some(raw) = value.as_f64() else {
            return Ok(Some(value));
        };
        // 钳位会把无穷大变成满量程值，必须先丢弃
        if !raw.is_finite() {
            debug!(
                target: "dsdk.normalize",
                table_id = %table_id,
                device_id = %device_id,
                tag_id = %tag.id,
                value = %value,
                "non_finite_value_discarded"
            );
            return Ok(None);
        }

        let (low, high) = if min_raw <= max_raw {
            (min_raw, max_raw)
        } else {
            (max_raw, min_raw)
        };
        let clamped = if raw < low {
            low
        } else if raw > high {
            high
        } else {
            raw
        };
        if min_raw == max_raw {
            return Ok(Some(FieldValue::Float(clamped)));
        }
        let result = (clamped - min_raw) / (max_raw - min_raw) * (max_value - min_value) + min_value;
        Ok(Some(FieldValue::Float(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ValueMapping;

    fn convert(tag: &Tag, raw: f64) -> f64 {
        match UnitConversionHandler.handle("t", "d", tag, FieldValue::Float(raw)) {
            Ok(Some(FieldValue::Float(v))) => v,
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn reversed_raw_bounds_still_clamp() {
        let tag = Tag::new("x").with_mapping(ValueMapping::new(100.0, 0.0, 0.0, 10.0));
        assert_eq!(convert(&tag, 150.0), 0.0);
        assert_eq!(convert(&tag, 0.0), 10.0);
    }

    #[test]
    fn incomplete_mapping_is_not_supported() {
        let mut mapping = ValueMapping::new(0.0, 10.0, 0.0, 1.0);
        mapping.max_value = None;
        let tag = Tag::new("x").with_mapping(mapping);
        assert!(!UnitConversionHandler.supports("t", "d", &tag, &FieldValue::Int(1)));
    }
}
