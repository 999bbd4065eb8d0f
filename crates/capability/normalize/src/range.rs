use crate::handler::{HandlerError, ValueHandler};
use domain::{FieldValue, Tag};
use tracing::debug;

/// 越界时的处理动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeAction {
    /// 替换为 `fixedValue`。
    Fixed,
    /// 替换为越过的那一侧边界。
    Boundary,
    /// 丢弃该读数。
    Discard,
}

impl RangeAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" => Some(RangeAction::Fixed),
            "boundary" => Some(RangeAction::Boundary),
            "discard" => Some(RangeAction::Discard),
            _ => None,
        }
    }
}

/// 量程校验，处理链中最后执行。
#[derive(Debug, Default, Clone, Copy)]
pub struct RangeHandler;

impl RangeHandler {
    pub const PRIORITY: i32 = 300;
}

impl ValueHandler for RangeHandler {
    fn name(&self) -> &'static str {
        "range"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn supports(&self, _table_id: &str, _device_id: &str, tag: &Tag, value: &FieldValue) -> bool {
        let Some(range) = tag.range.as_ref() else {
            return false;
        };
        range.active.is_some()
            && range.min_value.is_some()
            && range.max_value.is_some()
            && value.as_f64().is_some()
    }

    fn handle(
        &self,
        table_id: &str,
        device_id: &str,
        tag: &Tag,
        value: FieldValue,
    ) -> Result<Option<FieldValue>, HandlerError> {
        let range = tag
            .range
            .as_ref()
            .ok_or_else(|| HandlerError::config(tag, "range missing"))?;
        let active = range.active.as_deref().unwrap_or_default();
        let action = RangeAction::parse(active)
            .ok_or_else(|| HandlerError::config(tag, format!("unknown range action `{}`", active)))?;
        let (Some(min), Some(max)) = (range.min_value, range.max_value) else {
            return Err(HandlerError::config(tag, "range bounds incomplete"));
        };
        if action == RangeAction::Fixed && range.fixed_value.is_none() {
            return Err(HandlerError::config(tag, "range action `fixed` requires fixedValue"));
        }

        let Some(number) = value.as_f64() else {
            return Ok(Some(value));
        };
        if !number.is_finite() {
            debug!(
                target: "dsdk.normalize",
                table_id = %table_id,
                device_id = %device_id,
                tag_id = %tag.id,
                "range_non_finite_discarded"
            );
            return Ok(None);
        }
        if number >= min && number <= max {
            return Ok(Some(value));
        }

        match action {
            RangeAction::Fixed => Ok(range.fixed_value.map(FieldValue::Float)),
            RangeAction::Boundary => {
                let bound = if number < min { min } else { max };
                Ok(Some(FieldValue::Float(bound)))
            }
            RangeAction::Discard => {
                debug!(
                    target: "dsdk.normalize",
                    table_id = %table_id,
                    device_id = %device_id,
                    tag_id = %tag.id,
                    value = number,
                    min = min,
                    max = max,
                    "out_of_range_discarded"
                );
                Ok(None)
            }
        }
    }
}
