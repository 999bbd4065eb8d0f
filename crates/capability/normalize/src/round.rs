use crate::handler::{HandlerError, ValueHandler};
use domain::{FieldValue, Tag};
use tracing::warn;

/// 取整与缩放：先乘以 `mod`，再按 `fixed` 位小数四舍五入（half-up）。
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundScaleHandler;

impl RoundScaleHandler {
    pub const PRIORITY: i32 = 200;
}

impl ValueHandler for RoundScaleHandler {
    fn name(&self) -> &'static str {
        "round_scale"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn supports(&self, _table_id: &str, _device_id: &str, tag: &Tag, value: &FieldValue) -> bool {
        (tag.fixed.is_some() || tag.scale.is_some()) && value.as_f64().is_some()
    }

    fn handle(
        &self,
        table_id: &str,
        device_id: &str,
        tag: &Tag,
        value: FieldValue,
    ) -> Result<Option<FieldValue>, HandlerError> {
        let Some(mut number) = value.as_f64() else {
            return Ok(Some(value));
        };
        if let Some(scale) = tag.scale {
            number *= scale;
        }
        if !number.is_finite() {
            warn!(
                target: "dsdk.normalize",
                table_id = %table_id,
                device_id = %device_id,
                tag_id = %tag.id,
                value = %value,
                "non_finite_value_discarded"
            );
            return Ok(None);
        }
        if let Some(fixed) = tag.fixed.filter(|fixed| *fixed >= 0) {
            number = round_half_up(number, fixed as u32);
        }
        Ok(Some(FieldValue::Float(number)))
    }
}

/// 按十进制最短表示做 half-up 舍入（远离零方向进位）。
///
/// 直接在二进制浮点上放大取整会把 1.005 舍成 1.00，这里基于 `Display`
/// 输出的十进制数字串逐位判断。
pub fn round_half_up(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let repr = value.abs().to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));
    let places = places as usize;
    if frac_part.len() <= places {
        return value;
    }
    let round_up = frac_part.as_bytes()[places] >= b'5';
    let digits = format!("{}{}", int_part, &frac_part[..places]);
    let Ok(mut scaled) = digits.parse::<u128>() else {
        return value;
    };
    if round_up {
        scaled += 1;
    }
    let text = scaled.to_string();
    let text = if places == 0 {
        text
    } else {
        let padded = format!("{:0>width$}", text, width = places + 1);
        let (int_digits, frac_digits) = padded.split_at(padded.len() - places);
        format!("{}.{}", int_digits, frac_digits)
    };
    let Ok(rounded) = text.parse::<f64>() else {
        return value;
    };
    if rounded == 0.0 {
        0.0
    } else if value.is_sign_negative() {
        -rounded
    } else {
        rounded
    }
}
