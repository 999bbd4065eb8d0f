use domain::{FieldValue, Tag};

/// 值处理错误。
///
/// 只有配置错误会走到这里；越界丢弃、非有限值丢弃属于数据质量问题，
/// 以 `Ok(None)` 表达。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid config for tag {tag_id}: {reason}")]
    Config { tag_id: String, reason: String },
}

impl HandlerError {
    pub(crate) fn config(tag: &Tag, reason: impl Into<String>) -> Self {
        HandlerError::Config {
            tag_id: tag.id.clone(),
            reason: reason.into(),
        }
    }
}

/// 值处理器。
///
/// `supports` 为 false 时处理器被跳过；`handle` 返回 `Ok(None)` 表示丢弃该读数。
pub trait ValueHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// 数值越小越先执行。
    fn priority(&self) -> i32;

    fn supports(&self, table_id: &str, device_id: &str, tag: &Tag, value: &FieldValue) -> bool;

    fn handle(
        &self,
        table_id: &str,
        device_id: &str,
        tag: &Tag,
        value: FieldValue,
    ) -> Result<Option<FieldValue>, HandlerError>;
}
