/// 领域模型构造错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("duplicate tag `{tag_id}` on device `{device_id}`")]
    DuplicateTag { device_id: String, tag_id: String },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
