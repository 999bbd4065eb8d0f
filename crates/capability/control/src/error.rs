use dsdk_normalize::BuildError;
use dsdk_registry::RegistryError;
use dsdk_sender::SenderError;

/// 驱动实现返回的错误。
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("driver failed: {0}")]
    Failed(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("invalid driver config: {0}")]
    Config(String),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Send(#[from] SenderError),
}

/// 控制通道错误。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("connect error: {0}")]
    Connect(String),
    #[error("envelope error: {0}")]
    Envelope(String),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("control session closed")]
    Closed,
}
