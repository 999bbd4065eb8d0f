use crate::error::DriverError;
use async_trait::async_trait;
use domain::{BatchCmd, Cmd, CommandResult, DebugInfo, DriverConfig};
use dsdk_normalize::{HandlerChain, PointBuilder, PointRequest};
use dsdk_registry::MetadataRegistry;
use dsdk_sender::DataSender;
use std::sync::Arc;

/// 驱动调用上下文：注册表、发送端与 Point 构建器作为显式依赖传入。
#[derive(Clone)]
pub struct DriverContext {
    registry: Arc<MetadataRegistry>,
    sender: Arc<dyn DataSender>,
    points: PointBuilder,
}

impl DriverContext {
    pub fn new(
        registry: Arc<MetadataRegistry>,
        sender: Arc<dyn DataSender>,
        chain: Arc<HandlerChain>,
    ) -> Self {
        let points = PointBuilder::new(Arc::clone(&registry), chain);
        Self {
            registry,
            sender,
            points,
        }
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    pub fn sender(&self) -> &Arc<dyn DataSender> {
        &self.sender
    }

    pub fn points(&self) -> &PointBuilder {
        &self.points
    }

    /// 构建 Point 并发布。返回 `false` 表示字段全部被丢弃，无需发布。
    pub async fn publish_values(&self, request: PointRequest) -> Result<bool, DriverError> {
        let Some(point) = self.points.build(request)? else {
            return Ok(false);
        };
        self.sender.write_point(&point).await?;
        Ok(true)
    }
}

/// 用户驱动实现契约。
///
/// 分发器只通过这些方法调用驱动；驱动通过 `DriverContext` 回到注册表与发送端。
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    async fn start(&self, ctx: &DriverContext, config: &DriverConfig) -> Result<(), DriverError>;

    async fn stop(&self, ctx: &DriverContext) -> Result<(), DriverError>;

    async fn run(&self, ctx: &DriverContext, cmd: &Cmd) -> Result<CommandResult, DriverError>;

    async fn batch_run(
        &self,
        _ctx: &DriverContext,
        _cmd: &BatchCmd,
    ) -> Result<CommandResult, DriverError> {
        Err(DriverError::Unsupported("batchRun"))
    }

    async fn write_tag(
        &self,
        _ctx: &DriverContext,
        _cmd: &Cmd,
    ) -> Result<CommandResult, DriverError> {
        Err(DriverError::Unsupported("writeTag"))
    }

    async fn debug(
        &self,
        _ctx: &DriverContext,
        _config: &serde_json::Value,
    ) -> Result<DebugInfo, DriverError> {
        Err(DriverError::Unsupported("debug"))
    }

    async fn schema(&self) -> Result<String, DriverError> {
        Err(DriverError::Unsupported("schema"))
    }
}
