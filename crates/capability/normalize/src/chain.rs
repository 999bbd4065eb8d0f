use crate::handler::{HandlerError, ValueHandler};
use crate::range::RangeHandler;
use crate::round::RoundScaleHandler;
use crate::unit::UnitConversionHandler;
use domain::{FieldValue, Tag};
use std::sync::Arc;
use tracing::debug;

/// 按优先级升序排列的值处理链。
///
/// 处理过程同步、无副作用，可在任意任务上直接调用。
#[derive(Clone)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn ValueHandler>>,
}

impl HandlerChain {
    pub fn builder() -> HandlerChainBuilder {
        HandlerChainBuilder::default()
    }

    /// 内置处理链：单位换算 → 取整缩放 → 量程校验。
    pub fn standard() -> Self {
        Self::builder()
            .with(UnitConversionHandler)
            .with(RoundScaleHandler)
            .with(RangeHandler)
            .build()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|handler| handler.name()).collect()
    }

    pub fn priorities(&self) -> Vec<i32> {
        self.handlers.iter().map(|handler| handler.priority()).collect()
    }

    /// 依次执行匹配的处理器；任一处理器丢弃即停止并返回 `Ok(None)`。
    pub fn apply(
        &self,
        table_id: &str,
        device_id: &str,
        tag: &Tag,
        value: FieldValue,
    ) -> Result<Option<FieldValue>, HandlerError> {
        let mut current = value;
        for handler in &self.handlers {
            if !handler.supports(table_id, device_id, tag, &current) {
                continue;
            }
            match handler.handle(table_id, device_id, tag, current)? {
                Some(next) => current = next,
                None => {
                    debug!(
                        target: "dsdk.normalize",
                        table_id = %table_id,
                        device_id = %device_id,
                        tag_id = %tag.id,
                        handler = handler.name(),
                        "field_discarded"
                    );
                    return Ok(None);
                }
            }
        }
        Ok(Some(current))
    }
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::standard()
    }
}

/// 处理链构建器；`build` 时按优先级稳定排序。
#[derive(Default)]
pub struct HandlerChainBuilder {
    handlers: Vec<Arc<dyn ValueHandler>>,
}

impl HandlerChainBuilder {
    pub fn with(self, handler: impl ValueHandler + 'static) -> Self {
        self.with_arc(Arc::new(handler))
    }

    pub fn with_arc(mut self, handler: Arc<dyn ValueHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build(mut self) -> HandlerChain {
        self.handlers.sort_by_key(|handler| handler.priority());
        HandlerChain {
            handlers: self.handlers,
        }
    }
}
