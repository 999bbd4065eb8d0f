use crate::chain::HandlerChain;
use crate::handler::HandlerError;
use domain::{Field, FieldValue, Point, now_epoch_ms};
use dsdk_registry::{MetadataRegistry, RegistryError};
use dsdk_telemetry::record_field_discarded;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Point 构建错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("handler error: {0}")]
    Handler(#[from] HandlerError),
    #[error("no known tag matched for device {device_id} in table {table_id}")]
    NoMatchingTags { table_id: String, device_id: String },
}

/// 一次构建请求：按调用方顺序给出的 (tag id, 原始值)。
#[derive(Debug, Clone, Default)]
pub struct PointRequest {
    pub table_id: Option<String>,
    pub device_id: String,
    pub child_device_id: Option<String>,
    /// 0 表示使用当前时间。
    pub time_ms: i64,
    pub values: Vec<(String, FieldValue)>,
}

impl PointRequest {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    pub fn in_table(mut self, table_id: impl Into<String>) -> Self {
        self.table_id = Some(table_id.into());
        self
    }

    pub fn child(mut self, child_device_id: impl Into<String>) -> Self {
        self.child_device_id = Some(child_device_id.into());
        self
    }

    pub fn at(mut self, time_ms: i64) -> Self {
        self.time_ms = time_ms;
        self
    }

    pub fn value(mut self, tag_id: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values.push((tag_id.into(), value.into()));
        self
    }
}

/// 基于注册表与处理链构建 Point。
#[derive(Clone)]
pub struct PointBuilder {
    registry: Arc<MetadataRegistry>,
    chain: Arc<HandlerChain>,
}

impl PointBuilder {
    pub fn new(registry: Arc<MetadataRegistry>, chain: Arc<HandlerChain>) -> Self {
        Self { registry, chain }
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    pub fn chain(&self) -> &Arc<HandlerChain> {
        &self.chain
    }

    /// 构建 Point。
    ///
    /// - 设备未知或仅凭 id 无法唯一定位时返回注册表错误；
    /// - 没有任何 tag id 命中设备点位时返回 `NoMatchingTags`；
    /// - 命中的字段全部被丢弃时返回 `Ok(None)`，无需发送。
    pub fn build(&self, request: PointRequest) -> Result<Option<Point>, BuildError> {
        let device = match request.table_id.as_deref() {
            Some(table_id) => self.registry.lookup_in(table_id, &request.device_id)?,
            None => self.registry.lookup(&request.device_id)?,
        };
        let table_id = device.table_id.as_str();
        let device_id = request.device_id.as_str();

        let mut matched = 0usize;
        let mut fields = Vec::with_capacity(request.values.len());
        let mut field_types = HashMap::new();
        for (tag_id, raw) in request.values {
            let Some(tag) = device.tag(&tag_id) else {
                debug!(
                    target: "dsdk.normalize",
                    table_id = %table_id,
                    device_id = %device_id,
                    tag_id = %tag_id,
                    "unknown_tag_skipped"
                );
                continue;
            };
            matched += 1;
            let Some(value) = self.chain.apply(table_id, device_id, tag, raw)? else {
                record_field_discarded();
                continue;
            };
            if !value.is_finite() {
                record_field_discarded();
                debug!(
                    target: "dsdk.normalize",
                    table_id = %table_id,
                    device_id = %device_id,
                    tag_id = %tag_id,
                    "non_finite_value_discarded"
                );
                continue;
            }
            if let Some(data_type) = tag.data_type {
                field_types.insert(tag.id.clone(), data_type);
            }
            fields.push(Field {
                tag: tag.clone(),
                value,
            });
        }

        if matched == 0 {
            return Err(BuildError::NoMatchingTags {
                table_id: table_id.to_string(),
                device_id: device_id.to_string(),
            });
        }
        if fields.is_empty() {
            return Ok(None);
        }

        let time_ms = if request.time_ms > 0 {
            request.time_ms
        } else {
            now_epoch_ms()
        };
        Ok(Some(Point {
            device_id: request.device_id.clone(),
            child_device_id: request.child_device_id,
            table_id: device.table_id.clone(),
            time_ms,
            fields,
            field_types,
        }))
    }
}
