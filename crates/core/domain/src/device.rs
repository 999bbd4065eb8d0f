use crate::error::DomainError;
use crate::tag::Tag;
use std::collections::HashMap;
use std::sync::Arc;

/// 设备在某个模型表下的点位集合。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub device_id: String,
    pub table_id: String,
    pub instance_id: String,
    tags: HashMap<String, Arc<Tag>>,
}

impl DeviceInfo {
    /// 构造设备信息；点位 id 在设备内必须唯一。
    pub fn new(
        device_id: impl Into<String>,
        table_id: impl Into<String>,
        instance_id: impl Into<String>,
        tags: Vec<Tag>,
    ) -> Result<Self, DomainError> {
        let device_id = device_id.into();
        let mut map = HashMap::with_capacity(tags.len());
        for tag in tags {
            if map.contains_key(&tag.id) {
                return Err(DomainError::DuplicateTag {
                    device_id,
                    tag_id: tag.id,
                });
            }
            map.insert(tag.id.clone(), Arc::new(tag));
        }
        Ok(Self {
            device_id,
            table_id: table_id.into(),
            instance_id: instance_id.into(),
            tags: map,
        })
    }

    pub fn tag(&self, tag_id: &str) -> Option<&Arc<Tag>> {
        self.tags.get(tag_id)
    }

    pub fn tags(&self) -> impl Iterator<Item = &Arc<Tag>> {
        self.tags.values()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
}
