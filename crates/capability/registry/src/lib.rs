//! 设备元数据注册表。
//!
//! 设备 id → (表 id → DeviceInfo) 的不可变快照，整体原子替换：
//! 写入方构造新快照后一次性安装，读取方始终看到旧快照或新快照的完整内容，
//! 读路径不加锁。

use arc_swap::ArcSwap;
use domain::{DeviceInfo, DriverConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// 注册表错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("refusing to install an empty device snapshot")]
    EmptySnapshot,
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device not found: {device_id} in table {table_id}")]
    DeviceNotInTable { table_id: String, device_id: String },
    #[error("device {device_id} exists in tables {tables:?}; lookup requires a table id")]
    AmbiguousDevice {
        device_id: String,
        tables: Vec<String>,
    },
    #[error("device {device_id} listed twice in table {table_id}")]
    DuplicateDevice { table_id: String, device_id: String },
    #[error("invalid device config: {0}")]
    InvalidConfig(String),
}

/// 注册表快照（不可变）。
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    devices: HashMap<String, HashMap<String, Arc<DeviceInfo>>>,
}

impl RegistrySnapshot {
    /// 由设备列表构造快照；同一 (设备, 表) 出现两次视为错误。
    pub fn from_devices(
        devices: impl IntoIterator<Item = DeviceInfo>,
    ) -> Result<Self, RegistryError> {
        let mut map: HashMap<String, HashMap<String, Arc<DeviceInfo>>> = HashMap::new();
        for device in devices {
            let tables = map.entry(device.device_id.clone()).or_default();
            if tables.contains_key(&device.table_id) {
                return Err(RegistryError::DuplicateDevice {
                    table_id: device.table_id,
                    device_id: device.device_id,
                });
            }
            tables.insert(device.table_id.clone(), Arc::new(device));
        }
        Ok(Self { devices: map })
    }

    /// 由 start 命令携带的驱动配置构造快照。
    pub fn from_config(config: &DriverConfig) -> Result<Self, RegistryError> {
        let devices = config
            .device_infos()
            .map_err(|err| RegistryError::InvalidConfig(err.to_string()))?;
        Self::from_devices(devices)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// 快照中 (设备, 表) 组合的数量。
    pub fn device_count(&self) -> usize {
        self.devices.values().map(HashMap::len).sum()
    }

    pub fn lookup(&self, device_id: &str) -> Result<Arc<DeviceInfo>, RegistryError> {
        let tables = self
            .devices
            .get(device_id)
            .ok_or_else(|| RegistryError::DeviceNotFound(device_id.to_string()))?;
        if tables.len() > 1 {
            let mut names: Vec<String> = tables.keys().cloned().collect();
            names.sort();
            return Err(RegistryError::AmbiguousDevice {
                device_id: device_id.to_string(),
                tables: names,
            });
        }
        tables
            .values()
            .next()
            .cloned()
            .ok_or_else(|| RegistryError::DeviceNotFound(device_id.to_string()))
    }

    pub fn lookup_in(
        &self,
        table_id: &str,
        device_id: &str,
    ) -> Result<Arc<DeviceInfo>, RegistryError> {
        self.devices
            .get(device_id)
            .and_then(|tables| tables.get(table_id))
            .cloned()
            .ok_or_else(|| RegistryError::DeviceNotInTable {
                table_id: table_id.to_string(),
                device_id: device_id.to_string(),
            })
    }

    pub fn contains(&self, table_id: &str, device_id: &str) -> bool {
        self.devices
            .get(device_id)
            .is_some_and(|tables| tables.contains_key(table_id))
    }

    pub fn devices_in_table(&self, table_id: &str) -> Vec<Arc<DeviceInfo>> {
        let mut devices: Vec<Arc<DeviceInfo>> = self
            .devices
            .values()
            .filter_map(|tables| tables.get(table_id).cloned())
            .collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }
}

/// 进程内共享的元数据注册表。
///
/// 作为显式依赖注入到驱动上下文，不提供全局单例。
pub struct MetadataRegistry {
    current: ArcSwap<RegistrySnapshot>,
}

impl MetadataRegistry {
    /// 创建空注册表（尚未收到 start 配置）。
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RegistrySnapshot::default()),
        }
    }

    /// 原子安装新快照；空快照直接拒绝，不会清空现有状态。
    pub fn replace(&self, snapshot: RegistrySnapshot) -> Result<(), RegistryError> {
        if snapshot.is_empty() {
            return Err(RegistryError::EmptySnapshot);
        }
        let count = snapshot.device_count();
        self.current.store(Arc::new(snapshot));
        info!(target: "dsdk.registry", devices = count, "registry_snapshot_installed");
        Ok(())
    }

    /// 当前快照；需要在同一版本上做多次读取时使用。
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    /// 仅凭设备 id 查找；设备存在于多张表时返回 `AmbiguousDevice`。
    pub fn lookup(&self, device_id: &str) -> Result<Arc<DeviceInfo>, RegistryError> {
        self.current.load().lookup(device_id)
    }

    pub fn lookup_in(
        &self,
        table_id: &str,
        device_id: &str,
    ) -> Result<Arc<DeviceInfo>, RegistryError> {
        self.current.load().lookup_in(table_id, device_id)
    }

    pub fn contains(&self, table_id: &str, device_id: &str) -> bool {
        self.current.load().contains(table_id, device_id)
    }

    pub fn devices_in_table(&self, table_id: &str) -> Vec<Arc<DeviceInfo>> {
        self.current.load().devices_in_table(table_id)
    }

    pub fn device_count(&self) -> usize {
        self.current.load().device_count()
    }
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}
