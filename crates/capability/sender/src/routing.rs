use domain::LogLevel;

/// 路由键生成（按项目、表、设备分层，下游可按前缀订阅）。
///
/// MQTT 使用 `/` 分隔，AMQP 与 Kafka 使用 `.`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingKeys {
    project_id: String,
    separator: char,
}

impl RoutingKeys {
    pub fn new(project_id: impl Into<String>, separator: char) -> Self {
        Self {
            project_id: project_id.into(),
            separator,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// `data.<project>.<table>.<device>`
    pub fn data(&self, table_id: &str, device_id: &str) -> String {
        self.join(&["data", &self.project_id, table_id, device_id])
    }

    /// `logs.<project>.<level>.<table>.<device>`
    pub fn log(&self, level: LogLevel, table_id: &str, device_id: &str) -> String {
        self.join(&["logs", &self.project_id, level.as_str(), table_id, device_id])
    }

    /// `warning.<project>.<table>.<device>`
    pub fn warning(&self, table_id: &str, device_id: &str) -> String {
        self.join(&["warning", &self.project_id, table_id, device_id])
    }

    /// `recovery.<project>.<table>.<device>`
    pub fn recovery(&self, table_id: &str, device_id: &str) -> String {
        self.join(&["recovery", &self.project_id, table_id, device_id])
    }

    fn join(&self, parts: &[&str]) -> String {
        let mut key = String::new();
        for (idx, part) in parts.iter().enumerate() {
            if idx > 0 {
                key.push(self.separator);
            }
            key.push_str(part);
        }
        key
    }
}
