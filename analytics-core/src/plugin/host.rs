use serde_json::{Map, Value};

/// 宿主只读接口：插件在 `load` 时可读取当前身份等信息，无法绕过管道投递事件
pub trait HostApi: Send + Sync {
    fn write_key(&self) -> &str;

    fn user_id(&self) -> Option<String>;

    fn anonymous_id(&self) -> Option<String>;

    fn traits(&self) -> Map<String, Value>;
}

/// 无身份信息的宿主（测试与独立使用队列时）
#[derive(Debug, Clone, Default)]
pub struct NoopHost {
    write_key: String,
}

impl NoopHost {
    pub fn new(write_key: impl Into<String>) -> Self {
        Self {
            write_key: write_key.into(),
        }
    }
}

impl HostApi for NoopHost {
    fn write_key(&self) -> &str {
        &self.write_key
    }

    fn user_id(&self) -> Option<String> {
        None
    }

    fn anonymous_id(&self) -> Option<String> {
        None
    }

    fn traits(&self) -> Map<String, Value> {
        Map::new()
    }
}
