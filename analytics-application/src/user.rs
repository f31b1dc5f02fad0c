//! 用户身份（User）
//!
//! 保存当前用户 id、匿名 id 与特征，供每次调用填充事件身份字段，并以 `HostApi` 的形式只读地
//! 暴露给插件。
//!
use analytics_core::plugin::HostApi;
use serde_json::{Map, Value};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Identity {
    user_id: Option<String>,
    anonymous_id: String,
    traits: Map<String, Value>,
}

#[derive(Debug)]
pub struct User {
    write_key: String,
    identity: RwLock<Identity>,
}

impl User {
    pub fn new(write_key: impl Into<String>, anonymous_id: Option<String>) -> Self {
        Self {
            write_key: write_key.into(),
            identity: RwLock::new(Identity {
                anonymous_id: anonymous_id.unwrap_or_else(new_anonymous_id),
                ..Default::default()
            }),
        }
    }

    pub fn id(&self) -> Option<String> {
        self.read().user_id.clone()
    }

    pub fn anonymous_id(&self) -> String {
        self.read().anonymous_id.clone()
    }

    pub fn traits(&self) -> Map<String, Value> {
        self.read().traits.clone()
    }

    /// 识别用户并合并特征；切换到另一个用户 id 时先清空旧特征
    ///
    /// 返回合并后的完整特征。
    pub fn identify(&self, user_id: Option<String>, traits: Map<String, Value>) -> Map<String, Value> {
        let mut identity = self.write();
        if let Some(user_id) = user_id {
            if identity.user_id.as_deref().is_some_and(|current| current != user_id) {
                identity.traits.clear();
            }
            identity.user_id = Some(user_id);
        }
        identity.traits.extend(traits);
        identity.traits.clone()
    }

    pub fn set_anonymous_id(&self, anonymous_id: impl Into<String>) {
        self.write().anonymous_id = anonymous_id.into();
    }

    /// 登出：清空用户 id 与特征，并换一个新的匿名 id
    pub fn reset(&self) {
        *self.write() = Identity {
            anonymous_id: new_anonymous_id(),
            ..Default::default()
        };
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Identity> {
        self.identity.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Identity> {
        self.identity.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn new_anonymous_id() -> String {
    Uuid::new_v4().to_string()
}

impl HostApi for User {
    fn write_key(&self) -> &str {
        &self.write_key
    }

    fn user_id(&self) -> Option<String> {
        self.id()
    }

    fn anonymous_id(&self) -> Option<String> {
        Some(User::anonymous_id(self))
    }

    fn traits(&self) -> Map<String, Value> {
        User::traits(self)
    }
}
