use super::{Plugin, PluginType};
use crate::error::{CoreError, CoreResult};
use std::sync::{Arc, PoisonError, RwLock};

/// 插件加载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Loading,
    Ready,
    Failed,
}

struct RegisteredPlugin {
    plugin: Arc<dyn Plugin>,
    state: PluginState,
}

/// 调度时刻的插件快照，按阶段分组、组内保持注册顺序
#[derive(Clone, Default)]
pub struct PluginSnapshot {
    pub before: Vec<Arc<dyn Plugin>>,
    pub enrichment: Vec<Arc<dyn Plugin>>,
    pub destinations: Vec<Arc<dyn Plugin>>,
    pub after: Vec<Arc<dyn Plugin>>,
}

impl PluginSnapshot {
    pub fn destination(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.destinations.iter().find(|p| p.name() == name).cloned()
    }
}

/// 队列私有的插件注册表（非全局单例），按名称去重
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<Vec<RegisteredPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, plugin: Arc<dyn Plugin>) -> CoreResult<()> {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        if plugins.iter().any(|p| p.plugin.name() == plugin.name()) {
            return Err(CoreError::PluginAlreadyRegistered {
                name: plugin.name().to_string(),
            });
        }
        plugins.push(RegisteredPlugin {
            plugin,
            state: PluginState::Loading,
        });
        Ok(())
    }

    pub(crate) fn set_state(&self, name: &str, state: PluginState) {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(p) = plugins.iter_mut().find(|p| p.plugin.name() == name) {
            p.state = state;
        }
    }

    pub(crate) fn remove(&self, name: &str) -> CoreResult<Arc<dyn Plugin>> {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        let Some(idx) = plugins.iter().position(|p| p.plugin.name() == name) else {
            return Err(CoreError::PluginNotFound {
                name: name.to_string(),
            });
        };
        Ok(plugins.remove(idx).plugin)
    }

    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|p| p.plugin.name() == name)
            .map(|p| p.state)
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|p| p.plugin.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 取快照：仅包含加载成功且 `is_loaded()` 为真的插件；`utility` 不参与事件调度
    pub fn snapshot(&self) -> PluginSnapshot {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        let mut snapshot = PluginSnapshot::default();
        for p in plugins
            .iter()
            .filter(|p| p.state == PluginState::Ready && p.plugin.is_loaded())
        {
            let plugin = p.plugin.clone();
            match plugin.plugin_type() {
                PluginType::Before => snapshot.before.push(plugin),
                PluginType::Enrichment => snapshot.enrichment.push(plugin),
                PluginType::Destination => snapshot.destinations.push(plugin),
                PluginType::After => snapshot.after.push(plugin),
                PluginType::Utility => {}
            }
        }
        snapshot
    }
}
