//! 内存版持久化存储（InMemoryStorage）
//!
//! 基于 `DashMap` 的共享存储，克隆后指向同一份数据：
//! - 队列实例被丢弃后数据仍在，可用于模拟进程内"重启"；
//! - 典型用途：测试环境、示例与本地开发。
//!
//! 注意：该实现不跨进程存活。

use crate::error::CoreResult as Result;
use crate::persist::{DurableStorage, StoredItem};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    namespaces: Arc<DashMap<String, Vec<StoredItem>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 命名空间下的条目数
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces.get(namespace).map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.iter().map(|e| e.key().clone()).collect()
    }
}

#[async_trait]
impl DurableStorage for InMemoryStorage {
    async fn get(&self, namespace: &str) -> Result<Vec<StoredItem>> {
        Ok(self
            .namespaces
            .get(namespace)
            .map(|v| v.clone())
            .unwrap_or_default())
    }

    async fn set(&self, namespace: &str, items: &[StoredItem]) -> Result<()> {
        self.namespaces.insert(namespace.to_string(), items.to_vec());
        Ok(())
    }

    async fn remove(&self, namespace: &str, id: &str) -> Result<()> {
        if let Some(mut items) = self.namespaces.get_mut(namespace) {
            items.retain(|item| item.id != id);
        }
        Ok(())
    }
}
