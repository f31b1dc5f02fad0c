//! 持久化存储协议（DurableStorage）
//!
//! 队列以命名空间（`{write_key}:{queue_id}`）为单位读写待投递条目，
//! 实现方须保证单次调用的崩溃原子性。
//!
use crate::error::CoreResult as Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// 持久化条目：序列化后的队列项及其调度元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    /// 条目键（上下文 id）
    pub id: String,
    /// 已失败的投递次数
    pub attempts: u32,
    pub priority: u8,
    pub payload: Value,
}

#[async_trait]
pub trait DurableStorage: Send + Sync {
    /// 读取命名空间下的全部条目（按写入顺序）
    async fn get(&self, namespace: &str) -> Result<Vec<StoredItem>>;

    /// 以 `items` 整体替换命名空间下的条目
    async fn set(&self, namespace: &str, items: &[StoredItem]) -> Result<()>;

    /// 删除单个条目，条目不存在时视为成功
    async fn remove(&self, namespace: &str, id: &str) -> Result<()>;
}

#[async_trait]
impl<T> DurableStorage for Arc<T>
where
    T: DurableStorage + ?Sized,
{
    async fn get(&self, namespace: &str) -> Result<Vec<StoredItem>> {
        (**self).get(namespace).await
    }

    async fn set(&self, namespace: &str, items: &[StoredItem]) -> Result<()> {
        (**self).set(namespace, items).await
    }

    async fn remove(&self, namespace: &str, id: &str) -> Result<()> {
        (**self).remove(namespace, id).await
    }
}

/// 队列命名空间，避免多个独立队列在共享存储中冲突
pub fn namespace(write_key: &str, queue_id: &str) -> String {
    format!("{write_key}:{queue_id}")
}
