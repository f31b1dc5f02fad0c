use super::{DispatchQueue, PriorityQueue, QueueEntry, QueueItem, RetryOutcome, RetryPolicy};
use crate::error::CoreResult as Result;
use crate::persist::{DurableStorage, StoredItem};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// 可持久化的队列项
pub trait Persistable: QueueItem + Sized {
    fn to_payload(&self) -> Result<Value>;

    fn from_payload(payload: Value) -> Result<Self>;
}

/// 持久化优先级队列
///
/// 在 `PriorityQueue` 之上维护命名空间内的持久化镜像：
/// - `push`：先写存储再入内存，写入失败则不入队；
/// - `update_attempts`：重试时回写新的失败次数与负载，终止时删除；
/// - `settle`：成功后删除；
/// - `restore`：启动时按写入顺序恢复，失败次数保持不变。
///
/// 入队之后的存储写入是尽力而为的：失败只记录日志，条目可能在重启后被再次投递（至少一次）。
pub struct PersistedQueue<T> {
    inner: PriorityQueue<T>,
    storage: Arc<dyn DurableStorage>,
    namespace: String,
    records: Vec<StoredItem>,
}

impl<T: Persistable> PersistedQueue<T> {
    pub fn new(
        storage: Arc<dyn DurableStorage>,
        namespace: impl Into<String>,
        max_concurrency: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner: PriorityQueue::new(max_concurrency, retry),
            storage,
            namespace: namespace.into(),
            records: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// 当前持久化镜像中的条目数（等待 + 在途）
    pub fn persisted_len(&self) -> usize {
        self.records.len()
    }

    fn record_index(&self, key: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == key)
    }

    async fn write_records(&self) -> Result<()> {
        self.storage.set(&self.namespace, &self.records).await
    }

    async fn forget(&mut self, key: &str) {
        if let Some(idx) = self.record_index(key) {
            self.records.remove(idx);
        }
        if let Err(e) = self.storage.remove(&self.namespace, key).await {
            error!(namespace = %self.namespace, key, error = %e, "failed to remove persisted item");
        }
    }
}

#[async_trait]
impl<T: Persistable> DispatchQueue<T> for PersistedQueue<T> {
    async fn restore(&mut self) -> Result<usize> {
        let stored = self.storage.get(&self.namespace).await?;
        let mut restored = 0;

        for item in stored {
            match T::from_payload(item.payload.clone()) {
                Ok(value) => {
                    if self
                        .inner
                        .push_with_attempts(value, item.priority, item.attempts)
                    {
                        self.records.push(item);
                        restored += 1;
                    }
                }
                Err(e) => {
                    warn!(namespace = %self.namespace, key = %item.id, error = %e, "dropping unreadable persisted item");
                    if let Err(e) = self.storage.remove(&self.namespace, &item.id).await {
                        error!(namespace = %self.namespace, key = %item.id, error = %e, "failed to remove unreadable item");
                    }
                }
            }
        }

        if restored > 0 {
            info!(namespace = %self.namespace, restored, "restored persisted queue items");
        }
        Ok(restored)
    }

    async fn push(&mut self, item: T, priority: u8) -> Result<bool> {
        if self.inner.contains(item.key()) || self.record_index(item.key()).is_some() {
            debug!(namespace = %self.namespace, key = item.key(), "duplicate persisted item ignored");
            return Ok(false);
        }

        self.records.push(StoredItem {
            id: item.key().to_string(),
            attempts: 0,
            priority,
            payload: item.to_payload()?,
        });
        if let Err(e) = self.write_records().await {
            self.records.pop();
            return Err(e);
        }

        Ok(self.inner.push(item, priority))
    }

    fn pop(&mut self) -> Option<QueueEntry<T>> {
        self.inner.pop()
    }

    async fn update_attempts(&mut self, entry: QueueEntry<T>) -> RetryOutcome<T> {
        let key = entry.key().to_string();
        let payload = entry.item().to_payload();
        let outcome = self.inner.update_attempts(entry);

        match &outcome {
            RetryOutcome::Scheduled { attempts, .. } => {
                if let Some(idx) = self.record_index(&key) {
                    let record = &mut self.records[idx];
                    record.attempts = *attempts;
                    match payload {
                        Ok(payload) => record.payload = payload,
                        Err(e) => {
                            warn!(namespace = %self.namespace, key = %key, error = %e, "keeping previous payload")
                        }
                    }
                }
                if let Err(e) = self.write_records().await {
                    error!(namespace = %self.namespace, key = %key, error = %e, "failed to persist retry attempts");
                }
            }
            RetryOutcome::Exhausted(_) => self.forget(&key).await,
        }

        outcome
    }

    async fn settle(&mut self, key: &str) {
        self.inner.settle(key);
        self.forget(key).await;
    }

    fn next_ready_at(&self) -> Option<Instant> {
        self.inner.next_ready_at()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn in_flight(&self) -> usize {
        self.inner.in_flight()
    }
}
