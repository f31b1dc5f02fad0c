use super::{DispatchQueue, QueueEntry, QueueItem, RetryOutcome, RetryPolicy};
use crate::error::CoreResult as Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::time::Instant;
use tracing::{debug, warn};

/// 内存优先级队列
///
/// 语义：
/// - 等待区按 `(priority, seq)` 排序：优先级升序，同优先级按入队序号 FIFO；
/// - 重试的条目获得新的序号，即排到其优先级段的末尾，并在退避到期前不可取出；
/// - `pop` 在在途数达到 `max_concurrency` 时返回 `None`，直到 `settle`/`update_attempts`
///   释放名额；
/// - 等待区与在途条目的 key 共同去重。
pub struct PriorityQueue<T> {
    backlog: BTreeMap<(u8, u64), QueueEntry<T>>,
    keys: HashSet<String>,
    in_flight: usize,
    max_concurrency: usize,
    retry: RetryPolicy,
    next_seq: u64,
}

impl<T: QueueItem> PriorityQueue<T> {
    /// `max_concurrency` 至少为 1
    pub fn new(max_concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            backlog: BTreeMap::new(),
            keys: HashSet::new(),
            in_flight: 0,
            max_concurrency: max_concurrency.max(1),
            retry,
            next_seq: 0,
        }
    }

    pub fn push(&mut self, item: T, priority: u8) -> bool {
        self.push_with_attempts(item, priority, 0)
    }

    /// 以已有的失败次数入队（持久化恢复）
    pub fn push_with_attempts(&mut self, item: T, priority: u8, attempts: u32) -> bool {
        if self.keys.contains(item.key()) {
            debug!(key = item.key(), "duplicate queue item ignored");
            return false;
        }
        self.keys.insert(item.key().to_string());
        self.insert(QueueEntry::new(item, priority, attempts, Instant::now()));
        true
    }

    fn insert(&mut self, entry: QueueEntry<T>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.backlog.insert((entry.priority, seq), entry);
    }

    pub fn pop(&mut self) -> Option<QueueEntry<T>> {
        if self.in_flight >= self.max_concurrency {
            return None;
        }
        let now = Instant::now();
        let slot = *self
            .backlog
            .iter()
            .find(|(_, entry)| entry.ready_at <= now)?
            .0;
        let entry = self.backlog.remove(&slot)?;
        self.in_flight += 1;
        Some(entry)
    }

    pub fn update_attempts(&mut self, mut entry: QueueEntry<T>) -> RetryOutcome<T> {
        self.in_flight = self.in_flight.saturating_sub(1);
        entry.attempts += 1;

        if self.retry.is_exhausted(entry.attempts) {
            self.keys.remove(entry.key());
            warn!(
                key = entry.key(),
                attempts = entry.attempts,
                "retry attempts exhausted"
            );
            return RetryOutcome::Exhausted(entry);
        }

        let attempts = entry.attempts;
        let delay = self.retry.delay_for(attempts);
        entry.ready_at = Instant::now() + delay;
        debug!(
            key = entry.key(),
            attempts,
            delay_ms = delay.as_millis() as u64,
            "entry rescheduled with backoff"
        );
        self.insert(entry);
        RetryOutcome::Scheduled { attempts, delay }
    }

    pub fn settle(&mut self, key: &str) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.keys.remove(key);
    }

    pub fn next_ready_at(&self) -> Option<Instant> {
        self.backlog.values().map(|entry| entry.ready_at).min()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

#[async_trait]
impl<T: QueueItem> DispatchQueue<T> for PriorityQueue<T> {
    async fn restore(&mut self) -> Result<usize> {
        Ok(0)
    }

    async fn push(&mut self, item: T, priority: u8) -> Result<bool> {
        Ok(PriorityQueue::push(self, item, priority))
    }

    fn pop(&mut self) -> Option<QueueEntry<T>> {
        PriorityQueue::pop(self)
    }

    async fn update_attempts(&mut self, entry: QueueEntry<T>) -> RetryOutcome<T> {
        PriorityQueue::update_attempts(self, entry)
    }

    async fn settle(&mut self, key: &str) {
        PriorityQueue::settle(self, key)
    }

    fn next_ready_at(&self) -> Option<Instant> {
        PriorityQueue::next_ready_at(self)
    }

    fn len(&self) -> usize {
        PriorityQueue::len(self)
    }

    fn in_flight(&self) -> usize {
        PriorityQueue::in_flight(self)
    }
}
