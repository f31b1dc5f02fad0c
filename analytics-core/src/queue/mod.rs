//! 调度队列（queue）
//!
//! 准入控制与排序：
//! - `PriorityQueue`：内存优先级队列，优先级升序、同优先级 FIFO，在途数不超过 `max_concurrency`；
//! - `PersistedQueue`：在 `PriorityQueue` 之上把未完成条目写入 `DurableStorage`，重启后恢复；
//! - `DispatchQueue`：两者的统一异步协议，供事件队列注入使用；
//! - `RetryPolicy`：指数退避与最大尝试次数。
//!
mod persisted_queue;
mod priority_queue;
mod retry;

pub use persisted_queue::{Persistable, PersistedQueue};
pub use priority_queue::PriorityQueue;
pub use retry::RetryPolicy;

use crate::error::CoreResult as Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// 队列项：以 `key` 去重（同一上下文不会被重复入队）
pub trait QueueItem: Send + Sync + 'static {
    fn key(&self) -> &str;
}

/// 队列条目：队列项及其调度元数据
#[derive(Debug)]
pub struct QueueEntry<T> {
    item: T,
    priority: u8,
    attempts: u32,
    ready_at: Instant,
}

impl<T> QueueEntry<T> {
    pub(crate) fn new(item: T, priority: u8, attempts: u32, ready_at: Instant) -> Self {
        Self {
            item,
            priority,
            attempts,
            ready_at,
        }
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn item_mut(&mut self) -> &mut T {
        &mut self.item
    }

    pub fn into_item(self) -> T {
        self.item
    }

    /// 0 为最高优先级
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// 已失败的尝试次数
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn ready_at(&self) -> Instant {
        self.ready_at
    }
}

impl<T: QueueItem> QueueEntry<T> {
    pub fn key(&self) -> &str {
        self.item.key()
    }
}

/// `update_attempts` 的结果；终止时条目按值交还，保证只会终结一次
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Scheduled { attempts: u32, delay: Duration },
    Exhausted(QueueEntry<T>),
}

/// 调度队列协议
#[async_trait]
pub trait DispatchQueue<T: QueueItem>: Send {
    /// 从持久化存储恢复未完成条目，须在接收新条目之前调用
    async fn restore(&mut self) -> Result<usize>;

    /// 入队；重复的 key 返回 `Ok(false)`
    async fn push(&mut self, item: T, priority: u8) -> Result<bool>;

    /// 取出最高优先级且已就绪的条目；在途已满时返回 `None`
    fn pop(&mut self) -> Option<QueueEntry<T>>;

    /// 记录一次失败：未达上限则退避后重新入队，否则终止
    async fn update_attempts(&mut self, entry: QueueEntry<T>) -> RetryOutcome<T>;

    /// 条目成功结束，释放在途名额
    async fn settle(&mut self, key: &str);

    /// 最早的退避到期时间
    fn next_ready_at(&self) -> Option<Instant>;

    /// 等待中的条目数（不含在途）
    fn len(&self) -> usize;

    fn in_flight(&self) -> usize;

    fn is_idle(&self) -> bool {
        self.len() == 0 && self.in_flight() == 0
    }
}
