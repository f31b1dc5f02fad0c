//! 生命周期通知（Emitter）
//!
//! 与控制流解耦的类型化发布/订阅：
//! - `subscribe`/`on`：同步回调，按注册顺序调用，单个回调 panic 不影响其他回调与管道；
//! - `stream`：基于 `tokio::sync::broadcast` 的 `'static` 事件流，便于在 `tokio::spawn` 中
//!   消费（外部日志、指标）。无订阅者或订阅者落后时事件被丢弃。
//!
use crate::context::{Context, EventType};
use crate::plugin::PluginType;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

const DEFAULT_STREAM_CAPACITY: usize = 256;

/// 通知种类（用于按种类订阅）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Dispatch,
    Register,
    Deregister,
    Error,
}

#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// 上下文完成一次调度（投递成功、最终失败或被取消）
    Dispatch { method: EventType, ctx: Context },
    Register {
        plugin: String,
        version: String,
        plugin_type: PluginType,
    },
    Deregister { plugin: String },
    Error(ErrorEvent),
}

impl QueueEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            QueueEvent::Dispatch { .. } => EventKind::Dispatch,
            QueueEvent::Register { .. } => EventKind::Register,
            QueueEvent::Deregister { .. } => EventKind::Deregister,
            QueueEvent::Error(_) => EventKind::Error,
        }
    }
}

/// 错误通知
#[derive(Debug, Clone)]
pub enum ErrorEvent {
    Unknown {
        reason: String,
    },
    /// 重试耗尽，附带最终的上下文
    DeliveryFailure {
        ctx: Context,
        reason: String,
    },
    /// 单个插件处理失败（已隔离）
    PluginFailure {
        plugin: String,
        method: EventType,
        ctx_id: String,
        reason: String,
    },
    LoadFailure {
        plugin: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

struct EmitterInner {
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<QueueEvent>,
}

#[derive(Clone)]
pub struct Emitter {
    inner: Arc<EmitterInner>,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STREAM_CAPACITY)
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `capacity` 为事件流的广播缓冲区容量
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(EmitterInner {
                listeners: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                tx,
            }),
        }
    }

    /// 订阅全部通知
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// 仅订阅某一种类的通知
    pub fn on<F>(&self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if event.kind() == kind {
                listener(event);
            }
        })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 返回一个 'static 生命周期的通知流
    pub fn stream(&self) -> BoxStream<'static, QueueEvent> {
        let rx = self.inner.tx.subscribe();
        Box::pin(BroadcastStream::new(rx).filter_map(|r| async move { r.ok() }))
    }

    pub fn emit(&self, event: QueueEvent) {
        // 快照后在锁外调用，回调内可以安全地订阅/退订
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                tracing::error!(kind = ?event.kind(), "emitter listener panicked");
            }
        }

        // 无流订阅者时 send 返回错误，视为非致命并忽略
        let _ = self.inner.tx.send(event);
    }

    pub fn emit_error(&self, error: ErrorEvent) {
        self.emit(QueueEvent::Error(error));
    }
}
