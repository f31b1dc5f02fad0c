//! 事件队列（EventQueue）
//!
//! 编排“入队 → 调度 → 插件管道 → 重试/终结”的长驻任务：
//! - 单个驱动任务在新入队、条目结束或最早退避到期时被唤醒，从调度队列取出就绪条目，
//!   通过 `TaskGroup` 为每个条目启动一个 worker；
//! - worker 依次执行 before → enrichment → destinations（并发）→ after；
//! - 目的地失败时只带着失败的目的地重新入队，耗尽后记录 `failed_delivery`；
//! - 首次使用时先从持久化存储恢复未完成条目，再接收新条目。
//!
use super::pipeline::{self, DestinationFailure};
use super::Dispatch;
use crate::context::{Context, LogLevel};
use crate::emitter::{Emitter, ErrorEvent, QueueEvent};
use crate::error::{CoreError, CoreResult as Result};
use crate::persist::{self, DurableStorage};
use crate::plugin::{HostApi, Plugin, PluginRegistry, PluginState};
use crate::queue::{DispatchQueue, PersistedQueue, PriorityQueue, QueueEntry, RetryOutcome, RetryPolicy};
use crate::task_group::TaskGroup;
use bon::bon;
use dashmap::DashMap;
use futures_util::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, Notify, OnceCell, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

const DEFAULT_QUEUE_ID: &str = "event-queue";

/// 事件队列配置
#[derive(Clone, Debug)]
pub struct EventQueueConfig {
    /// 同时处于管道中的上下文上限
    pub max_concurrency: usize,
    /// `dispatch` 使用的默认优先级（0 最高）
    pub default_priority: u8,
    pub retry: RetryPolicy,
}

impl Default for EventQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            default_priority: 1,
            retry: RetryPolicy::default(),
        }
    }
}

struct Shared {
    registry: PluginRegistry,
    emitter: Emitter,
    host: Arc<dyn HostApi>,
    queue: Mutex<Box<dyn DispatchQueue<Dispatch>>>,
    config: EventQueueConfig,
    notify: Notify,
    tasks: TaskGroup,
    /// 已入队但尚未终结的条目数（含退避中的条目）
    outstanding: watch::Sender<usize>,
    waiters: DashMap<String, Waiters>,
    token: CancellationToken,
    started: OnceCell<()>,
    driver: StdMutex<Option<JoinHandle<()>>>,
}

/// 事件队列句柄，可廉价克隆；最后一个句柄被丢弃时驱动任务停止
#[derive(Clone)]
pub struct EventQueue {
    shared: Arc<Shared>,
    _guard: Arc<DropGuard>,
}

/// 已入队、等待终结的调度
#[derive(Debug)]
pub struct PendingDispatch {
    ctx_id: String,
    rx: oneshot::Receiver<Context>,
}

impl PendingDispatch {
    pub fn ctx_id(&self) -> &str {
        &self.ctx_id
    }

    /// 等待上下文终结（投递成功、最终失败或被取消）
    pub async fn wait(self) -> Result<Context> {
        self.rx
            .await
            .map_err(|_| CoreError::DispatchDropped { ctx_id: self.ctx_id })
    }
}

#[bon]
impl EventQueue {
    /// 创建事件队列
    ///
    /// 提供 `storage` 时使用持久化队列，命名空间为 `"{write_key}:{queue_id}"`。
    #[builder]
    pub fn new(
        host: Arc<dyn HostApi>,
        #[builder(default)] emitter: Emitter,
        storage: Option<Arc<dyn DurableStorage>>,
        #[builder(into, default = DEFAULT_QUEUE_ID.to_string())] queue_id: String,
        #[builder(default)] config: EventQueueConfig,
    ) -> Self {
        let queue: Box<dyn DispatchQueue<Dispatch>> = match storage {
            Some(storage) => Box::new(PersistedQueue::new(
                storage,
                persist::namespace(host.write_key(), &queue_id),
                config.max_concurrency,
                config.retry,
            )),
            None => Box::new(PriorityQueue::new(config.max_concurrency, config.retry)),
        };
        let (outstanding, _rx) = watch::channel(0);
        let token = CancellationToken::new();

        Self {
            _guard: Arc::new(token.clone().drop_guard()),
            shared: Arc::new(Shared {
                registry: PluginRegistry::new(),
                emitter,
                host,
                queue: Mutex::new(queue),
                config,
                notify: Notify::new(),
                tasks: TaskGroup::new(),
                outstanding,
                waiters: DashMap::new(),
                token,
                started: OnceCell::new(),
                driver: StdMutex::new(None),
            }),
        }
    }
}

impl EventQueue {
    pub fn emitter(&self) -> &Emitter {
        &self.shared.emitter
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.shared.registry
    }

    pub fn config(&self) -> &EventQueueConfig {
        &self.shared.config
    }

    /// 尚未终结的条目数
    pub fn outstanding(&self) -> usize {
        *self.shared.outstanding.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// 注册插件并等待其加载
    ///
    /// 加载失败不返回错误：插件标记为 `Failed`、发出 `LoadFailure`，之后不参与调度。
    pub async fn register(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let name = plugin.name().to_string();
        self.shared.registry.insert(plugin.clone())?;

        let mut ctx = Context::system();
        let loaded = AssertUnwindSafe(plugin.load(&mut ctx, self.shared.host.as_ref()))
            .catch_unwind()
            .await;
        let failure = match loaded {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{e:#}")),
            Err(payload) => Some(pipeline::panic_message(payload.as_ref())),
        };

        match failure {
            None => {
                self.shared.registry.set_state(&name, PluginState::Ready);
                info!(plugin = %name, version = plugin.version(), plugin_type = %plugin.plugin_type(), "plugin registered");
                self.shared.emitter.emit(QueueEvent::Register {
                    plugin: name,
                    version: plugin.version().to_string(),
                    plugin_type: plugin.plugin_type(),
                });
            }
            Some(reason) => {
                self.shared.registry.set_state(&name, PluginState::Failed);
                warn!(plugin = %name, error = %reason, "plugin failed to load");
                self.shared
                    .emitter
                    .emit_error(ErrorEvent::LoadFailure { plugin: name, reason });
            }
        }
        Ok(())
    }

    /// 注销插件：之后的调度不再包含它，已持有快照的调度仍会用它完成
    pub async fn deregister(&self, name: &str) -> Result<()> {
        let plugin = self.shared.registry.remove(name)?;

        let mut ctx = Context::system();
        let unloaded = AssertUnwindSafe(plugin.unload(&mut ctx)).catch_unwind().await;
        let failure = match unloaded {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{e:#}")),
            Err(payload) => Some(pipeline::panic_message(payload.as_ref())),
        };
        if let Some(reason) = failure {
            warn!(plugin = name, error = %reason, "plugin failed to unload");
            self.shared.emitter.emit_error(ErrorEvent::Unknown {
                reason: format!("unload {name}: {reason}"),
            });
        }

        info!(plugin = name, "plugin deregistered");
        self.shared.emitter.emit(QueueEvent::Deregister {
            plugin: name.to_string(),
        });
        Ok(())
    }

    /// 以默认优先级调度并等待终结
    pub async fn dispatch(&self, ctx: Context) -> Result<Context> {
        self.submit(ctx).await?.wait().await
    }

    pub async fn dispatch_with_priority(&self, ctx: Context, priority: u8) -> Result<Context> {
        self.submit_with_priority(ctx, priority).await?.wait().await
    }

    /// 入队后立即返回；持久化队列在写入存储之后才返回
    pub async fn submit(&self, ctx: Context) -> Result<PendingDispatch> {
        self.submit_with_priority(ctx, self.shared.config.default_priority)
            .await
    }

    /// 同一上下文重复入队时不会重复投递，返回的句柄等待已有调度的结果
    pub async fn submit_with_priority(&self, ctx: Context, priority: u8) -> Result<PendingDispatch> {
        self.start().await?;
        if self.is_closed() {
            return Err(CoreError::QueueClosed);
        }

        let ctx_id = ctx.id().to_string();
        let (tx, rx) = oneshot::channel();

        // 入队与登记等待者在同一把锁内完成，与终结时的释放互斥
        let pushed = {
            let mut queue = self.shared.queue.lock().await;
            let pushed = queue.push(Dispatch::new(ctx), priority).await;
            if let Ok(true) = pushed {
                self.shared.outstanding.send_modify(|n| *n += 1);
            }
            if pushed.is_ok() {
                self.shared.waiters.entry(ctx_id.clone()).or_default().push(tx);
            }
            pushed
        };

        match pushed {
            Ok(true) => {
                debug!(ctx_id = %ctx_id, priority, "context queued");
                self.shared.notify.notify_one();
            }
            Ok(false) => debug!(ctx_id = %ctx_id, "context already queued, awaiting its delivery"),
            Err(e) => {
                error!(ctx_id = %ctx_id, error = %e, "failed to queue context");
                return Err(e);
            }
        }

        Ok(PendingDispatch { ctx_id, rx })
    }

    /// 等待所有已入队的条目（含退避中与恢复的条目）终结
    pub async fn flush(&self) -> Result<()> {
        self.start().await?;
        let mut outstanding = self.shared.outstanding.subscribe();
        tokio::select! {
            _ = outstanding.wait_for(|n| *n == 0) => {}
            _ = self.shared.token.cancelled() => {}
        }
        self.shared.tasks.done().await;
        Ok(())
    }

    /// 排空后停止驱动任务
    pub async fn shutdown(&self) -> Result<()> {
        self.flush().await?;
        self.close().await;
        Ok(())
    }

    /// 立即停止驱动任务；正在执行的处理不会被中断，未完成的持久化条目留待下次启动
    pub async fn close(&self) {
        self.shared.token.cancel();
        let driver = self
            .shared
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(driver) = driver {
            let _ = driver.await;
        }
        info!(outstanding = self.outstanding(), "event queue closed");
    }

    async fn start(&self) -> Result<()> {
        self.shared
            .started
            .get_or_try_init(|| async {
                {
                    let mut queue = self.shared.queue.lock().await;
                    let restored = queue.restore().await?;
                    if restored > 0 {
                        self.shared.outstanding.send_modify(|n| *n += restored);
                    }
                }
                let driver = tokio::spawn(drive(self.shared.clone()));
                *self
                    .shared
                    .driver
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(driver);
                Ok::<_, CoreError>(())
            })
            .await?;
        Ok(())
    }
}

/// 驱动循环：取出所有就绪条目，再等待唤醒
async fn drive(shared: Arc<Shared>) {
    let max_concurrency = shared.config.max_concurrency.max(1);
    loop {
        let wake_at = {
            let mut queue = shared.queue.lock().await;
            while let Some(entry) = queue.pop() {
                shared.tasks.run(process(shared.clone(), entry));
            }
            // 名额已满时等待条目结束的通知，而不是退避到期
            if queue.in_flight() >= max_concurrency {
                None
            } else {
                queue.next_ready_at()
            }
        };

        tokio::select! {
            _ = shared.token.cancelled() => break,
            _ = shared.notify.notified() => {}
            _ = sleep_until_some(wake_at) => {}
        }
    }
    debug!("event queue driver stopped");
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// 处理一个条目直至其结束或重新排队
///
/// 队列 key 与等待者均以出队时的上下文 id 为准。
async fn process(shared: Arc<Shared>, mut entry: QueueEntry<Dispatch>) {
    let key = entry.key().to_string();
    let snapshot = shared.registry.snapshot();
    let attempt = entry.attempts() + 1;
    let dispatch = entry.item_mut();
    dispatch.ctx.set_attempts(attempt);

    if dispatch.pending.is_none() {
        pipeline::run_chain(&shared.emitter, &snapshot.before, &mut dispatch.ctx).await;
        pipeline::run_chain(&shared.emitter, &snapshot.enrichment, &mut dispatch.ctx).await;

        if dispatch.ctx.is_cancelled() {
            debug!(ctx_id = %key, "context cancelled");
            let waiters = shared.settle(&key).await;
            shared.resolve(entry.into_item().into_context(), waiters);
            return;
        }
    }

    let selection = pipeline::select_destinations(&shared.registry, &snapshot, dispatch);
    let mut failures =
        pipeline::run_destinations(&shared.emitter, &selection.targets, &mut dispatch.ctx).await;
    failures.extend(selection.waiting.into_iter().map(|name| DestinationFailure {
        name,
        reason: "destination not ready".to_string(),
    }));

    if failures.is_empty() {
        let mut ctx = entry.into_item().into_context();
        pipeline::run_chain(&shared.emitter, &snapshot.after, &mut ctx).await;
        debug!(ctx_id = %key, attempts = attempt, "context delivered");
        let waiters = shared.settle(&key).await;
        shared.resolve(ctx, waiters);
        return;
    }

    let error = describe(&failures);
    dispatch.pending = Some(failures.into_iter().map(|f| f.name).collect());

    let (outcome, waiters) = {
        let mut queue = shared.queue.lock().await;
        let outcome = queue.update_attempts(entry).await;
        let waiters = match &outcome {
            RetryOutcome::Exhausted(_) => shared.take_waiters(&key),
            RetryOutcome::Scheduled { .. } => Vec::new(),
        };
        (outcome, waiters)
    };
    match outcome {
        RetryOutcome::Scheduled { attempts, delay } => {
            info!(
                ctx_id = %key,
                attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "delivery failed, retry scheduled"
            );
            shared.notify.notify_one();
        }
        RetryOutcome::Exhausted(entry) => {
            let attempts = entry.attempts();
            let mut ctx = entry.into_item().into_context();
            let reason = format!("delivery failed after {attempts} attempts");
            ctx.log(LogLevel::Error, reason.clone(), Some(json!({ "error": error })));
            ctx.set_failed_delivery(reason.clone(), error.clone());
            pipeline::run_chain(&shared.emitter, &snapshot.after, &mut ctx).await;

            error!(ctx_id = %key, attempts, error = %error, "context delivery failed");
            shared.emitter.emit_error(ErrorEvent::DeliveryFailure {
                ctx: ctx.clone(),
                reason: format!("{reason}: {error}"),
            });
            shared.notify.notify_one();
            shared.resolve(ctx, waiters);
        }
    }
}

fn describe(failures: &[DestinationFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.name, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

type Waiters = Vec<oneshot::Sender<Context>>;

impl Shared {
    /// 释放 key 并取走等待者；两者在队列锁内完成，之后重复提交的同一上下文会重新入队
    async fn settle(&self, key: &str) -> Waiters {
        let waiters = {
            let mut queue = self.queue.lock().await;
            queue.settle(key).await;
            self.take_waiters(key)
        };
        self.notify.notify_one();
        waiters
    }

    fn take_waiters(&self, key: &str) -> Waiters {
        self.waiters.remove(key).map(|(_, w)| w).unwrap_or_default()
    }

    /// 终结：发出 `Dispatch` 通知、唤醒等待者、递减未终结计数
    fn resolve(&self, ctx: Context, waiters: Waiters) {
        self.emitter.emit(QueueEvent::Dispatch {
            method: ctx.event_type(),
            ctx: ctx.clone(),
        });
        for waiter in waiters {
            let _ = waiter.send(ctx.clone());
        }
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TelemetryEvent;
    use crate::plugin::{NoopHost, PluginType};
    use async_trait::async_trait;
    use serde_json::Map;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counter {
        name: &'static str,
        kind: PluginType,
        hits: AtomicUsize,
    }

    impl Counter {
        fn new(name: &'static str, kind: PluginType) -> Arc<Self> {
            Arc::new(Self {
                name,
                kind,
                hits: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Plugin for Counter {
        fn name(&self) -> &str {
            self.name
        }
        fn plugin_type(&self) -> PluginType {
            self.kind
        }
        async fn track(&self, _ctx: &mut Context) -> anyhow::Result<()> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingLoad;

    #[async_trait]
    impl Plugin for FailingLoad {
        fn name(&self) -> &str {
            "needs-config"
        }
        fn plugin_type(&self) -> PluginType {
            PluginType::Destination
        }
        async fn load(&self, _ctx: &mut Context, _host: &dyn HostApi) -> anyhow::Result<()> {
            anyhow::bail!("missing api key")
        }
    }

    /// 整体替换上下文的 enrichment 插件
    struct SwapContext;

    #[async_trait]
    impl Plugin for SwapContext {
        fn name(&self) -> &str {
            "swap"
        }
        fn plugin_type(&self) -> PluginType {
            PluginType::Enrichment
        }
        async fn track(&self, ctx: &mut Context) -> anyhow::Result<()> {
            *ctx = Context::new(TelemetryEvent::page("Home", Map::new()));
            Ok(())
        }
    }

    /// 第一次调用失败，之后报告未就绪
    struct GoesOffline {
        hits: AtomicUsize,
        offline: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Plugin for GoesOffline {
        fn name(&self) -> &str {
            "offline"
        }
        fn plugin_type(&self) -> PluginType {
            PluginType::Destination
        }
        fn is_loaded(&self) -> bool {
            !self.offline.load(Ordering::SeqCst)
        }
        async fn track(&self, _ctx: &mut Context) -> anyhow::Result<()> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            self.offline.store(true, Ordering::SeqCst);
            anyhow::bail!("connection reset")
        }
    }

    fn queue() -> EventQueue {
        EventQueue::builder()
            .host(Arc::new(NoopHost::new("wk")))
            .config(EventQueueConfig {
                retry: RetryPolicy {
                    max_attempts: 2,
                    base_delay: Duration::from_millis(5),
                    max_delay: Duration::from_millis(10),
                },
                ..Default::default()
            })
            .build()
    }

    fn track() -> Context {
        Context::new(TelemetryEvent::track("Clicked", Map::new()))
    }

    #[tokio::test]
    async fn dispatch_runs_all_stages_and_emits_dispatch() {
        let q = queue();
        let before = Counter::new("before", PluginType::Before);
        let dest = Counter::new("dest", PluginType::Destination);
        let after = Counter::new("after", PluginType::After);
        for p in [before.clone(), dest.clone(), after.clone()] {
            q.register(p).await.unwrap();
        }
        let dispatched = Arc::new(AtomicUsize::new(0));
        let d = dispatched.clone();
        q.emitter().on(crate::emitter::EventKind::Dispatch, move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        });

        let ctx = q.dispatch(track()).await.unwrap();
        assert_eq!(ctx.attempts(), 1);
        assert!(ctx.failed_delivery().is_none());
        for p in [&before, &dest, &after] {
            assert_eq!(p.hits.load(Ordering::SeqCst), 1);
        }
        assert_eq!(dispatched.load(Ordering::SeqCst), 1);
        assert_eq!(q.outstanding(), 0);
    }

    #[tokio::test]
    async fn load_failure_is_isolated() {
        let q = queue();
        let errors = Arc::new(AtomicUsize::new(0));
        let e = errors.clone();
        q.emitter().on(crate::emitter::EventKind::Error, move |event| {
            if let QueueEvent::Error(ErrorEvent::LoadFailure { plugin, .. }) = event {
                assert_eq!(plugin, "needs-config");
                e.fetch_add(1, Ordering::SeqCst);
            }
        });
        q.register(Arc::new(FailingLoad)).await.unwrap();
        let dest = Counter::new("dest", PluginType::Destination);
        q.register(dest.clone()).await.unwrap();

        let ctx = q.dispatch(track()).await.unwrap();
        assert!(ctx.failed_delivery().is_none());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(q.registry().state("needs-config"), Some(PluginState::Failed));
        assert_eq!(dest.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let q = queue();
        q.register(Counter::new("dest", PluginType::Destination)).await.unwrap();
        let err = q
            .register(Counter::new("dest", PluginType::After))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PluginAlreadyRegistered { .. }));
    }

    #[tokio::test]
    async fn deregistered_plugin_sees_no_new_contexts() {
        let q = queue();
        let dest = Counter::new("dest", PluginType::Destination);
        q.register(dest.clone()).await.unwrap();
        q.dispatch(track()).await.unwrap();
        q.deregister("dest").await.unwrap();
        q.dispatch(track()).await.unwrap();
        assert_eq!(dest.hits.load(Ordering::SeqCst), 1);
        assert!(matches!(
            q.deregister("dest").await,
            Err(CoreError::PluginNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn same_context_dispatched_twice_is_delivered_once() {
        let q = queue();
        let dest = Counter::new("dest", PluginType::Destination);
        q.register(dest.clone()).await.unwrap();

        let ctx = track();
        let first = q.submit(ctx.clone()).await.unwrap();
        let second = q.submit(ctx.clone()).await.unwrap();
        let (a, b) = tokio::join!(first.wait(), second.wait());
        assert!(a.unwrap().is_same(&ctx));
        assert!(b.unwrap().is_same(&ctx));
        q.flush().await.unwrap();
        assert!(dest.hits.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn closed_queue_rejects_new_work() {
        let q = queue();
        q.shutdown().await.unwrap();
        assert!(q.is_closed());
        assert!(matches!(
            q.dispatch(track()).await,
            Err(CoreError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn replacing_the_context_still_resolves_the_caller() {
        let q = queue();
        q.register(Arc::new(SwapContext)).await.unwrap();
        let dest = Counter::new("dest", PluginType::Destination);
        q.register(dest.clone()).await.unwrap();

        let ctx = track();
        let done = tokio::time::timeout(Duration::from_secs(2), q.dispatch(ctx.clone()))
            .await
            .expect("dispatch must resolve")
            .unwrap();
        assert!(done.is_same(&ctx));
        assert_eq!(done.event_type(), crate::context::EventType::Track);
        assert_eq!(dest.hits.load(Ordering::SeqCst), 1);
        assert_eq!(q.outstanding(), 0);

        // key 已释放，同一上下文可再次投递
        q.dispatch(ctx).await.unwrap();
        assert_eq!(dest.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unready_pending_destination_is_not_reported_as_delivered() {
        let q = queue();
        let dest = Arc::new(GoesOffline {
            hits: AtomicUsize::new(0),
            offline: Default::default(),
        });
        q.register(dest.clone()).await.unwrap();

        let ctx = tokio::time::timeout(Duration::from_secs(2), q.dispatch(track()))
            .await
            .expect("dispatch must resolve")
            .unwrap();
        assert_eq!(dest.hits.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.attempts(), 2);
        let failed = ctx.failed_delivery().expect("delivery must be reported as failed");
        assert!(failed.error.contains("offline: destination not ready"));
    }

    #[tokio::test]
    async fn resubmitting_a_resolved_context_delivers_it_again() {
        let q = queue();
        let dest = Counter::new("dest", PluginType::Destination);
        q.register(dest.clone()).await.unwrap();

        let ctx = track();
        let first = q.dispatch(ctx.clone()).await.unwrap();
        let second = q.dispatch(ctx.clone()).await.unwrap();
        assert!(first.is_same(&second));
        assert_eq!(dest.hits.load(Ordering::SeqCst), 2);
        assert_eq!(q.outstanding(), 0);
    }
}
