//! 客户端入口（Analytics）
//!
//! 每个公开调用创建一个 `Context` 并交给事件队列：
//! - 身份字段由当前 `User` 填充，`context.library` 记录库名与版本；
//! - 调用返回终结后的 `Context`（投递成功、最终失败或被取消）；
//! - 引擎自身的基础设施错误（存储写入失败、队列已关闭）以 `AppError::Core` 返回。
//!
use crate::error::{AppError, AppResult};
use crate::settings::AnalyticsSettings;
use crate::user::User;
use analytics_core::context::{Context, TelemetryEvent};
use analytics_core::emitter::{Emitter, EventKind, QueueEvent, SubscriptionId};
use analytics_core::eventing::{EventQueue, PendingDispatch};
use analytics_core::plugin::Plugin;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};

const LIBRARY_NAME: &str = env!("CARGO_PKG_NAME");
const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct Analytics {
    queue: EventQueue,
    user: Arc<User>,
}

impl Analytics {
    pub fn new(settings: AnalyticsSettings) -> Self {
        let user = Arc::new(User::new(settings.write_key.clone(), settings.anonymous_id));
        let queue = EventQueue::builder()
            .host(user.clone())
            .maybe_storage(settings.storage)
            .queue_id(settings.queue_id)
            .config(settings.queue)
            .build();
        info!(write_key = %settings.write_key, "analytics client created");
        Self { queue, user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn emitter(&self) -> &Emitter {
        self.queue.emitter()
    }

    pub async fn register(&self, plugins: Vec<Arc<dyn Plugin>>) -> AppResult<()> {
        for plugin in plugins {
            self.queue.register(plugin).await?;
        }
        Ok(())
    }

    pub async fn deregister(&self, names: &[&str]) -> AppResult<()> {
        for name in names {
            self.queue.deregister(name).await?;
        }
        Ok(())
    }

    /// 识别用户：更新本地身份后发送 identify，事件携带合并后的全部特征
    pub async fn identify(
        &self,
        user_id: Option<String>,
        traits: Map<String, Value>,
    ) -> AppResult<Context> {
        if user_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(AppError::Validation("user id must not be blank".into()));
        }
        let traits = self.user.identify(user_id, traits);
        let event = TelemetryEvent::builder()
            .event_type(analytics_core::EventType::Identify)
            .traits(traits)
            .build();
        self.dispatch(event).await
    }

    pub async fn track(&self, event: &str, properties: Map<String, Value>) -> AppResult<Context> {
        if event.trim().is_empty() {
            return Err(AppError::Validation("track event name must not be blank".into()));
        }
        self.dispatch(TelemetryEvent::track(event, properties)).await
    }

    pub async fn page(
        &self,
        category: Option<&str>,
        name: &str,
        properties: Map<String, Value>,
    ) -> AppResult<Context> {
        let event = TelemetryEvent::builder()
            .event_type(analytics_core::EventType::Page)
            .name(name)
            .maybe_category(category)
            .properties(properties)
            .build();
        self.dispatch(event).await
    }

    pub async fn screen(&self, name: &str, properties: Map<String, Value>) -> AppResult<Context> {
        self.dispatch(TelemetryEvent::screen(name, properties)).await
    }

    /// 将 `from`（缺省为当前用户 id 或匿名 id）关联到 `to`
    pub async fn alias(&self, to: &str, from: Option<&str>) -> AppResult<Context> {
        if to.trim().is_empty() {
            return Err(AppError::Validation("alias target must not be blank".into()));
        }
        let previous = match from {
            Some(from) => from.to_string(),
            None => self.user.id().unwrap_or_else(|| self.user.anonymous_id()),
        };
        self.dispatch(TelemetryEvent::alias(to, previous)).await
    }

    pub async fn group(&self, group_id: &str, traits: Map<String, Value>) -> AppResult<Context> {
        if group_id.trim().is_empty() {
            return Err(AppError::Validation("group id must not be blank".into()));
        }
        self.dispatch(TelemetryEvent::group(group_id, traits)).await
    }

    /// 发送预先构建的事件并等待终结
    pub async fn dispatch(&self, event: TelemetryEvent) -> AppResult<Context> {
        let pending = self.submit(event).await?;
        Ok(pending.wait().await?)
    }

    /// 入队后立即返回，适合不关心结果的调用方；配合 `flush` 使用
    pub async fn submit(&self, event: TelemetryEvent) -> AppResult<PendingDispatch> {
        let ctx = Context::new(self.stamp(event));
        debug!(ctx_id = %ctx.id(), method = %ctx.event_type(), "submitting event");
        Ok(self.queue.submit(ctx).await?)
    }

    pub async fn flush(&self) -> AppResult<()> {
        Ok(self.queue.flush().await?)
    }

    pub async fn shutdown(&self) -> AppResult<()> {
        Ok(self.queue.shutdown().await?)
    }

    /// 登出当前用户
    pub fn reset(&self) {
        self.user.reset();
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.queue.emitter().on(kind, listener)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.queue.emitter().unsubscribe(id)
    }

    /// 填充身份与库信息；调用方已显式设置的字段保持不变
    fn stamp(&self, mut event: TelemetryEvent) -> TelemetryEvent {
        if event.user_id().is_none() {
            event.set_user_id(self.user.id());
        }
        if event.anonymous_id().is_none() {
            event.set_anonymous_id(Some(self.user.anonymous_id()));
        }
        event
            .context_mut()
            .entry("library")
            .or_insert_with(|| json!({ "name": LIBRARY_NAME, "version": LIBRARY_VERSION }));
        event
    }
}
