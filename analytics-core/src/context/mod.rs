//! 事件上下文（Context）
//!
//! 一次公开调用（identify/track/page/alias/group/screen）对应一个 `Context`：
//! - 身份不可变：`id` 在创建时分配，事件类型判别字段在创建后不可改写；
//! - 注解可变：插件可修改事件负载、追加日志、取消后续处理；
//! - 投递状态：`attempts` 仅由队列维护，`failed_delivery` 在最终失败时写入。
//!
//! `Context` 不持有任何指向队列的引用，队列单向持有上下文。

mod event;
mod log;

pub use event::{EventType, TelemetryEvent};
pub use log::{LogEntry, LogLevel};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// 最终投递失败的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDelivery {
    pub reason: String,
    pub error: String,
}

/// 显式取消的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    id: String,
    event: TelemetryEvent,
    #[serde(default)]
    attempts: u32,
    #[serde(default)]
    logs: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failed_delivery: Option<FailedDelivery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cancellation: Option<Cancellation>,
}

impl Context {
    pub fn new(event: TelemetryEvent) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), event)
    }

    /// 以指定 id 创建（例如调用方已有稳定的消息 id）
    pub fn with_id(id: impl Into<String>, mut event: TelemetryEvent) -> Self {
        let id = id.into();
        event.set_message_id(id.clone());
        Self {
            id,
            event,
            attempts: 0,
            logs: Vec::new(),
            failed_delivery: None,
            cancellation: None,
        }
    }

    /// 系统上下文：传给插件 `load`/`unload`，不进入投递队列
    pub fn system() -> Self {
        Self::new(TelemetryEvent::track("system", Map::new()))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event(&self) -> &TelemetryEvent {
        &self.event
    }

    /// 可变负载；插件整体替换事件或上下文而改变类型或 `id` 时，管道回滚该插件的修改并按失败处理
    pub fn event_mut(&mut self) -> &mut TelemetryEvent {
        &mut self.event
    }

    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
    }

    pub fn is_same(&self, other: &Context) -> bool {
        self.id == other.id
    }

    /// 取消：后续插件不再执行，不重试；重复取消保留第一次的原因
    pub fn cancel(&mut self, reason: impl Into<String>) {
        if self.cancellation.is_some() {
            return;
        }
        let reason = reason.into();
        self.log(LogLevel::Warn, format!("cancelled: {reason}"), None);
        self.cancellation = Some(Cancellation { reason });
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_some()
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub fn failed_delivery(&self) -> Option<&FailedDelivery> {
        self.failed_delivery.as_ref()
    }

    pub(crate) fn set_failed_delivery(&mut self, reason: impl Into<String>, error: impl Into<String>) {
        self.failed_delivery = Some(FailedDelivery {
            reason: reason.into(),
            error: error.into(),
        });
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>, extras: Option<Value>) {
        self.logs.push(LogEntry::new(level, message, extras));
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub(crate) fn extend_logs(&mut self, entries: impl IntoIterator<Item = LogEntry>) {
        self.logs.extend(entries);
    }

    /// 将日志轨迹写入 `tracing`，条目保留在上下文中
    pub fn flush_logs(&self) {
        for entry in &self.logs {
            let extras = entry.extras.as_ref().map(Value::to_string).unwrap_or_default();
            match entry.level {
                LogLevel::Debug => {
                    tracing::debug!(ctx_id = %self.id, extras = %extras, "{}", entry.message)
                }
                LogLevel::Info => {
                    tracing::info!(ctx_id = %self.id, extras = %extras, "{}", entry.message)
                }
                LogLevel::Warn => {
                    tracing::warn!(ctx_id = %self.id, extras = %extras, "{}", entry.message)
                }
                LogLevel::Error => {
                    tracing::error!(ctx_id = %self.id, extras = %extras, "{}", entry.message)
                }
            }
        }
    }
}
