//! 插件管道的各阶段
//!
//! 失败（`Err` 或 panic）均在此边界被捕获：写入上下文日志、`warn!` 记录并发出 `PluginFailure`。
//! 插件改写了上下文 `id` 或事件类型同样按失败处理，修改被回滚。
//!
use super::Dispatch;
use crate::context::{Context, LogLevel};
use crate::emitter::{Emitter, ErrorEvent};
use crate::plugin::{Plugin, PluginRegistry, PluginSnapshot, invoke};
use futures_util::FutureExt;
use futures_util::future::join_all;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// 单个目的地的失败
#[derive(Debug, Clone)]
pub(crate) struct DestinationFailure {
    pub name: String,
    pub reason: String,
}

/// 调用插件的事件处理函数，`Err`、panic 与身份改写统一转为失败原因
async fn call(plugin: &dyn Plugin, ctx: &mut Context) -> Result<(), String> {
    let id = ctx.id().to_string();
    let message_id = ctx.event().message_id().map(str::to_string);
    let event_type = ctx.event_type();
    match AssertUnwindSafe(invoke(plugin, ctx))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(format!("{e:#}")),
        Err(payload) => return Err(panic_message(payload.as_ref())),
    }

    if ctx.event_type() != event_type {
        return Err(format!("changed event type from {event_type} to {}", ctx.event_type()));
    }
    if ctx.id() != id || ctx.event().message_id() != message_id.as_deref() {
        return Err(format!("replaced context identity {id} with {}", ctx.id()));
    }
    Ok(())
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

fn report_failure(emitter: &Emitter, plugin: &dyn Plugin, ctx: &mut Context, reason: &str) {
    let method = ctx.event_type();
    ctx.log(
        LogLevel::Error,
        format!("plugin {} failed", plugin.name()),
        Some(json!({ "plugin": plugin.name(), "method": method.as_str(), "error": reason })),
    );
    warn!(
        ctx_id = %ctx.id(),
        plugin = plugin.name(),
        method = %method,
        error = reason,
        "plugin handler failed"
    );
    emitter.emit_error(ErrorEvent::PluginFailure {
        plugin: plugin.name().to_string(),
        method,
        ctx_id: ctx.id().to_string(),
        reason: reason.to_string(),
    });
}

/// 顺序执行一组插件（before/enrichment/after）
///
/// 失败的插件其部分修改被回滚，上下文继续交给下一个插件；上下文被取消后立即停止。
pub(crate) async fn run_chain(emitter: &Emitter, plugins: &[Arc<dyn Plugin>], ctx: &mut Context) {
    for plugin in plugins {
        if ctx.is_cancelled() {
            debug!(ctx_id = %ctx.id(), plugin = plugin.name(), "skipping plugin after cancellation");
            break;
        }
        let backup = ctx.clone();
        if let Err(reason) = call(plugin.as_ref(), ctx).await {
            *ctx = backup;
            report_failure(emitter, plugin.as_ref(), ctx, &reason);
        }
    }
}

/// 本次调度选出的目的地
#[derive(Default)]
pub(crate) struct Selection {
    pub targets: Vec<Arc<dyn Plugin>>,
    /// 仍在注册表中但暂未就绪的待重试目的地
    pub waiting: Vec<String>,
}

/// 本次调度的目的地：首次调度按 `integrations` 过滤，重试时只取失败过的目的地
///
/// 重试时只有已注销的目的地会被丢弃；仍注册但未就绪的目的地保持待投递。
pub(crate) fn select_destinations(
    registry: &PluginRegistry,
    snapshot: &PluginSnapshot,
    dispatch: &Dispatch,
) -> Selection {
    let Some(names) = &dispatch.pending else {
        return Selection {
            targets: snapshot
                .destinations
                .iter()
                .filter(|p| dispatch.ctx.event().is_integration_enabled(p.name()))
                .cloned()
                .collect(),
            waiting: Vec::new(),
        };
    };

    let mut selection = Selection::default();
    for name in names {
        if let Some(plugin) = snapshot.destination(name) {
            selection.targets.push(plugin);
        } else if registry.state(name).is_some() {
            debug!(ctx_id = %dispatch.ctx.id(), plugin = %name, "pending destination not ready");
            selection.waiting.push(name.clone());
        } else {
            debug!(ctx_id = %dispatch.ctx.id(), plugin = %name, "pending destination no longer registered");
        }
    }
    selection
}

/// 并发执行目的地，各自处理一份上下文副本
///
/// 副本中新增的日志按目的地顺序合并回原上下文，返回失败的目的地。
pub(crate) async fn run_destinations(
    emitter: &Emitter,
    destinations: &[Arc<dyn Plugin>],
    ctx: &mut Context,
) -> Vec<DestinationFailure> {
    let base = ctx.logs().len();
    let copies: Vec<(Arc<dyn Plugin>, Context)> = destinations
        .iter()
        .map(|plugin| (plugin.clone(), ctx.clone()))
        .collect();

    let results = join_all(copies.into_iter().map(|(plugin, mut copy)| async move {
        let result = call(plugin.as_ref(), &mut copy).await;
        (plugin, copy, result)
    }))
    .await;

    let mut failures = Vec::new();
    for (plugin, copy, result) in results {
        ctx.extend_logs(copy.logs().iter().skip(base).cloned());
        if let Err(reason) = result {
            report_failure(emitter, plugin.as_ref(), ctx, &reason);
            failures.push(DestinationFailure {
                name: plugin.name().to_string(),
                reason,
            });
        }
    }
    failures
}
