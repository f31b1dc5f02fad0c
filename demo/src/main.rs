use analytics_application::{Analytics, AnalyticsSettings};
use analytics_core::context::{Context, LogLevel};
use analytics_core::emitter::{ErrorEvent, EventKind, QueueEvent};
use analytics_core::eventing::EventQueueConfig;
use analytics_core::persist::JsonFileStorage;
use analytics_core::plugin::{HostApi, Plugin, PluginType};
use analytics_core::queue::RetryPolicy;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// 拒绝缺少 `sku` 的 "Order Completed"
struct OrderValidator;

#[async_trait]
impl Plugin for OrderValidator {
    fn name(&self) -> &str {
        "order-validator"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Before
    }

    async fn track(&self, ctx: &mut Context) -> anyhow::Result<()> {
        let is_order = ctx.event().event() == Some("Order Completed");
        if is_order && !ctx.event().properties().contains_key("sku") {
            ctx.cancel("order without sku");
        }
        Ok(())
    }
}

/// 在 load 时记下写入密钥，之后为每个事件补充来源信息
struct SourceEnrichment {
    source: std::sync::OnceLock<String>,
}

#[async_trait]
impl Plugin for SourceEnrichment {
    fn name(&self) -> &str {
        "source"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Enrichment
    }

    async fn load(&self, _ctx: &mut Context, host: &dyn HostApi) -> anyhow::Result<()> {
        let _ = self.source.set(host.write_key().to_string());
        Ok(())
    }

    async fn track(&self, ctx: &mut Context) -> anyhow::Result<()> {
        let source = self.source.get().cloned().unwrap_or_default();
        ctx.event_mut()
            .context_mut()
            .insert("source".into(), json!({ "write_key": source, "host": "demo" }));
        Ok(())
    }
}

/// 打印到日志的目的地
struct Console;

#[async_trait]
impl Plugin for Console {
    fn name(&self) -> &str {
        "console"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Destination
    }

    async fn track(&self, ctx: &mut Context) -> anyhow::Result<()> {
        info!(
            ctx_id = %ctx.id(),
            event = ctx.event().event().unwrap_or_default(),
            properties = %serde_json::Value::Object(ctx.event().properties().clone()),
            "console received track"
        );
        ctx.log(LogLevel::Info, "printed to console", None);
        Ok(())
    }

    async fn identify(&self, ctx: &mut Context) -> anyhow::Result<()> {
        info!(ctx_id = %ctx.id(), user_id = ctx.event().user_id().unwrap_or_default(), "console received identify");
        Ok(())
    }
}

/// 前两次调用失败的目的地，演示退避重试
struct FlakyCollector {
    calls: AtomicU32,
}

#[async_trait]
impl Plugin for FlakyCollector {
    fn name(&self) -> &str {
        "flaky-collector"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Destination
    }

    async fn track(&self, ctx: &mut Context) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= 2 {
            anyhow::bail!("collector returned 503 (call {call})");
        }
        info!(ctx_id = %ctx.id(), attempts = ctx.attempts(), "collector accepted event");
        Ok(())
    }
}

fn props(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let dir = std::env::temp_dir().join("analytics-demo");
    let analytics = Analytics::new(
        AnalyticsSettings::builder()
            .write_key("demo-write-key")
            .storage(Arc::new(JsonFileStorage::new(&dir)))
            .queue(EventQueueConfig {
                max_concurrency: 4,
                retry: RetryPolicy {
                    max_attempts: 4,
                    base_delay: Duration::from_millis(100),
                    max_delay: Duration::from_secs(2),
                },
                ..Default::default()
            })
            .build(),
    );

    analytics.on(EventKind::Error, |event| {
        if let QueueEvent::Error(error) = event {
            match error {
                ErrorEvent::DeliveryFailure { ctx, reason } => {
                    warn!(ctx_id = %ctx.id(), reason = %reason, "delivery failed")
                }
                other => warn!(error = ?other, "queue error"),
            }
        }
    });

    let plugins: Vec<Arc<dyn Plugin>> = vec![
        Arc::new(OrderValidator),
        Arc::new(SourceEnrichment {
            source: std::sync::OnceLock::new(),
        }),
        Arc::new(Console),
        Arc::new(FlakyCollector {
            calls: AtomicU32::new(0),
        }),
    ];
    analytics.register(plugins).await?;

    analytics
        .identify(Some("user-42".into()), props(&[("plan", json!("trial"))]))
        .await?;

    let rejected = analytics
        .track("Order Completed", props(&[("total", json!(30))]))
        .await?;
    info!(
        cancelled = rejected.is_cancelled(),
        reason = rejected.cancellation().map(|c| c.reason.as_str()).unwrap_or_default(),
        "invalid order"
    );

    let delivered = analytics
        .track(
            "Order Completed",
            props(&[("total", json!(30)), ("sku", json!("SKU-1"))]),
        )
        .await?;
    info!(
        attempts = delivered.attempts(),
        failed = delivered.failed_delivery().is_some(),
        logs = delivered.logs().len(),
        "order delivered"
    );
    delivered.flush_logs();

    analytics.shutdown().await?;
    Ok(())
}
