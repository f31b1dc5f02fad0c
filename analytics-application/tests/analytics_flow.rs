use analytics_application::{Analytics, AnalyticsSettings};
use analytics_core::context::Context;
use analytics_core::emitter::{EventKind, QueueEvent};
use analytics_core::persist::{InMemoryStorage, namespace};
use analytics_core::plugin::{HostApi, Plugin, PluginType};
use analytics_core::EventType;
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde_json::{Map, json};
use std::sync::{Arc, Mutex};

/// 在 load 时读取宿主身份，投递时记录事件方法
#[derive(Default)]
struct Warehouse {
    loaded_for: Mutex<Option<String>>,
    methods: Mutex<Vec<EventType>>,
}

impl Warehouse {
    fn record(&self, ctx: &Context) {
        self.methods.lock().unwrap().push(ctx.event_type());
    }
}

#[async_trait]
impl Plugin for Warehouse {
    fn name(&self) -> &str {
        "warehouse"
    }

    fn version(&self) -> &str {
        "2.1.0"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Destination
    }

    async fn load(&self, _ctx: &mut Context, host: &dyn HostApi) -> anyhow::Result<()> {
        *self.loaded_for.lock().unwrap() = Some(host.write_key().to_string());
        Ok(())
    }

    async fn track(&self, ctx: &mut Context) -> anyhow::Result<()> {
        self.record(ctx);
        Ok(())
    }

    async fn identify(&self, ctx: &mut Context) -> anyhow::Result<()> {
        self.record(ctx);
        Ok(())
    }

    async fn page(&self, ctx: &mut Context) -> anyhow::Result<()> {
        self.record(ctx);
        Ok(())
    }

    async fn group(&self, ctx: &mut Context) -> anyhow::Result<()> {
        self.record(ctx);
        Ok(())
    }
}

/// 为每个事件补充 `plan` 特征
struct PlanEnrichment;

#[async_trait]
impl Plugin for PlanEnrichment {
    fn name(&self) -> &str {
        "plan"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Enrichment
    }

    async fn track(&self, ctx: &mut Context) -> anyhow::Result<()> {
        ctx.event_mut()
            .properties_mut()
            .insert("plan".into(), json!("pro"));
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_method_reaches_the_destination() -> AnyResult<()> {
    let analytics = Analytics::new(AnalyticsSettings::builder().write_key("wk-flow").build());
    let warehouse = Arc::new(Warehouse::default());
    let plugins: Vec<Arc<dyn Plugin>> = vec![warehouse.clone(), Arc::new(PlanEnrichment)];
    analytics.register(plugins).await?;
    assert_eq!(warehouse.loaded_for.lock().unwrap().as_deref(), Some("wk-flow"));

    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let d = dispatched.clone();
    analytics.on(EventKind::Dispatch, move |event| {
        if let QueueEvent::Dispatch { method, .. } = event {
            d.lock().unwrap().push(*method);
        }
    });

    let mut traits = Map::new();
    traits.insert("email".into(), json!("ada@example.com"));
    analytics.identify(Some("ada".into()), traits).await?;
    let tracked = analytics.track("Upgraded", Map::new()).await?;
    analytics.page(Some("Docs"), "Install", Map::new()).await?;
    analytics.group("acme", Map::new()).await?;
    analytics.shutdown().await?;

    assert_eq!(tracked.event().properties()["plan"], json!("pro"));
    assert_eq!(tracked.event().user_id(), Some("ada"));
    let expected = [
        EventType::Identify,
        EventType::Track,
        EventType::Page,
        EventType::Group,
    ];
    assert_eq!(*warehouse.methods.lock().unwrap(), expected);
    assert_eq!(*dispatched.lock().unwrap(), expected);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn durable_client_persists_under_write_key_namespace() -> AnyResult<()> {
    let storage = Arc::new(InMemoryStorage::new());
    let analytics = Analytics::new(
        AnalyticsSettings::builder()
            .write_key("wk-durable")
            .queue_id("primary")
            .storage(storage.clone())
            .build(),
    );

    let pending = analytics
        .submit(analytics_core::TelemetryEvent::track("Queued", Map::new()))
        .await?;
    let ctx = pending.wait().await?;
    assert!(ctx.failed_delivery().is_none());
    analytics.flush().await?;
    assert!(storage.is_empty(&namespace("wk-durable", "primary")));
    Ok(())
}

#[tokio::test]
async fn reset_rotates_the_anonymous_id_on_later_events() -> AnyResult<()> {
    let analytics = Analytics::new(
        AnalyticsSettings::builder()
            .write_key("wk")
            .anonymous_id("anon-before")
            .build(),
    );
    let before = analytics.track("A", Map::new()).await?;
    analytics.reset();
    let after = analytics.track("B", Map::new()).await?;
    assert_eq!(before.event().anonymous_id(), Some("anon-before"));
    assert_ne!(after.event().anonymous_id(), Some("anon-before"));
    Ok(())
}
