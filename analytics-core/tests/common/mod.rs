#![allow(dead_code)]

use analytics_core::context::{Context, TelemetryEvent};
use analytics_core::plugin::{Plugin, PluginType};
use async_trait::async_trait;
use serde_json::{Map, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// 测试日志：`RUST_LOG=debug cargo test` 查看详细输出
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

pub fn track(name: &str) -> Context {
    Context::new(TelemetryEvent::track(name, Map::new()))
}

pub fn track_with(name: &str, key: &str, value: serde_json::Value) -> Context {
    let mut props = Map::new();
    props.insert(key.into(), value);
    Context::new(TelemetryEvent::track(name, props))
}

/// 记录收到的上下文，可选失败与处理耗时
pub struct Recorder {
    name: &'static str,
    kind: PluginType,
    delay: Duration,
    fail: bool,
    pub seen: Mutex<Vec<Context>>,
    active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl Recorder {
    pub fn destination(name: &'static str) -> Arc<Self> {
        Self::build(name, PluginType::Destination, Duration::ZERO, false)
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Self::build(name, PluginType::Destination, Duration::ZERO, true)
    }

    pub fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
        Self::build(name, PluginType::Destination, delay, false)
    }

    pub fn of(name: &'static str, kind: PluginType) -> Arc<Self> {
        Self::build(name, kind, Duration::ZERO, false)
    }

    fn build(name: &'static str, kind: PluginType, delay: Duration, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            kind,
            delay,
            fail,
            seen: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn events(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| c.event().event().map(str::to_string))
            .collect()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Plugin for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn plugin_type(&self) -> PluginType {
        self.kind
    }

    async fn track(&self, ctx: &mut Context) -> anyhow::Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        self.seen.lock().unwrap().push(ctx.clone());
        if self.fail {
            anyhow::bail!("{} unavailable", self.name);
        }
        ctx.event_mut()
            .properties_mut()
            .insert(format!("seen_by_{}", self.name), json!(true));
        Ok(())
    }
}
