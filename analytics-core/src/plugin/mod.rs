//! 插件（Plugin）
//!
//! 定义管道中的处理单元、其执行阶段（`PluginType`）以及宿主只读接口（`HostApi`）：
//! - `before`：预处理（校验、取消）；
//! - `enrichment`：补充/修改事件负载；
//! - `destination`：终端投递，各目的地相互独立；
//! - `after`：在投递结束后运行，无论成败；
//! - `utility`：旁路能力，只加载，不接收事件。
//!
//! 各事件方法的处理函数均有默认空实现，未实现即直通。
//!
mod host;
mod registry;

pub use host::{HostApi, NoopHost};
pub use registry::{PluginRegistry, PluginSnapshot, PluginState};

use crate::context::{Context, EventType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 插件执行阶段，顺序即管道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Before,
    Enrichment,
    Destination,
    After,
    Utility,
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginType::Before => "before",
            PluginType::Enrichment => "enrichment",
            PluginType::Destination => "destination",
            PluginType::After => "after",
            PluginType::Utility => "utility",
        };
        f.write_str(s)
    }
}

#[async_trait]
pub trait Plugin: Send + Sync {
    /// 插件名称（注册去重、日志与失败标记）
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    fn plugin_type(&self) -> PluginType;

    /// 就绪门：返回 `false` 时本次调度跳过该插件
    fn is_loaded(&self) -> bool {
        true
    }

    /// 每次注册最多调用一次
    async fn load(&self, _ctx: &mut Context, _host: &dyn HostApi) -> anyhow::Result<()> {
        Ok(())
    }

    /// 注销时调用一次
    async fn unload(&self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    async fn track(&self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    async fn identify(&self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    async fn page(&self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    async fn alias(&self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    async fn group(&self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    async fn screen(&self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 按事件方法调用对应的处理函数
pub(crate) async fn invoke(plugin: &dyn Plugin, ctx: &mut Context) -> anyhow::Result<()> {
    match ctx.event_type() {
        EventType::Track => plugin.track(ctx).await,
        EventType::Identify => plugin.identify(ctx).await,
        EventType::Page => plugin.page(ctx).await,
        EventType::Alias => plugin.alias(ctx).await,
        EventType::Group => plugin.group(ctx).await,
        EventType::Screen => plugin.screen(ctx).await,
    }
}
