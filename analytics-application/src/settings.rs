use analytics_core::eventing::EventQueueConfig;
use analytics_core::persist::DurableStorage;
use bon::Builder;
use std::sync::Arc;

/// 客户端配置
///
/// ```rust
/// use analytics_application::settings::AnalyticsSettings;
///
/// let settings = AnalyticsSettings::builder()
///     .write_key("wk-123")
///     .anonymous_id("anon-1")
///     .build();
/// assert_eq!(settings.queue_id, "event-queue");
/// ```
#[derive(Builder, Clone)]
pub struct AnalyticsSettings {
    /// 数据源写入密钥，也是持久化命名空间的前缀
    #[builder(into)]
    pub write_key: String,
    #[builder(into, default = "event-queue".to_string())]
    pub queue_id: String,
    #[builder(default)]
    pub queue: EventQueueConfig,
    /// 提供时未完成的事件跨重启保留
    pub storage: Option<Arc<dyn DurableStorage>>,
    /// 初始匿名 id，缺省时随机生成
    #[builder(into)]
    pub anonymous_id: Option<String>,
}
