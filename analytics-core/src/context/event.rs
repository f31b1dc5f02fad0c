use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// 事件方法（类型判别字段），创建后不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Identify,
    Track,
    Page,
    Alias,
    Group,
    Screen,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::Identify,
        EventType::Track,
        EventType::Page,
        EventType::Alias,
        EventType::Group,
        EventType::Screen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Identify => "identify",
            EventType::Track => "track",
            EventType::Page => "page",
            EventType::Alias => "alias",
            EventType::Group => "group",
            EventType::Screen => "screen",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// 遥测事件负载
///
/// 类型判别字段 `type` 只能在构造时指定；插件可以修改负载字段（身份、属性、特征等），
/// 但不能改写事件类型。
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// 事件方法
    #[serde(rename = "type")]
    event_type: EventType,
    /// track 事件名
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<String>,
    /// page/screen 名称
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    /// page 分类
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anonymous_id: Option<String>,
    /// alias 之前的身份
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_id: Option<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_id: Option<String>,
    /// 与 Context id 一致，由 `Context::new` 回填
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[builder(default = Utc::now())]
    timestamp: DateTime<Utc>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    properties: Map<String, Value>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    traits: Map<String, Value>,
    /// 库/页面等附加元信息
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    context: Map<String, Value>,
    /// 按目的地名开关投递，`"All": false` 关闭全部（显式 `true` 的除外）
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    integrations: Map<String, Value>,
}

impl TelemetryEvent {
    pub fn track(event: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self::builder()
            .event_type(EventType::Track)
            .event(event)
            .properties(properties)
            .build()
    }

    pub fn identify(user_id: impl Into<String>, traits: Map<String, Value>) -> Self {
        Self::builder()
            .event_type(EventType::Identify)
            .user_id(user_id)
            .traits(traits)
            .build()
    }

    pub fn page(name: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self::builder()
            .event_type(EventType::Page)
            .name(name)
            .properties(properties)
            .build()
    }

    pub fn screen(name: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self::builder()
            .event_type(EventType::Screen)
            .name(name)
            .properties(properties)
            .build()
    }

    pub fn alias(user_id: impl Into<String>, previous_id: impl Into<String>) -> Self {
        Self::builder()
            .event_type(EventType::Alias)
            .user_id(user_id)
            .previous_id(previous_id)
            .build()
    }

    pub fn group(group_id: impl Into<String>, traits: Map<String, Value>) -> Self {
        Self::builder()
            .event_type(EventType::Group)
            .group_id(group_id)
            .traits(traits)
            .build()
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn anonymous_id(&self) -> Option<&str> {
        self.anonymous_id.as_deref()
    }

    pub fn previous_id(&self) -> Option<&str> {
        self.previous_id.as_deref()
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn traits(&self) -> &Map<String, Value> {
        &self.traits
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn integrations(&self) -> &Map<String, Value> {
        &self.integrations
    }

    pub fn set_user_id(&mut self, user_id: Option<String>) {
        self.user_id = user_id;
    }

    pub fn set_anonymous_id(&mut self, anonymous_id: Option<String>) {
        self.anonymous_id = anonymous_id;
    }

    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }

    pub fn properties_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.properties
    }

    pub fn traits_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.traits
    }

    pub fn context_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.context
    }

    pub fn integrations_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.integrations
    }

    pub(crate) fn set_message_id(&mut self, message_id: String) {
        self.message_id = Some(message_id);
    }

    /// 目的地是否允许接收本事件
    ///
    /// 显式配置优先；未配置时取 `All`，缺省为开启。对象形式的配置视为开启。
    pub fn is_integration_enabled(&self, destination: &str) -> bool {
        match self.integrations.get(destination) {
            Some(Value::Bool(enabled)) => *enabled,
            Some(_) => true,
            None => self
                .integrations
                .get("All")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        }
    }
}
