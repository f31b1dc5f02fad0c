//! 遥测事件调度引擎（analytics-core）
//!
//! 将应用遥测调用（identify/track/page/alias/group/screen）封装为上下文，经过有序的插件管道
//! 交给一个或多个目的地，并在插件失败、网络失败与并发负载下保持可靠：
//! - 事件上下文（`context`）：不可变身份、可变注解、取消与日志轨迹；
//! - 插件（`plugin`）：按阶段标记的处理单元与队列私有的注册表；
//! - 调度队列（`queue`）：优先级、并发上限与指数退避重试；
//! - 持久化（`persist`）：可跨重启恢复的存储协议与内存/文件实现；
//! - 任务组（`task_group`）：用于 flush/关闭的并发屏障；
//! - 生命周期通知（`emitter`）与事件队列（`eventing`）。
//!
//! 本 crate 不安装任何 `tracing` 订阅者，也不绑定具体的目的地或存储后端。
//!
//! 典型用法：
//! 1. 使用 `EventQueue::builder()` 构建事件队列（可选注入 `DurableStorage`）；
//! 2. `register` 插件；
//! 3. 以 `Context::new(TelemetryEvent::track(..))` 创建上下文并 `dispatch`；
//! 4. 退出前 `shutdown` 等待所有条目终结。
//!
pub mod context;
pub mod emitter;
pub mod error;
pub mod eventing;
pub mod persist;
pub mod plugin;
pub mod queue;
pub mod task_group;

pub use context::{Context, EventType, TelemetryEvent};
pub use emitter::{Emitter, ErrorEvent, EventKind, QueueEvent};
pub use error::{CoreError, CoreResult};
pub use eventing::{EventQueue, EventQueueConfig};
pub use plugin::{HostApi, Plugin, PluginType};
pub use queue::RetryPolicy;
