//! 事件调度（eventing）
//!
//! 把上下文推过插件管道的运行时：
//! - `EventQueue`：插件注册表、调度队列与驱动任务的编排，提供 dispatch/flush/shutdown；
//! - `Dispatch`：队列中的调度项（上下文与尚未成功的目的地），可持久化；
//! - 管道阶段：before → enrichment → destinations（并发、相互隔离）→ after。
//!
//! 插件失败在管道边界被隔离，不会阻塞其它插件与其它上下文。
//!
mod dispatch;
mod event_queue;
mod pipeline;

pub use dispatch::Dispatch;
pub use event_queue::{EventQueue, EventQueueConfig, PendingDispatch};
