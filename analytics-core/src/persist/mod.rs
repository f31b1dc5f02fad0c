//! 持久化（persist）
//!
//! 定义持久化队列依赖的存储协议与参考实现：
//! - `DurableStorage`：按命名空间读写待投递条目；
//! - `InMemoryStorage`：进程内共享存储；
//! - `JsonFileStorage`：基于文件的崩溃安全存储。
//!
//! 浏览器 cookie/localStorage 等具体适配由上层提供实现并注入。
//!
mod durable_storage;
mod storage_file;
mod storage_inmemory;

pub use durable_storage::{DurableStorage, StoredItem, namespace};
pub use storage_file::JsonFileStorage;
pub use storage_inmemory::InMemoryStorage;
