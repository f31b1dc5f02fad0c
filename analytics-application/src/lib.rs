//! 遥测客户端（analytics-application）
//!
//! 在调度引擎之上提供面向调用方的入口：
//! - `Analytics`：identify/track/page/alias/group/screen、插件注册、flush 与关闭；
//! - `User`：当前身份，同时作为插件可读的 `HostApi`；
//! - `AnalyticsSettings`：写入密钥、队列配置与可选的持久化存储。
//!
pub mod analytics;
pub mod error;
pub mod settings;
pub mod user;

pub use analytics::Analytics;
pub use error::{AppError, AppResult};
pub use settings::AnalyticsSettings;
pub use user::User;
