//! 核心层统一错误定义
//!
//! 仅覆盖调度引擎自身的基础设施错误（序列化、持久化存储、插件注册、队列生命周期）。
//! 插件处理失败不在此列：它们在管道边界被捕获，记录进 `Context` 并通过 `Emitter` 发出，
//! 调用方始终拿到 `Context` 本身。
//!
use thiserror::Error;

/// 统一错误类型（核心最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CoreError {
    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    // --- 持久化存储 ---
    #[error("storage error: namespace={namespace}, reason={reason}")]
    Storage { namespace: String, reason: String },
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    // --- 插件注册 ---
    #[error("plugin already registered: name={name}")]
    PluginAlreadyRegistered { name: String },
    #[error("plugin not found: name={name}")]
    PluginNotFound { name: String },

    // --- 队列生命周期 ---
    #[error("event queue closed")]
    QueueClosed,
    #[error("dispatch dropped before resolution: ctx={ctx_id}")]
    DispatchDropped { ctx_id: String },
}

impl CoreError {
    pub fn storage(namespace: impl Into<String>, reason: impl ToString) -> Self {
        CoreError::Storage {
            namespace: namespace.into(),
            reason: reason.to_string(),
        }
    }
}

/// 统一 Result 类型别名
pub type CoreResult<T> = Result<T, CoreError>;
