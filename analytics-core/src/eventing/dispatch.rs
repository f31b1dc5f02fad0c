use crate::context::Context;
use crate::error::CoreResult as Result;
use crate::queue::{Persistable, QueueItem};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 队列中的一次调度：上下文及其尚未成功的目的地
///
/// `pending` 为 `None` 表示首次调度（需经过 before/enrichment）；重试时只保留失败的目的地名称。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatch {
    pub(crate) ctx: Context,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) pending: Option<Vec<String>>,
}

impl Dispatch {
    pub fn new(ctx: Context) -> Self {
        Self { ctx, pending: None }
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    pub fn pending(&self) -> Option<&[String]> {
        self.pending.as_deref()
    }

    pub fn into_context(self) -> Context {
        self.ctx
    }
}

impl QueueItem for Dispatch {
    fn key(&self) -> &str {
        self.ctx.id()
    }
}

impl Persistable for Dispatch {
    fn to_payload(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_payload(payload: Value) -> Result<Self> {
        Ok(serde_json::from_value(payload)?)
    }
}
