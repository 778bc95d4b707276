//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("无效的规则: {0}")]
    InvalidRules(String),

    #[error("无效的实例: 对象不是 AccessEngine")]
    InvalidInstance,

    #[error("实例尚未就绪: 需要先完成一次 setup")]
    NotReady,

    #[error("钩子监听器执行失败: {0}")]
    Hook(#[source] anyhow::Error),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AccessError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRules(_) => "INVALID_RULES",
            Self::InvalidInstance => "INVALID_INSTANCE",
            Self::NotReady => "NOT_READY",
            Self::Hook(_) => "HOOK_FAILED",
            Self::JsonError(_) => "JSON_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, AccessError>;
