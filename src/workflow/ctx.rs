//! 调用上下文
//!
//! 封装"谁在调用、这是哪一次请求"。调用方已在边界层完成鉴权与限流，
//! 这里只用于日志前缀与可选的版本前置条件。

use std::fmt::Display;
use uuid::Uuid;

/// 调用上下文
#[derive(Debug, Clone)]
pub struct CallerCtx {
    /// 已验证的调用方标识
    pub caller_id: String,

    /// 请求 ID（仅用于日志关联）
    pub request_id: String,

    /// 调用方读到的试卷版本
    ///
    /// 设置后，写操作在加载时若发现版本不同直接返回 `Conflict`，
    /// 保证调用方基于自己看到的结构做修改。
    pub expected_version: Option<u64>,
}

impl CallerCtx {
    /// 创建新的调用上下文，自动生成请求 ID
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            request_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            expected_version: None,
        }
    }

    /// 附带版本前置条件
    pub fn at_version(&self, version: u64) -> Self {
        Self {
            expected_version: Some(version),
            ..self.clone()
        }
    }

    /// 系统内部调用（蓝图批处理等）
    pub fn system() -> Self {
        Self::new("system")
    }
}

impl Display for CallerCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[调用方#{} 请求#{}", self.caller_id, self.request_id)?;
        if let Some(v) = self.expected_version {
            write!(f, " 版本#{}", v)?;
        }
        write!(f, "]")
    }
}
