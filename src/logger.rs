//! 日志初始化

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化全局日志
///
/// 级别由 `RUST_LOG` 控制，默认 `info`。重复调用是安全的（测试中会多次调用）。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// 初始化详细日志（`debug` 级别）
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
