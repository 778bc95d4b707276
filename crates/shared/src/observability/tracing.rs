//! 日志追踪模块
//!
//! 基于 tracing-subscriber 初始化日志输出，支持 pretty 与 JSON 两种格式。

use anyhow::Result;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use super::ObservabilityConfig;

/// Tracing 资源守卫
///
/// 全局订阅器只能安装一次，Guard 记录本次初始化是否真正生效。
pub struct TracingGuard {
    installed: bool,
}

impl TracingGuard {
    /// 本次初始化是否安装了全局订阅器
    pub fn installed(&self) -> bool {
        self.installed
    }
}

/// 初始化 tracing（日志）
///
/// 若全局订阅器已存在（例如测试中多次初始化），保留已有订阅器并返回
/// `installed = false` 的 Guard。
pub fn init(config: &ObservabilityConfig) -> Result<TracingGuard> {
    let env_filter = build_filter(&config.log_level);

    let fmt_layer = if config.json_logs {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok();

    Ok(TracingGuard { installed })
}

/// 构建环境过滤器：RUST_LOG 优先，其次配置中的日志级别
fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_keeps_first_subscriber() {
        let config = ObservabilityConfig::default();

        let _first = init(&config).unwrap();
        let second = init(&config).unwrap();

        // 第二次初始化不会覆盖已安装的全局订阅器
        assert!(!second.installed());
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // 非法的过滤表达式不应 panic
        let _ = build_filter("not a [valid filter");
    }
}
