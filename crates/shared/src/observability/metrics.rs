//! 指标模块
//!
//! 基于 metrics crate 的门面记录规则引擎指标。
//! 本模块只负责描述和记录，导出器（Prometheus 等）由宿主程序自行安装。

/// 权限检查次数
pub const ACCESS_CHECKS_TOTAL: &str = "access_checks_total";
/// 规则安装次数（setup / hydrate）
pub const ACCESS_RULES_INSTALLED_TOTAL: &str = "access_rules_installed_total";
/// 结构校验未通过的规则次数
pub const ACCESS_RULES_REJECTED_TOTAL: &str = "access_rules_rejected_total";

/// 注册指标描述
///
/// 这些描述会出现在导出器输出的 HELP 注释中
pub fn describe_metrics() {
    metrics::describe_counter!(ACCESS_CHECKS_TOTAL, "Total number of access checks");
    metrics::describe_counter!(
        ACCESS_RULES_INSTALLED_TOTAL,
        "Total number of rule sets installed into engine instances"
    );
    metrics::describe_counter!(
        ACCESS_RULES_REJECTED_TOTAL,
        "Total number of rule sets rejected by structural validation"
    );
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录权限检查结果
#[inline]
pub fn record_access_check(allowed: bool) {
    let result = if allowed { "allow" } else { "deny" };
    metrics::counter!(ACCESS_CHECKS_TOTAL, "result" => result).increment(1);
}

/// 记录规则安装，`source` 为 "setup" 或 "hydrate"
#[inline]
pub fn record_rules_installed(source: &'static str) {
    metrics::counter!(ACCESS_RULES_INSTALLED_TOTAL, "source" => source).increment(1);
}

/// 记录规则校验失败，`source` 为 "setup" 或 "template"
#[inline]
pub fn record_rules_rejected(source: &'static str) {
    metrics::counter!(ACCESS_RULES_REJECTED_TOTAL, "source" => source).increment(1);
}
