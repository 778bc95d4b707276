//! 共享库
//!
//! 包含规则引擎及其宿主程序共用的配置与可观测性基础设施代码。

pub mod config;
pub mod observability;
