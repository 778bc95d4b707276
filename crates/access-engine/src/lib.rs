//! 访问控制规则引擎
//!
//! 以 实体 -> 动作 -> (boolean | predicate) 的规则表回答"能否在此实体上执行此动作"，支持：
//! - 规则整体原子替换，失败即拒绝的同步/异步检查
//! - 一次性就绪闸门，异步检查在首次安装规则前挂起
//! - setup / ready 生命周期钩子
//! - 规则模板与参数化模板
//! - 只含 boolean 的线上格式（dehydrate / hydrate）
//! - 基于 [`Entity`] 的强类型外层封装

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod hooks;
pub mod models;
pub mod serializer;
pub mod template;
pub mod typed;
pub mod validator;

pub use access_shared::config::EngineConfig;
pub use engine::{AccessEngine, EngineHooks};
pub use error::{AccessError, Result};
pub use hooks::{HookBus, HookEvent, HookPayload, Listener, Unhook};
pub use models::{
    ActionQuery, ActionRules, Predicate, RuleSource, RuleValue, Rules, WILDCARD_ACTION, is_truthy,
};
pub use serializer::{StateJson, dehydrate, hydrate};
pub use template::{ParamTemplate, Template, template, template_fn};
pub use typed::{Entity, EntityAccess};
pub use validator::{validate_instance, validate_rules};
