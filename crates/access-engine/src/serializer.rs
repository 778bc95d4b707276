//! 状态序列化（dehydrate / hydrate）
//!
//! 线上格式 [`StateJson`] 只包含 boolean，可以跨进程或传输边界传递。
//! 从内存规则到线上格式的投影是有损且单向的：predicate 一律变为 false，
//! 注水后的 boolean 不会还原为 predicate。

use crate::engine::AccessEngine;
use crate::error::{AccessError, Result};
use crate::models::Rules;
use crate::validator::validate_instance;
use access_shared::observability::metrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 线上格式：实体 -> 动作 -> boolean
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateJson(BTreeMap<String, BTreeMap<String, bool>>);

impl StateJson {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将内存规则投影为线上格式
    pub fn project(rules: &Rules) -> Self {
        let entities = rules
            .iter()
            .map(|(entity, actions)| {
                let actions = actions
                    .iter()
                    .map(|(action, value)| (action.clone(), value.project()))
                    .collect();
                (entity.clone(), actions)
            })
            .collect();
        Self(entities)
    }

    pub fn insert(
        &mut self,
        entity: impl Into<String>,
        action: impl Into<String>,
        allowed: bool,
    ) -> Option<bool> {
        self.0
            .entry(entity.into())
            .or_default()
            .insert(action.into(), allowed)
    }

    pub fn get(&self, entity: &str, action: &str) -> Option<bool> {
        self.0.get(entity)?.get(action).copied()
    }

    pub fn entity(&self, entity: &str) -> Option<&BTreeMap<String, bool>> {
        self.0.get(entity)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, BTreeMap<String, bool>> {
        self.0
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// 从 JSON 字符串解析，叶子不是 boolean 时返回 `InvalidRules`
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json)?;
        Self::from_document(&document)
    }

    /// 从 JSON 文档解析
    pub fn from_document(document: &Value) -> Result<Self> {
        let rules = Rules::from_document(document)?;
        Ok(Self::project(&rules))
    }
}

impl From<BTreeMap<String, BTreeMap<String, bool>>> for StateJson {
    fn from(entities: BTreeMap<String, BTreeMap<String, bool>>) -> Self {
        Self(entities)
    }
}

impl AccessEngine {
    /// 导出当前规则的线上格式
    ///
    /// 实例尚未完成 setup（或 hydrate）时返回 `NotReady`。
    #[instrument(skip_all, fields(engine_id = %self.inner.id))]
    pub fn dehydrate(&self) -> Result<StateJson> {
        if !self.ready() {
            warn!("实例尚未就绪，无法导出状态");
            return Err(AccessError::NotReady);
        }

        let state = match self.inner.rules.load_full() {
            Some(rules) => {
                if rules.has_predicates() {
                    debug!("规则包含 predicate，导出时投影为 false");
                }
                StateJson::project(&rules)
            }
            None => StateJson::new(),
        };

        Ok(state)
    }

    /// 直接安装线上格式的状态
    ///
    /// 跳过结构校验与钩子管线；实例随之进入就绪状态。
    #[instrument(skip_all, fields(engine_id = %self.inner.id))]
    pub fn hydrate(&self, state: StateJson) {
        let rules = Arc::new(Rules::from(state));
        let entities = rules.len();

        self.inner.rules.store(Some(rules));
        self.inner.gate.open();

        metrics::record_rules_installed("hydrate");
        debug!(entities, "状态已注水");
    }
}

/// 从类型擦除的实例导出状态
pub fn dehydrate(instance: &dyn Any) -> Result<StateJson> {
    validate_instance(instance)?.dehydrate()
}

/// 向类型擦除的实例注水
pub fn hydrate(instance: &dyn Any, state: StateJson) -> Result<()> {
    validate_instance(instance)?.hydrate(state);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Predicate;
    use serde_json::json;

    #[test]
    fn test_dehydrate_before_setup() {
        let engine = AccessEngine::new();
        assert!(matches!(engine.dehydrate(), Err(AccessError::NotReady)));
    }

    #[test]
    fn test_dehydrate_projects_predicates_to_false() {
        let engine = AccessEngine::new();
        engine
            .setup(
                Rules::new()
                    .with("post", "read", true)
                    .with("post", "create", Predicate::new(|_| true)),
            )
            .unwrap();

        let state = engine.dehydrate().unwrap();

        assert_eq!(state.get("post", "read"), Some(true));
        assert_eq!(state.get("post", "create"), Some(false));
    }

    #[test]
    fn test_hydrate_round_trip() {
        let engine = AccessEngine::new();
        let state = StateJson::from_document(&json!({
            "post": {"create": true, "read": false},
            "audit": {}
        }))
        .unwrap();

        engine.hydrate(state.clone());

        assert_eq!(engine.dehydrate().unwrap(), state);
        assert!(engine.check("post", "create", None));
    }

    #[test]
    fn test_hydrate_does_not_fire_hooks() {
        let engine = AccessEngine::new();
        engine.hook(crate::hooks::HookEvent::Setup, |_| {
            anyhow::bail!("setup hook must not run on hydrate")
        });

        let mut state = StateJson::new();
        state.insert("post", "read", true);
        engine.hydrate(state);

        assert!(engine.is_ready());
    }

    #[test]
    fn test_json_string_helpers() {
        let mut state = StateJson::new();
        state.insert("post", "create", false);

        let json = state.to_json().unwrap();
        assert_eq!(json, r#"{"post":{"create":false}}"#);
        assert_eq!(StateJson::from_json(&json).unwrap(), state);
    }

    #[test]
    fn test_from_json_rejects_non_boolean() {
        let result = StateJson::from_json(r#"{"post":{"create":"yes"}}"#);
        assert!(matches!(result, Err(AccessError::InvalidRules(_))));

        let result = StateJson::from_json("not json");
        assert!(matches!(result, Err(AccessError::JsonError(_))));
    }

    #[test]
    fn test_type_erased_helpers() {
        let engine = AccessEngine::new();
        let mut state = StateJson::new();
        state.insert("post", "read", true);

        hydrate(&engine, state.clone()).unwrap();
        assert_eq!(dehydrate(&engine).unwrap(), state);

        let foreign = 42_u32;
        assert!(matches!(
            dehydrate(&foreign),
            Err(AccessError::InvalidInstance)
        ));
        assert!(matches!(
            hydrate(&foreign, state),
            Err(AccessError::InvalidInstance)
        ));
    }
}
