//! 规则引擎领域模型
//!
//! 内存中的规则是 实体 -> 动作 -> (boolean | predicate) 的两层映射。
//! 运行时完全基于字符串键，强类型只存在于 [`crate::typed`] 的外层封装中。

use crate::error::{AccessError, Result};
use crate::serializer::StateJson;
use crate::template::Template;
use crate::validator;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 通配动作：对实体当前定义的全部动作求 AND
pub const WILDCARD_ACTION: &str = "all";

type PredicateFn = dyn Fn(Option<&Value>) -> bool + Send + Sync;

/// 数据相关的权限判定函数
#[derive(Clone)]
pub struct Predicate(Arc<PredicateFn>);

impl Predicate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// 返回任意 JSON 值的判定函数，结果按真值规则转换为 boolean
    pub fn truthy<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    {
        Self::new(move |data| is_truthy(&f(data)))
    }

    /// 针对具体数据类型的判定函数
    ///
    /// 数据缺失或无法反序列化为 `T` 时判定为 false。
    pub fn typed<T, F>(f: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::new(move |data| match data.map(|v| T::deserialize(v)) {
            Some(Ok(value)) => f(&value),
            _ => false,
        })
    }

    /// 调用判定函数
    pub fn call(&self, data: Option<&Value>) -> bool {
        (self.0)(data)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// 单个动作的规则值
#[derive(Debug, Clone)]
pub enum RuleValue {
    Bool(bool),
    Predicate(Predicate),
}

impl RuleValue {
    /// 评估规则值，predicate 以 `data` 调用
    pub fn evaluate(&self, data: Option<&Value>) -> bool {
        match self {
            Self::Bool(allowed) => *allowed,
            Self::Predicate(predicate) => predicate.call(data),
        }
    }

    pub fn is_predicate(&self) -> bool {
        matches!(self, Self::Predicate(_))
    }

    /// 投影为线上格式：predicate 一律视为 false
    pub fn project(&self) -> bool {
        match self {
            Self::Bool(allowed) => *allowed,
            Self::Predicate(_) => false,
        }
    }
}

impl From<bool> for RuleValue {
    fn from(allowed: bool) -> Self {
        Self::Bool(allowed)
    }
}

impl From<Predicate> for RuleValue {
    fn from(predicate: Predicate) -> Self {
        Self::Predicate(predicate)
    }
}

/// 单个实体下的动作规则
pub type ActionRules = BTreeMap<String, RuleValue>;

/// 规则集
#[derive(Debug, Clone, Default)]
pub struct Rules {
    entities: BTreeMap<String, ActionRules>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式添加一条规则
    pub fn with(
        mut self,
        entity: impl Into<String>,
        action: impl Into<String>,
        value: impl Into<RuleValue>,
    ) -> Self {
        self.insert(entity, action, value);
        self
    }

    /// 添加或替换一条规则，返回旧值
    pub fn insert(
        &mut self,
        entity: impl Into<String>,
        action: impl Into<String>,
        value: impl Into<RuleValue>,
    ) -> Option<RuleValue> {
        self.entities
            .entry(entity.into())
            .or_default()
            .insert(action.into(), value.into())
    }

    /// 声明一个实体（可以没有任何动作）
    pub fn declare(&mut self, entity: impl Into<String>) -> &mut ActionRules {
        self.entities.entry(entity.into()).or_default()
    }

    /// 从无类型 JSON 文档构建规则集
    ///
    /// 文档必须是对象的对象，且每个叶子都是 boolean。
    pub fn from_document(document: &Value) -> Result<Self> {
        if let Some(reason) = validator::find_violation(document) {
            return Err(AccessError::InvalidRules(reason));
        }

        let mut rules = Self::new();
        if let Value::Object(entities) = document {
            for (entity, actions) in entities {
                let target = rules.declare(entity.as_str());
                if let Value::Object(actions) = actions {
                    for (action, leaf) in actions {
                        if let Value::Bool(allowed) = leaf {
                            target.insert(action.clone(), RuleValue::Bool(*allowed));
                        }
                    }
                }
            }
        }

        Ok(rules)
    }

    pub fn entity(&self, entity: &str) -> Option<&ActionRules> {
        self.entities.get(entity)
    }

    pub fn get(&self, entity: &str, action: &str) -> Option<&RuleValue> {
        self.entities.get(entity)?.get(action)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ActionRules)> {
        self.entities.iter()
    }

    /// 实体数量
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// 是否包含 predicate（dehydrate 时会有损）
    pub fn has_predicates(&self) -> bool {
        self.entities
            .values()
            .flat_map(|actions| actions.values())
            .any(RuleValue::is_predicate)
    }
}

impl From<StateJson> for Rules {
    fn from(state: StateJson) -> Self {
        let mut rules = Self::new();
        for (entity, actions) in state.into_inner() {
            let target = rules.declare(entity);
            for (action, allowed) in actions {
                target.insert(action, RuleValue::Bool(allowed));
            }
        }
        rules
    }
}

/// 动作查询：单个动作、动作列表或通配 `"all"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionQuery<'a> {
    One(&'a str),
    Many(Vec<&'a str>),
    All,
}

impl<'a> From<&'a str> for ActionQuery<'a> {
    fn from(action: &'a str) -> Self {
        if action == WILDCARD_ACTION {
            Self::All
        } else {
            Self::One(action)
        }
    }
}

impl<'a> From<&'a String> for ActionQuery<'a> {
    fn from(action: &'a String) -> Self {
        Self::from(action.as_str())
    }
}

impl<'a> From<Vec<&'a str>> for ActionQuery<'a> {
    fn from(actions: Vec<&'a str>) -> Self {
        Self::Many(actions)
    }
}

impl<'a> From<&'a [&'a str]> for ActionQuery<'a> {
    fn from(actions: &'a [&'a str]) -> Self {
        Self::Many(actions.to_vec())
    }
}

impl<'a, const N: usize> From<[&'a str; N]> for ActionQuery<'a> {
    fn from(actions: [&'a str; N]) -> Self {
        Self::Many(actions.to_vec())
    }
}

impl<'a, const N: usize> From<&'a [&'a str; N]> for ActionQuery<'a> {
    fn from(actions: &'a [&'a str; N]) -> Self {
        Self::Many(actions.to_vec())
    }
}

impl<'a> From<&'a [String]> for ActionQuery<'a> {
    fn from(actions: &'a [String]) -> Self {
        Self::Many(actions.iter().map(String::as_str).collect())
    }
}

/// `setup` 与 `template` 接受的规则来源
#[derive(Debug, Clone)]
pub enum RuleSource {
    /// 已构建的规则集
    Rules(Rules),
    /// 共享的规则集（来自模板）
    Shared(Arc<Rules>),
    /// 无类型 JSON 文档，安装前需要结构校验
    Document(Value),
}

impl RuleSource {
    /// 校验并解析为可安装的规则集
    pub(crate) fn resolve(self) -> Result<Arc<Rules>> {
        match self {
            Self::Rules(rules) => Ok(Arc::new(rules)),
            Self::Shared(rules) => Ok(rules),
            Self::Document(document) => Rules::from_document(&document).map(Arc::new),
        }
    }
}

impl From<Rules> for RuleSource {
    fn from(rules: Rules) -> Self {
        Self::Rules(rules)
    }
}

impl From<Arc<Rules>> for RuleSource {
    fn from(rules: Arc<Rules>) -> Self {
        Self::Shared(rules)
    }
}

impl From<Value> for RuleSource {
    fn from(document: Value) -> Self {
        Self::Document(document)
    }
}

impl From<StateJson> for RuleSource {
    fn from(state: StateJson) -> Self {
        Self::Rules(Rules::from(state))
    }
}

impl From<Template> for RuleSource {
    fn from(template: Template) -> Self {
        Self::Shared(template.produce())
    }
}

impl From<&Template> for RuleSource {
    fn from(template: &Template) -> Self {
        Self::Shared(template.produce())
    }
}

/// JSON 真值判断：null、false、0、NaN 与空字符串为假，其余为真
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_rules_builder() {
        let rules = Rules::new()
            .with("post", "create", true)
            .with("post", "read", false)
            .with("comment", "delete", Predicate::new(|_| true));

        assert_eq!(rules.len(), 2);
        assert!(rules.get("post", "create").unwrap().evaluate(None));
        assert!(!rules.get("post", "read").unwrap().evaluate(None));
        assert!(rules.get("post", "update").is_none());
        assert!(rules.has_predicates());
    }

    #[test]
    fn test_from_document() {
        let rules = Rules::from_document(&json!({
            "post": {"create": true, "read": false},
            "audit": {}
        }))
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert!(rules.entity("audit").unwrap().is_empty());
        assert!(!rules.has_predicates());
    }

    #[test]
    fn test_from_document_rejects_non_boolean_leaf() {
        let result = Rules::from_document(&json!({"post": {"create": 1}}));
        assert!(matches!(result, Err(AccessError::InvalidRules(_))));
    }

    #[test]
    fn test_predicate_typed() {
        #[derive(Deserialize)]
        struct Post {
            #[serde(rename = "authorId")]
            author_id: String,
        }

        let predicate = Predicate::typed(|post: &Post| post.author_id == "1");

        assert!(predicate.call(Some(&json!({"authorId": "1"}))));
        assert!(!predicate.call(Some(&json!({"authorId": "2"}))));
        assert!(!predicate.call(Some(&json!({"title": "no author"}))));
        assert!(!predicate.call(None));
    }

    #[test]
    fn test_predicate_truthy() {
        let predicate = Predicate::truthy(|data| {
            data.and_then(|d| d.get("score")).cloned().unwrap_or(Value::Null)
        });

        assert!(predicate.call(Some(&json!({"score": 3}))));
        assert!(!predicate.call(Some(&json!({"score": 0}))));
        assert!(!predicate.call(Some(&json!({}))));
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!(-1.5)));
    }

    #[test]
    fn test_action_query_from() {
        assert_eq!(ActionQuery::from("all"), ActionQuery::All);
        assert_eq!(ActionQuery::from("read"), ActionQuery::One("read"));
        assert_eq!(
            ActionQuery::from(["read", "update"]),
            ActionQuery::Many(vec!["read", "update"])
        );

        let owned = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            ActionQuery::from(owned.as_slice()),
            ActionQuery::Many(vec!["a", "b"])
        );
    }

    #[test]
    fn test_rules_from_state() {
        let mut state = StateJson::new();
        state.insert("post", "create", true);

        let rules = Rules::from(state);
        assert!(rules.get("post", "create").unwrap().evaluate(None));
    }
}
