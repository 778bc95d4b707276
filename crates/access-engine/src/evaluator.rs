//! 权限评估器
//!
//! 失败即拒绝：未安装规则、实体不存在、动作不存在都评估为 false。

use crate::models::{ActionQuery, ActionRules, Rules};
use serde_json::Value;

/// 权限评估器
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// 评估实体上的动作查询
    ///
    /// # Arguments
    /// * `rules` - 当前规则集
    /// * `entity` - 实体名称
    /// * `query` - 单个动作、动作列表（逐个 AND）或通配 `all`（实体上全部动作 AND）
    /// * `data` - 传给 predicate 的数据
    pub fn evaluate(
        rules: &Rules,
        entity: &str,
        query: &ActionQuery<'_>,
        data: Option<&Value>,
    ) -> bool {
        let Some(actions) = rules.entity(entity) else {
            return false;
        };

        match query {
            ActionQuery::One(action) => Self::evaluate_action(actions, action, data),
            // 空集合上的 AND 为 true
            ActionQuery::Many(list) => list
                .iter()
                .all(|action| Self::evaluate_action(actions, action, data)),
            ActionQuery::All => actions.values().all(|value| value.evaluate(data)),
        }
    }

    /// 评估单个动作，动作不存在时返回 false
    fn evaluate_action(actions: &ActionRules, action: &str, data: Option<&Value>) -> bool {
        actions
            .get(action)
            .is_some_and(|value| value.evaluate(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Predicate;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_rules() -> Rules {
        Rules::new()
            .with("post", "create", true)
            .with("post", "read", false)
            .with(
                "post",
                "update",
                Predicate::new(|data| {
                    data.and_then(|d| d.get("authorId"))
                        .and_then(Value::as_str)
                        == Some("1")
                }),
            )
            .with("comment", "create", true)
            .with("comment", "read", true)
    }

    fn check(rules: &Rules, entity: &str, query: impl Into<ActionQuery<'static>>) -> bool {
        RuleEvaluator::evaluate(rules, entity, &query.into(), None)
    }

    #[test]
    fn test_boolean_leaf() {
        let rules = sample_rules();
        assert!(check(&rules, "post", "create"));
        assert!(!check(&rules, "post", "read"));
    }

    #[test]
    fn test_missing_action_and_entity() {
        let rules = sample_rules();
        assert!(!check(&rules, "post", "delete"));
        assert!(!check(&rules, "user", "create"));
        assert!(!check(&rules, "user", "all"));
    }

    #[test]
    fn test_predicate_leaf() {
        let rules = sample_rules();
        let query = ActionQuery::One("update");

        assert!(RuleEvaluator::evaluate(
            &rules,
            "post",
            &query,
            Some(&json!({"authorId": "1"}))
        ));
        assert!(!RuleEvaluator::evaluate(
            &rules,
            "post",
            &query,
            Some(&json!({"authorId": "2"}))
        ));
        assert!(!RuleEvaluator::evaluate(&rules, "post", &query, None));
    }

    #[test]
    fn test_action_list_is_and() {
        let rules = sample_rules();
        assert!(check(&rules, "comment", ["create", "read"]));
        assert!(!check(&rules, "post", ["create", "read"]));
        assert!(!check(&rules, "post", ["create", "missing"]));
    }

    #[test]
    fn test_wildcard_all() {
        let rules = sample_rules();
        assert!(check(&rules, "comment", "all"));
        assert!(!check(&rules, "post", "all"));
    }

    #[test]
    fn test_empty_action_sets_are_vacuously_true() {
        let mut rules = sample_rules();
        rules.declare("audit");

        assert!(check(&rules, "audit", "all"));
        assert!(check(&rules, "comment", Vec::<&str>::new()));
        assert!(check(&rules, "post", Vec::<&str>::new()));
        // 实体不存在时仍然拒绝
        assert!(!check(&rules, "user", Vec::<&str>::new()));
    }

    #[test]
    fn test_list_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let rules = Rules::new().with("post", "read", false).with(
            "post",
            "update",
            Predicate::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
        );

        assert!(!check(&rules, "post", ["read", "update"]));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
