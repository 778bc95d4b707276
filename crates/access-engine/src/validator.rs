//! 结构校验
//!
//! - 规则文档：必须是对象的对象，叶子只能是 boolean（JSON 中不存在可调用值，
//!   predicate 只能通过 [`crate::Rules`] 构建，天然合法）
//! - 实例：来自外部代码的类型擦除值必须确实是 [`AccessEngine`]

use crate::engine::AccessEngine;
use crate::error::{AccessError, Result};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// 校验规则文档结构，返回是否合法
pub fn validate_rules(document: &Value) -> bool {
    find_violation(document).is_none()
}

/// 查找第一个结构违规，返回可读的违规描述
pub(crate) fn find_violation(document: &Value) -> Option<String> {
    let Value::Object(entities) = document else {
        return Some(format!("规则必须是对象, 实际 {}", type_name(document)));
    };

    for (entity, actions) in entities {
        let Value::Object(actions) = actions else {
            return Some(format!(
                "实体 '{}' 必须是对象, 实际 {}",
                entity,
                type_name(actions)
            ));
        };

        for (action, leaf) in actions {
            if !leaf.is_boolean() {
                return Some(format!(
                    "'{}.{}' 必须是 boolean 或 predicate, 实际 {}",
                    entity,
                    action,
                    type_name(leaf)
                ));
            }
        }
    }

    None
}

/// 校验类型擦除的实例
///
/// 适配层常把引擎放在扩展表（如 `http::Extensions`）里以 `dyn Any` 传递，
/// 接受 `AccessEngine` 本身或 `Arc<AccessEngine>`。
pub fn validate_instance(instance: &dyn Any) -> Result<&AccessEngine> {
    instance
        .downcast_ref::<AccessEngine>()
        .or_else(|| {
            instance
                .downcast_ref::<Arc<AccessEngine>>()
                .map(|engine| engine.as_ref())
        })
        .ok_or(AccessError::InvalidInstance)
}

/// 获取值的类型名称
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
