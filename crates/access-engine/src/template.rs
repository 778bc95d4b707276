//! 规则模板
//!
//! 在任何实例存在之前预先定义并校验可复用的规则集，
//! 使结构错误在定义时而不是 `setup` 时暴露。
//!
//! # 主要功能
//!
//! - [`template`]: 立即校验的静态规则集
//! - [`template_fn`]: 参数化模板，每次产出规则时校验

use crate::error::Result;
use crate::models::{RuleSource, Rules};
use access_shared::observability::metrics;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// 已校验的不可变规则集
#[derive(Debug, Clone)]
pub struct Template {
    rules: Arc<Rules>,
}

impl Template {
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// 产出规则，供 `setup` 使用（共享同一份规则，不复制）
    pub fn produce(&self) -> Arc<Rules> {
        Arc::clone(&self.rules)
    }
}

/// 定义模板，结构不合法时立即返回 `InvalidRules`
pub fn template(rules: impl Into<RuleSource>) -> Result<Template> {
    match rules.into().resolve() {
        Ok(rules) => Ok(Template { rules }),
        Err(e) => {
            metrics::record_rules_rejected("template");
            warn!(error = %e, "模板定义校验失败");
            Err(e)
        }
    }
}

type ProducerFn<P> = dyn Fn(P) -> RuleSource + Send + Sync;

/// 参数化模板
///
/// 规则依赖运行时参数（如当前用户），每次产出时校验结构。
pub struct ParamTemplate<P> {
    producer: Arc<ProducerFn<P>>,
}

impl<P> ParamTemplate<P> {
    /// 以参数产出已校验的模板
    pub fn produce(&self, param: P) -> Result<Template> {
        template((self.producer)(param))
    }
}

impl<P> Clone for ParamTemplate<P> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<P> fmt::Debug for ParamTemplate<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParamTemplate(..)")
    }
}

/// 定义参数化模板
pub fn template_fn<P, F, R>(f: F) -> ParamTemplate<P>
where
    P: 'static,
    F: Fn(P) -> R + Send + Sync + 'static,
    R: Into<RuleSource> + 'static,
{
    ParamTemplate {
        producer: Arc::new(move |param: P| -> RuleSource { f(param).into() }),
    }
}
