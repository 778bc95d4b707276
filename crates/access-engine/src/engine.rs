//! 规则引擎实例
//!
//! 每个实例持有一份当前规则、一个就绪闸门和一个钩子注册表。
//! 规则通过原子指针整体替换，读者只会看到完整的旧规则或完整的新规则。

use crate::error::{AccessError, Result};
use crate::evaluator::RuleEvaluator;
use crate::gate::AsyncGate;
use crate::hooks::{HookBus, HookEvent, HookPayload, Listener, Unhook};
use crate::models::{ActionQuery, RuleSource, Rules};
use access_shared::config::EngineConfig;
use access_shared::observability::metrics;
use arc_swap::ArcSwapOption;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

/// 引擎事件注册表
pub type EngineHooks = HookBus<HookEvent, HookPayload>;

/// 规则引擎实例
///
/// 克隆得到的是同一个实例的另一个句柄。
#[derive(Clone)]
pub struct AccessEngine {
    pub(crate) inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    pub(crate) id: Uuid,
    pub(crate) config: EngineConfig,
    /// 当前规则，未安装时为 None
    pub(crate) rules: ArcSwapOption<Rules>,
    /// 是否已完成过 setup（决定 ready 事件只发布一次）
    pub(crate) configured: AtomicBool,
    pub(crate) gate: AsyncGate,
    pub(crate) hooks: EngineHooks,
}

impl AccessEngine {
    /// 使用默认配置（客户端上下文）创建实例
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let id = Uuid::new_v4();
        debug!(engine_id = %id, client_context = config.client_context, "引擎实例已创建");

        Self {
            inner: Arc::new(EngineInner {
                id,
                config,
                rules: ArcSwapOption::empty(),
                configured: AtomicBool::new(false),
                gate: AsyncGate::new(),
                hooks: EngineHooks::new(),
            }),
        }
    }

    /// 实例标识
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// 当前规则快照
    pub fn rules(&self) -> Option<Arc<Rules>> {
        self.inner.rules.load_full()
    }

    // ==================== 安装规则 ====================

    /// 安装规则
    ///
    /// 结构校验失败时返回 `InvalidRules`，保留原有规则不变。
    /// 成功后整体替换当前规则，首次成功时打开就绪闸门，
    /// 随后发布 `setup` 事件，首次调用再发布 `ready` 事件。
    #[instrument(skip_all, fields(engine_id = %self.inner.id))]
    pub fn setup(&self, rules: impl Into<RuleSource>) -> Result<()> {
        let rules = match rules.into().resolve() {
            Ok(rules) => rules,
            Err(e) => {
                metrics::record_rules_rejected("setup");
                warn!(error = %e, "规则校验失败，保留原有规则");
                return Err(e);
            }
        };

        self.install(rules)
    }

    /// 通过同步函数产出规则并安装
    pub fn setup_with<F, R>(&self, provider: F) -> Result<()>
    where
        F: FnOnce() -> R,
        R: Into<RuleSource>,
    {
        self.setup(provider())
    }

    /// 通过异步函数产出规则并安装
    ///
    /// 等待期间旧规则对 `check` 完全可见。
    pub async fn setup_async<F, Fut, R>(&self, provider: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
        R: Into<RuleSource>,
    {
        let rules = provider().await;
        self.setup(rules)
    }

    fn install(&self, rules: Arc<Rules>) -> Result<()> {
        self.inner.rules.store(Some(Arc::clone(&rules)));
        self.inner.gate.open();
        let first = !self.inner.configured.swap(true, Ordering::AcqRel);

        metrics::record_rules_installed("setup");
        info!(entities = rules.len(), first, "规则已安装");

        self.inner
            .hooks
            .call_hook(&HookEvent::Setup, &HookPayload::Setup(rules))
            .map_err(AccessError::Hook)?;

        if first {
            self.inner
                .hooks
                .call_hook(&HookEvent::Ready, &HookPayload::Ready)
                .map_err(AccessError::Hook)?;
        }

        Ok(())
    }

    // ==================== 权限检查 ====================

    /// 同步检查权限
    ///
    /// `action` 可以是单个动作、动作列表或通配 `"all"`。
    pub fn check<'a>(
        &self,
        entity: &str,
        action: impl Into<ActionQuery<'a>>,
        data: Option<&Value>,
    ) -> bool {
        let query = action.into();
        let allowed = match self.inner.rules.load_full() {
            Some(rules) => RuleEvaluator::evaluate(&rules, entity, &query, data),
            None => false,
        };

        metrics::record_access_check(allowed);
        trace!(engine_id = %self.inner.id, entity, query = ?query, allowed, "权限检查");
        allowed
    }

    /// 等待首次安装规则后检查权限
    ///
    /// 使用等待结束时的最新规则，而不是调用时的快照。
    pub async fn check_async<'a>(
        &self,
        entity: &str,
        action: impl Into<ActionQuery<'a>>,
        data: Option<&Value>,
    ) -> bool {
        let query = action.into();
        self.inner.gate.wait().await;
        self.check(entity, query, data)
    }

    /// 就绪快照（不挂起）
    ///
    /// 服务端上下文始终返回 false，与客户端首次渲染的状态一致。
    pub fn is_ready(&self) -> bool {
        self.inner.config.client_context && self.inner.gate.is_open()
    }

    /// 挂起直到首次安装规则
    pub async fn is_ready_async(&self) -> bool {
        self.inner.gate.wait().await;
        self.inner.gate.is_open()
    }

    /// 内部就绪状态，不受上下文配置影响
    pub(crate) fn ready(&self) -> bool {
        self.inner.gate.is_open()
    }

    // ==================== 生命周期钩子 ====================

    pub fn hooks(&self) -> &EngineHooks {
        &self.inner.hooks
    }

    pub fn hook<F>(&self, event: HookEvent, f: F) -> Unhook<HookEvent, HookPayload>
    where
        F: Fn(&HookPayload) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.hooks.hook(event, f)
    }

    /// 注册已有的监听器句柄，之后可以通过 `remove_hook` 注销
    pub fn hook_listener(
        &self,
        event: HookEvent,
        listener: Listener<HookPayload>,
    ) -> Unhook<HookEvent, HookPayload> {
        self.inner.hooks.hook_listener(event, listener)
    }

    pub fn hook_once<F>(&self, event: HookEvent, f: F) -> Unhook<HookEvent, HookPayload>
    where
        F: Fn(&HookPayload) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.hooks.hook_once(event, f)
    }

    pub fn remove_hook(&self, event: HookEvent, listener: &Listener<HookPayload>) -> bool {
        self.inner.hooks.remove_hook(&event, listener)
    }

    pub fn clear_hook(&self, event: HookEvent) {
        self.inner.hooks.clear_hook(&event);
    }

    pub fn clear_all_hooks(&self) {
        self.inner.hooks.clear_all_hooks();
    }
}

impl Default for AccessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AccessEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessEngine")
            .field("id", &self.inner.id)
            .field("client_context", &self.inner.config.client_context)
            .field("ready", &self.ready())
            .finish()
    }
}
