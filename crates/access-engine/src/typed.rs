//! 强类型外层封装
//!
//! 运行时仍然按字符串键工作。[`Entity`] 把实体名称、合法动作和 predicate
//! 数据类型绑定在一起，使拼错的实体或动作、不匹配的数据在编译期暴露。

use crate::engine::AccessEngine;
use crate::models::{ActionQuery, Predicate, Rules};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use tracing::warn;

/// 受控实体
///
/// ```ignore
/// struct Post;
///
/// impl Entity for Post {
///     const NAME: &'static str = "post";
///     type Action = PostAction;
///     type Data = PostData;
/// }
/// ```
pub trait Entity {
    /// 规则表中的实体名称
    const NAME: &'static str;
    /// 动作集合，通常是实现了 `AsRef<str>` 的枚举
    type Action: AsRef<str>;
    /// 传给 predicate 的数据
    type Data: Serialize;
}

/// 单个实体上的类型化检查
pub struct EntityAccess<'e, E> {
    engine: &'e AccessEngine,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityAccess<'_, E> {
    /// 检查单个动作
    pub fn check(&self, action: E::Action, data: Option<&E::Data>) -> bool {
        match encode::<E>(data) {
            Ok(data) => self.engine.check(E::NAME, action.as_ref(), data.as_ref()),
            Err(()) => false,
        }
    }

    /// 检查一组动作（全部允许才为 true）
    pub fn check_each(&self, actions: &[E::Action], data: Option<&E::Data>) -> bool {
        match encode::<E>(data) {
            Ok(data) => self
                .engine
                .check(E::NAME, many::<E>(actions), data.as_ref()),
            Err(()) => false,
        }
    }

    /// 检查实体上当前定义的全部动作
    pub fn check_all(&self, data: Option<&E::Data>) -> bool {
        match encode::<E>(data) {
            Ok(data) => self.engine.check(E::NAME, ActionQuery::All, data.as_ref()),
            Err(()) => false,
        }
    }

    pub async fn check_async(&self, action: E::Action, data: Option<&E::Data>) -> bool {
        match encode::<E>(data) {
            Ok(data) => {
                self.engine
                    .check_async(E::NAME, action.as_ref(), data.as_ref())
                    .await
            }
            Err(()) => false,
        }
    }

    pub async fn check_each_async(&self, actions: &[E::Action], data: Option<&E::Data>) -> bool {
        match encode::<E>(data) {
            Ok(data) => {
                self.engine
                    .check_async(E::NAME, many::<E>(actions), data.as_ref())
                    .await
            }
            Err(()) => false,
        }
    }

    pub async fn check_all_async(&self, data: Option<&E::Data>) -> bool {
        match encode::<E>(data) {
            Ok(data) => {
                self.engine
                    .check_async(E::NAME, ActionQuery::All, data.as_ref())
                    .await
            }
            Err(()) => false,
        }
    }
}

fn many<E: Entity>(actions: &[E::Action]) -> ActionQuery<'_> {
    ActionQuery::Many(actions.iter().map(AsRef::as_ref).collect())
}

/// 序列化失败按拒绝处理
fn encode<E: Entity>(data: Option<&E::Data>) -> Result<Option<Value>, ()> {
    data.map(serde_json::to_value).transpose().map_err(|e| {
        warn!(entity = E::NAME, error = %e, "predicate 数据序列化失败，按拒绝处理");
    })
}

impl AccessEngine {
    /// 获取实体的类型化检查入口
    pub fn entity<E: Entity>(&self) -> EntityAccess<'_, E> {
        EntityAccess {
            engine: self,
            _entity: PhantomData,
        }
    }
}

impl Rules {
    /// 类型化地设置 boolean 规则
    pub fn allow<E: Entity>(self, action: E::Action, allowed: bool) -> Self {
        self.with(E::NAME, action.as_ref(), allowed)
    }

    /// 类型化地设置 predicate 规则
    ///
    /// 数据缺失或与 `E::Data` 结构不符时判定为 false。
    pub fn when<E, F>(self, action: E::Action, f: F) -> Self
    where
        E: Entity,
        E::Data: DeserializeOwned + 'static,
        F: Fn(&E::Data) -> bool + Send + Sync + 'static,
    {
        self.with(E::NAME, action.as_ref(), Predicate::typed(f))
    }
}
