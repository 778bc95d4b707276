//! 生命周期钩子
//!
//! 命名通道到有序监听器列表的同步发布/订阅注册表。
//! 派发时先复制监听器快照再释放锁，监听器内部可以注册或注销钩子；
//! 监听器内部再次调用 `setup` 属于调用方责任，注册表不做防护。

use crate::models::Rules;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// 引擎发布的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// 每次 setup 成功后发布，载荷为新规则
    Setup,
    /// 首次 setup 成功后发布一次
    Ready,
    /// 预留，当前不发布
    Hydrate,
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Setup => "setup",
            Self::Ready => "ready",
            Self::Hydrate => "hydrate",
        };
        write!(f, "{}", s)
    }
}

/// 引擎事件载荷
#[derive(Debug, Clone)]
pub enum HookPayload {
    Setup(Arc<Rules>),
    Ready,
    Hydrate,
}

impl HookPayload {
    /// setup 事件携带的规则
    pub fn rules(&self) -> Option<&Rules> {
        match self {
            Self::Setup(rules) => Some(rules),
            _ => None,
        }
    }
}

type ListenerFn<A> = dyn Fn(&A) -> anyhow::Result<()> + Send + Sync;

/// 监听器句柄
///
/// 克隆共享同一个底层函数，`remove_hook` 按指针身份匹配。
pub struct Listener<A>(Arc<ListenerFn<A>>);

impl<A> Listener<A> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&A) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<A> Clone for Listener<A> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<A> fmt::Debug for Listener<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Listener(..)")
    }
}

struct Entry<A> {
    id: u64,
    listener: Listener<A>,
}

type Channels<K, A> = HashMap<K, Vec<Entry<A>>>;

/// 命名通道钩子注册表
pub struct HookBus<K, A> {
    channels: Arc<Mutex<Channels<K, A>>>,
    next_id: Arc<AtomicU64>,
}

impl<K, A> Clone for HookBus<K, A> {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<K, A> HookBus<K, A>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    A: 'static,
{
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 注册监听器，返回只注销本次注册的句柄
    pub fn hook<F>(&self, name: K, f: F) -> Unhook<K, A>
    where
        F: Fn(&A) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hook_listener(name, Listener::new(f))
    }

    /// 注册已有的监听器句柄，便于之后通过 `remove_hook` 注销
    pub fn hook_listener(&self, name: K, listener: Listener<A>) -> Unhook<K, A> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.push(name, id, listener)
    }

    /// 注册只触发一次的监听器，首次调用前先注销自身
    pub fn hook_once<F>(&self, name: K, f: F) -> Unhook<K, A>
    where
        F: Fn(&A) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let channels = Arc::downgrade(&self.channels);
        let key = name.clone();
        let fired = AtomicBool::new(false);

        let wrapper = Listener::new(move |args: &A| {
            if fired.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            if let Some(channels) = channels.upgrade() {
                remove_entry(&channels, &key, id);
            }
            f(args)
        });

        self.push(name, id, wrapper)
    }

    /// 注销指定监听器（同一句柄注册多次时只移除最早的一次）
    pub fn remove_hook(&self, name: &K, listener: &Listener<A>) -> bool {
        let mut channels = self.channels.lock();
        let Some(entries) = channels.get_mut(name) else {
            return false;
        };

        let Some(pos) = entries.iter().position(|e| e.listener.same(listener)) else {
            return false;
        };
        entries.remove(pos);
        if entries.is_empty() {
            channels.remove(name);
        }
        true
    }

    /// 清空单个通道
    pub fn clear_hook(&self, name: &K) {
        self.channels.lock().remove(name);
    }

    /// 清空全部通道
    pub fn clear_all_hooks(&self) {
        self.channels.lock().clear();
    }

    /// 按注册顺序同步调用通道内的全部监听器
    ///
    /// 没有监听器时为空操作；任一监听器失败立即返回该错误，后续监听器不再调用。
    pub fn call_hook(&self, name: &K, args: &A) -> anyhow::Result<()> {
        let snapshot: Vec<Listener<A>> = {
            let channels = self.channels.lock();
            match channels.get(name) {
                Some(entries) => entries.iter().map(|e| e.listener.clone()).collect(),
                None => return Ok(()),
            }
        };

        for listener in snapshot {
            (listener.0)(args)?;
        }
        Ok(())
    }

    /// 通道是否有监听器
    pub fn has_hooks(&self, name: &K) -> bool {
        self.channels
            .lock()
            .get(name)
            .is_some_and(|entries| !entries.is_empty())
    }

    /// 全部通道的监听器总数
    pub fn len(&self) -> usize {
        self.channels.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, name: K, id: u64, listener: Listener<A>) -> Unhook<K, A> {
        self.channels
            .lock()
            .entry(name.clone())
            .or_default()
            .push(Entry { id, listener });

        Unhook {
            channels: Arc::downgrade(&self.channels),
            name,
            id,
        }
    }
}

impl<K, A> Default for HookBus<K, A>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    A: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// 注销句柄，只移除与之对应的那一次注册
pub struct Unhook<K, A> {
    channels: Weak<Mutex<Channels<K, A>>>,
    name: K,
    id: u64,
}

impl<K: Eq + Hash, A> Unhook<K, A> {
    /// 注销监听器，返回是否确实移除了（已触发的 once 监听器返回 false）
    pub fn unhook(self) -> bool {
        match self.channels.upgrade() {
            Some(channels) => remove_entry(&channels, &self.name, self.id),
            None => false,
        }
    }
}

fn remove_entry<K: Eq + Hash, A>(channels: &Mutex<Channels<K, A>>, name: &K, id: u64) -> bool {
    let mut channels = channels.lock();
    let Some(entries) = channels.get_mut(name) else {
        return false;
    };

    let Some(pos) = entries.iter().position(|e| e.id == id) else {
        return false;
    };
    entries.remove(pos);
    if entries.is_empty() {
        channels.remove(name);
    }
    true
}
