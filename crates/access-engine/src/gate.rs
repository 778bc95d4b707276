//! 一次性就绪闸门
//!
//! 首次安装规则时打开，之后永不重新关闭。所有等待者共享同一个信号，
//! 闸门打开时一起被唤醒。闸门本身不提供超时或取消，调用方可以用
//! `tokio::time::timeout` 等方式包裹等待。

use tokio::sync::watch;

#[derive(Debug)]
pub struct AsyncGate {
    tx: watch::Sender<bool>,
}

impl AsyncGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// 打开闸门，返回本次调用是否真正完成了打开
    pub fn open(&self) -> bool {
        self.tx.send_if_modified(|open| {
            if *open {
                false
            } else {
                *open = true;
                true
            }
        })
    }

    /// 闸门是否已打开（不挂起）
    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// 挂起直到闸门打开；已打开时立即返回
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // 发送端由 self 持有，等待期间不会关闭
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for AsyncGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::task;
    use tokio_test::{assert_pending, assert_ready};

    #[test]
    fn test_open_once() {
        let gate = AsyncGate::new();
        assert!(!gate.is_open());

        assert!(gate.open());
        assert!(!gate.open());
        assert!(gate.is_open());
    }

    #[test]
    fn test_waiters_released_together() {
        let gate = AsyncGate::new();
        let mut first = task::spawn(gate.wait());
        let mut second = task::spawn(gate.wait());

        assert_pending!(first.poll());
        assert_pending!(second.poll());

        gate.open();

        assert!(first.is_woken());
        assert!(second.is_woken());
        assert_ready!(first.poll());
        assert_ready!(second.poll());
    }

    #[test]
    fn test_wait_after_open_is_immediate() {
        let gate = AsyncGate::new();
        gate.open();

        let mut waiter = task::spawn(gate.wait());
        assert_ready!(waiter.poll());
    }
}
