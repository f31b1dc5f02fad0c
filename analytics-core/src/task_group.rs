//! 任务组（TaskGroup）
//!
//! 并发屏障：`run` 立即在运行时上启动异步操作并计入在途集合，操作结束（成功、失败、panic
//! 或被中止）时移出；`done` 在在途集合为空时返回，等待期间新登记的操作同样会被等待。
//! 不需要预先知道操作数量，也不阻塞等待期间的新登记。
//!
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct TaskGroup {
    in_flight: Arc<watch::Sender<usize>>,
}

impl Default for TaskGroup {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            in_flight: Arc::new(tx),
        }
    }
}

/// 任务结束时（包括 unwind）递减计数
struct SettleGuard(Arc<watch::Sender<usize>>);

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动并跟踪一个操作，须在 tokio 运行时内调用
    pub fn run<F>(&self, op: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.in_flight.send_modify(|n| *n += 1);
        let guard = SettleGuard(self.in_flight.clone());
        tokio::spawn(async move {
            let _guard = guard;
            op.await
        })
    }

    /// 等待在途集合清空
    pub async fn done(&self) {
        let mut rx = self.in_flight.subscribe();
        // 发送端由 self 持有，wait_for 不会因通道关闭而返回错误
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    pub fn len(&self) -> usize {
        *self.in_flight.borrow()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn done_resolves_immediately_when_idle() {
        let group = TaskGroup::new();
        tokio::time::timeout(Duration::from_millis(100), group.done())
            .await
            .expect("idle group must be done");
    }

    #[tokio::test(start_paused = true)]
    async fn done_waits_for_all_registered_operations() {
        let group = TaskGroup::new();
        let finished = Arc::new(AtomicUsize::new(0));
        for ms in [30, 10, 20] {
            let finished = finished.clone();
            group.run(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(group.len(), 3);
        group.done().await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn done_waits_for_operations_registered_while_waiting() {
        let group = TaskGroup::new();
        let (release_first, first_rx) = oneshot::channel::<()>();
        let (release_second, second_rx) = oneshot::channel::<()>();

        group.run(async move {
            let _ = first_rx.await;
        });

        let waiter = {
            let group = group.clone();
            tokio::spawn(async move { group.done().await })
        };

        // 等待期间登记新操作，再结束第一个
        group.run(async move {
            let _ = second_rx.await;
        });
        release_first.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        release_second.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("done must resolve once the set is empty")
            .unwrap();
    }

    #[tokio::test]
    async fn failed_and_panicking_operations_are_untracked() {
        let group = TaskGroup::new();
        let failing = group.run(async { Err::<(), &str>("nope") });
        let panicking = group.run(async {
            if true {
                panic!("op boom");
            }
        });

        assert_eq!(failing.await.unwrap(), Err("nope"));
        assert!(panicking.await.is_err());
        tokio::time::timeout(Duration::from_secs(1), group.done())
            .await
            .expect("settled operations must leave the set");
    }
}
