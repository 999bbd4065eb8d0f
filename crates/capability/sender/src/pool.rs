use crate::error::SenderError;
use std::future::Future;
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// 连接级通道池。
///
/// 每次发布租用一个通道，同一通道不会同时交给两个调用方；
/// 通道按需创建，总数受 `max` 限制，成功后归还，失败直接丢弃。
pub struct ChannelPool<T> {
    idle: Mutex<Vec<T>>,
    permits: Arc<Semaphore>,
    max: usize,
}

/// 一次租用。离开作用域即释放名额。
pub struct Lease<T> {
    item: T,
    _permit: OwnedSemaphorePermit,
}

impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Send> ChannelPool<T> {
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// 租用通道：优先复用健康的空闲通道，否则调用 `create` 新建。
    pub async fn lease<H, F, Fut>(&self, healthy: H, create: F) -> Result<Lease<T>, SenderError>
    where
        H: Fn(&T) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SenderError>>,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| SenderError::NotConnected)?;
        if let Some(item) = self.pop_healthy(&healthy) {
            return Ok(Lease {
                item,
                _permit: permit,
            });
        }
        let item = create().await?;
        Ok(Lease {
            item,
            _permit: permit,
        })
    }

    /// 归还通道供后续复用。
    pub fn release(&self, lease: Lease<T>) {
        let Lease { item, _permit } = lease;
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(item);
        }
    }

    /// 取出全部空闲通道（关闭连接时使用）。
    pub fn drain(&self) -> Vec<T> {
        self.idle
            .lock()
            .map(|mut idle| std::mem::take(&mut *idle))
            .unwrap_or_default()
    }

    fn pop_healthy<H: Fn(&T) -> bool>(&self, healthy: &H) -> Option<T> {
        let mut idle = self.idle.lock().ok()?;
        while let Some(item) = idle.pop() {
            if healthy(&item) {
                return Some(item);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn released_channel_is_reused() {
        let pool = ChannelPool::new(2);
        let counter = AtomicUsize::new(0);
        let created = &counter;
        let make = move || async move {
            Ok::<_, SenderError>(created.fetch_add(1, Ordering::SeqCst))
        };

        let first = pool.lease(|_| true, make).await.expect("lease");
        assert_eq!(*first, 0);
        pool.release(first);
        let again = pool.lease(|_| true, make).await.expect("lease");
        assert_eq!(*again, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_leases_get_distinct_channels() {
        let pool = ChannelPool::new(4);
        let counter = AtomicUsize::new(0);
        let created = &counter;
        let make = move || async move {
            Ok::<_, SenderError>(created.fetch_add(1, Ordering::SeqCst))
        };
        let a = pool.lease(|_| true, make).await.expect("lease");
        let b = pool.lease(|_| true, make).await.expect("lease");
        assert_ne!(*a, *b);
    }

    #[tokio::test]
    async fn unhealthy_idle_channels_are_discarded() {
        let pool = ChannelPool::new(2);
        let stale = pool
            .lease(|_| true, || async { Ok::<_, SenderError>(-1i32) })
            .await
            .expect("lease");
        pool.release(stale);
        let fresh = pool
            .lease(|v: &i32| *v >= 0, || async { Ok::<_, SenderError>(7) })
            .await
            .expect("lease");
        assert_eq!(*fresh, 7);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn lease_waits_when_pool_is_exhausted() {
        let pool = ChannelPool::new(1);
        let held = pool
            .lease(|_| true, || async { Ok::<_, SenderError>(1u8) })
            .await
            .expect("lease");
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            pool.lease(|_| true, || async { Ok::<_, SenderError>(2u8) }),
        )
        .await;
        assert!(blocked.is_err());
        drop(held);
        let next = pool
            .lease(|_| true, || async { Ok::<_, SenderError>(3u8) })
            .await
            .expect("lease");
        assert_eq!(*next, 3);
    }

    #[test]
    fn drain_empties_idle_list() {
        let pool: ChannelPool<u8> = ChannelPool::new(0);
        assert_eq!(pool.max(), 1);
        assert!(pool.drain().is_empty());
    }
}
