//! Cooperative locks for containers shared between peers.
//!
//! A lock request never blocks. It hands back a future that resolves to
//! granted/denied once the owner answers. `LockAcquisition` joins the requests
//! for every shared container a craft touches, and `LockSet` holds the granted
//! locks and releases them when dropped, on every exit path.

use bevy::log::{debug, warn};
use bevy::tasks::{block_on, futures_lite::future};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use super::CraftingError;
use crate::shared::SourceId;

/// Resolves to `true` when the lock is granted, `false` when refused.
pub type LockFuture = Pin<Box<dyn Future<Output = bool> + Send + Sync>>;

/// The opaque lock primitive a shared container exposes.
pub trait ContainerLock: Send + Sync {
    /// Issue a lock request. Must not block.
    fn request(&self) -> LockFuture;

    /// Give the lock back. Only called for granted requests.
    fn release(&self);

    /// Withdraw a request that has not been answered. If the owner grants it
    /// anyway, that grant must be handed straight back.
    fn abandon(&self);
}

#[derive(Clone)]
pub struct LockHandle(Arc<dyn ContainerLock>);

impl LockHandle {
    pub fn new(lock: impl ContainerLock + 'static) -> Self {
        Self(Arc::new(lock))
    }

    pub fn from_arc(lock: Arc<dyn ContainerLock>) -> Self {
        Self(lock)
    }

    pub fn request(&self) -> LockFuture {
        self.0.request()
    }

    pub fn release(&self) {
        self.0.release();
    }

    pub fn abandon(&self) {
        self.0.abandon();
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LockHandle(..)")
    }
}

/// In-process mutex lock: granted immediately when free, refused when held.
#[derive(Debug, Default)]
pub struct LocalContainerLock {
    held: AtomicBool,
}

impl LocalContainerLock {
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

impl ContainerLock for LocalContainerLock {
    fn request(&self) -> LockFuture {
        let granted = self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        Box::pin(std::future::ready(granted))
    }

    fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    // Answers at request time, so nothing is ever left outstanding.
    fn abandon(&self) {}
}

impl ContainerLock for Arc<LocalContainerLock> {
    fn request(&self) -> LockFuture {
        self.as_ref().request()
    }

    fn release(&self) {
        self.as_ref().release();
    }

    fn abandon(&self) {
        self.as_ref().abandon();
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// LOCK SET
// ──────────────────────────────────────────────────────────────────────────────

/// Locks currently held for one transaction. Released on drop.
#[derive(Debug, Default)]
pub struct LockSet {
    held: Vec<(SourceId, LockHandle)>,
}

impl LockSet {
    /// A set for transactions that touch no shared container.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn holds(&self, source: SourceId) -> bool {
        self.held.iter().any(|(id, _)| *id == source)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        for (id, handle) in self.held.drain(..) {
            debug!("Releasing lock on container {}", id);
            handle.release();
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// ACQUISITION
// ──────────────────────────────────────────────────────────────────────────────

struct PendingLock {
    source: SourceId,
    handle: LockHandle,
    reply: LockFuture,
}

/// Future over every lock a transaction needs. Resolves to the full `LockSet`,
/// or to `LockUnavailable` as soon as one request is refused. Dropping it
/// before completion releases whatever was already granted and withdraws
/// every request still outstanding.
pub struct LockAcquisition {
    pending: Vec<PendingLock>,
    acquired: LockSet,
}

impl LockAcquisition {
    pub fn new(handles: impl IntoIterator<Item = (SourceId, LockHandle)>) -> Self {
        let pending = handles
            .into_iter()
            .map(|(source, handle)| PendingLock {
                source,
                reply: handle.request(),
                handle,
            })
            .collect();
        Self {
            pending,
            acquired: LockSet::none(),
        }
    }

    /// Containers still waiting for an answer.
    pub fn waiting_on(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.pending.iter().map(|p| p.source)
    }

    pub fn is_waiting(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Settle every outstanding request: grants that have arrived are given
    /// back, silent ones are abandoned.
    fn withdraw_pending(&mut self) {
        for mut request in self.pending.drain(..) {
            match block_on(future::poll_once(request.reply.as_mut())) {
                Some(true) => {
                    debug!("Returning late grant on container {}", request.source);
                    request.handle.release();
                }
                Some(false) => {}
                None => {
                    debug!("Withdrawing lock request on container {}", request.source);
                    request.handle.abandon();
                }
            }
        }
    }

    /// Poll once without waiting. A lock that hasn't answered yet counts as unavailable.
    pub fn try_now(mut self) -> Result<LockSet, CraftingError> {
        match block_on(future::poll_once(&mut self)) {
            Some(result) => result,
            None => {
                let container = self.waiting_on().next().unwrap_or(SourceId::PLAYER);
                warn!("Container {} did not grant its lock immediately", container);
                Err(CraftingError::LockUnavailable { container })
            }
        }
    }
}

impl Future for LockAcquisition {
    type Output = Result<LockSet, CraftingError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut i = 0;
        while i < this.pending.len() {
            match this.pending[i].reply.as_mut().poll(cx) {
                Poll::Ready(true) => {
                    let granted = this.pending.remove(i);
                    debug!("Lock granted on container {}", granted.source);
                    this.acquired.held.push((granted.source, granted.handle));
                }
                Poll::Ready(false) => {
                    let container = this.pending.remove(i).source;
                    warn!("Lock refused on container {}", container);
                    // Drop everything granted so far.
                    this.acquired = LockSet::none();
                    this.withdraw_pending();
                    return Poll::Ready(Err(CraftingError::LockUnavailable { container }));
                }
                Poll::Pending => i += 1,
            }
        }

        if this.pending.is_empty() {
            Poll::Ready(Ok(std::mem::take(&mut this.acquired)))
        } else {
            Poll::Pending
        }
    }
}

impl Drop for LockAcquisition {
    fn drop(&mut self) {
        self.withdraw_pending();
    }
}

impl fmt::Debug for LockAcquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockAcquisition")
            .field("waiting_on", &self.waiting_on().collect::<Vec<_>>())
            .field("acquired", &self.acquired.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// A peer-owned lock whose answer arrives whenever the test decides.
    #[derive(Default)]
    pub(crate) struct RemoteLock {
        pub answer: Mutex<Option<bool>>,
        pub released: AtomicUsize,
        pub abandoned: AtomicUsize,
    }

    struct RemoteReply(Arc<RemoteLock>);

    impl Future for RemoteReply {
        type Output = bool;

        fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<bool> {
            match *self.0.answer.lock().unwrap() {
                Some(granted) => Poll::Ready(granted),
                None => Poll::Pending,
            }
        }
    }

    impl ContainerLock for Arc<RemoteLock> {
        fn request(&self) -> LockFuture {
            Box::pin(RemoteReply(self.clone()))
        }

        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }

        fn abandon(&self) {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn poll_once(acq: &mut LockAcquisition) -> Option<Result<LockSet, CraftingError>> {
        block_on(future::poll_once(acq))
    }

    #[test]
    fn test_local_lock_grants_once() {
        let lock = Arc::new(LocalContainerLock::default());
        let handle = LockHandle::new(lock.clone());

        let first = LockAcquisition::new([(SourceId(1), handle.clone())]).try_now();
        assert!(first.is_ok());
        assert!(lock.is_held());

        let second = LockAcquisition::new([(SourceId(1), handle.clone())]).try_now();
        assert_eq!(
            second.unwrap_err(),
            CraftingError::LockUnavailable { container: SourceId(1) }
        );

        drop(first);
        assert!(!lock.is_held(), "dropping the LockSet releases the lock");
    }

    #[test]
    fn test_acquisition_waits_for_all_locks() {
        let remote = Arc::new(RemoteLock::default());
        let local = Arc::new(LocalContainerLock::default());
        let mut acq = LockAcquisition::new([
            (SourceId(1), LockHandle::new(local.clone())),
            (SourceId(2), LockHandle::new(remote.clone())),
        ]);

        assert!(poll_once(&mut acq).is_none());
        assert_eq!(acq.waiting_on().collect::<Vec<_>>(), vec![SourceId(2)]);

        *remote.answer.lock().unwrap() = Some(true);
        let Some(Ok(set)) = poll_once(&mut acq) else {
            panic!("acquisition should complete once every lock is granted");
        };
        assert!(set.holds(SourceId(1)) && set.holds(SourceId(2)));
        drop(set);
        assert!(!local.is_held());
        assert_eq!(remote.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refusal_releases_granted_locks() {
        let remote = Arc::new(RemoteLock::default());
        *remote.answer.lock().unwrap() = Some(false);
        let local = Arc::new(LocalContainerLock::default());

        let result = LockAcquisition::new([
            (SourceId(1), LockHandle::new(local.clone())),
            (SourceId(3), LockHandle::new(remote.clone())),
        ])
        .try_now();

        assert_eq!(
            result.unwrap_err(),
            CraftingError::LockUnavailable { container: SourceId(3) }
        );
        assert!(!local.is_held(), "earlier grant must be rolled back");
        assert_eq!(remote.released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropping_pending_acquisition_releases() {
        let remote = Arc::new(RemoteLock::default());
        let local = Arc::new(LocalContainerLock::default());
        let mut acq = LockAcquisition::new([
            (SourceId(1), LockHandle::new(local.clone())),
            (SourceId(2), LockHandle::new(remote.clone())),
        ]);
        assert!(poll_once(&mut acq).is_none());
        assert!(local.is_held());

        drop(acq);
        assert!(!local.is_held());
        assert_eq!(remote.abandoned.load(Ordering::SeqCst), 1);
        assert_eq!(remote.released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropping_unpolled_acquisition_frees_local_lock() {
        let local = Arc::new(LocalContainerLock::default());
        let acq = LockAcquisition::new([(SourceId(1), LockHandle::new(local.clone()))]);
        assert!(local.is_held(), "taken at request time");
        drop(acq);
        assert!(!local.is_held());
    }

    #[test]
    fn test_refusal_withdraws_other_outstanding_requests() {
        let refusing = Arc::new(RemoteLock::default());
        *refusing.answer.lock().unwrap() = Some(false);
        let silent = Arc::new(RemoteLock::default());
        let mut acq = LockAcquisition::new([
            (SourceId(1), LockHandle::new(refusing.clone())),
            (SourceId(2), LockHandle::new(silent.clone())),
        ]);

        assert!(matches!(poll_once(&mut acq), Some(Err(_))));
        assert_eq!(silent.abandoned.load(Ordering::SeqCst), 1);
        assert_eq!(refusing.abandoned.load(Ordering::SeqCst), 0);
        drop(acq);
        assert_eq!(silent.abandoned.load(Ordering::SeqCst), 1, "withdrawn once");
    }

    #[test]
    fn test_try_now_treats_silence_as_unavailable() {
        let remote = Arc::new(RemoteLock::default());
        let result = LockAcquisition::new([(SourceId(4), LockHandle::new(remote.clone()))]).try_now();
        assert_eq!(
            result.unwrap_err(),
            CraftingError::LockUnavailable { container: SourceId(4) }
        );
        assert_eq!(remote.abandoned.load(Ordering::SeqCst), 1);
    }
}
