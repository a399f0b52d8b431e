//! Screen wake lock: at most one live sentinel per page, re-acquired when
//! the tab becomes visible again after the OS revoked it.

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WakeLockError {
    #[error("wake lock request rejected: {0}")]
    Rejected(String),
    #[error("wake lock release failed: {0}")]
    Release(String),
}

#[allow(async_fn_in_trait)]
pub trait WakeLockSentinel {
    /// Set by the platform when it revokes the lock (tab hidden, power saving).
    fn released(&self) -> bool;
    async fn release(&self) -> Result<(), WakeLockError>;
}

#[allow(async_fn_in_trait)]
pub trait WakeLockApi {
    type Sentinel: WakeLockSentinel;

    fn is_supported(&self) -> bool;
    async fn request(&self) -> Result<Self::Sentinel, WakeLockError>;
}

struct LockState<S> {
    handle: Option<S>,
    requesting: bool,
    /// `release()` arrived while a request was in flight.
    release_pending: bool,
}

/// Cloneable service handle around the page's single wake lock.
pub struct WakeLockCoordinator<A: WakeLockApi> {
    api: Rc<A>,
    state: Rc<RefCell<LockState<A::Sentinel>>>,
}

impl<A: WakeLockApi> Clone for WakeLockCoordinator<A> {
    fn clone(&self) -> Self {
        Self {
            api: Rc::clone(&self.api),
            state: Rc::clone(&self.state),
        }
    }
}

impl<A: WakeLockApi> WakeLockCoordinator<A> {
    pub fn new(api: A) -> Self {
        Self {
            api: Rc::new(api),
            state: Rc::new(RefCell::new(LockState {
                handle: None,
                requesting: false,
                release_pending: false,
            })),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// True while a live, unreleased lock is held.
    pub fn is_held(&self) -> bool {
        self.state
            .borrow()
            .handle
            .as_ref()
            .is_some_and(|h| !h.released())
    }

    /// Acquire the lock unless unsupported or already held. Failures are
    /// logged and never reach the caller.
    pub async fn ensure(&self) {
        if !self.api.is_supported() {
            return;
        }
        {
            let mut st = self.state.borrow_mut();
            if st.requesting {
                // A newer ensure overrides a release made while the request
                // was in flight; the handle it brings back is kept.
                st.release_pending = false;
                return;
            }
            if st.handle.as_ref().is_some_and(|h| !h.released()) {
                return;
            }
            st.requesting = true;
            st.release_pending = false;
        }

        let result = self.api.request().await;

        let late_release = {
            let mut st = self.state.borrow_mut();
            st.requesting = false;
            match result {
                Ok(sentinel) if st.release_pending => {
                    st.release_pending = false;
                    Some(sentinel)
                }
                Ok(sentinel) => {
                    st.handle = Some(sentinel);
                    log::info!("Wake lock acquired");
                    None
                }
                Err(e) => {
                    log::warn!("{e}");
                    None
                }
            }
        };

        if let Some(sentinel) = late_release {
            if let Err(e) = sentinel.release().await {
                log::warn!("{e}");
            }
        }
    }

    /// Release the held lock, if any and still live.
    pub async fn release(&self) {
        let handle = {
            let mut st = self.state.borrow_mut();
            if st.requesting {
                st.release_pending = true;
            }
            match st.handle.take() {
                Some(h) if !h.released() => Some(h),
                Some(_) | None => None,
            }
        };
        if let Some(handle) = handle {
            match handle.release().await {
                Ok(()) => log::info!("Wake lock released"),
                Err(e) => log::warn!("{e}"),
            }
        }
    }

    /// Visibility listener: re-acquire when the platform revoked the lock
    /// while the tab was hidden.
    pub async fn on_visibility_change(&self, visible: bool) {
        if !visible {
            return;
        }
        let revoked = self
            .state
            .borrow()
            .handle
            .as_ref()
            .is_some_and(|h| h.released());
        if revoked {
            log::info!("Re-acquiring wake lock after tab became visible");
            self.ensure().await;
        }
    }

    pub async fn dispose(&self) {
        self.release().await;
    }
}
