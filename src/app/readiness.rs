//! Connectivity readiness, shared by every task.
//!
//! Two bits in the style of an RTOS event group: `LINK_UP` (network
//! attached with an address) and `SESSION_READY` (broker session connected
//! and command topic subscribed). Any number of tasks may block on a bit;
//! every change wakes all waiters so each re-checks its own condition.

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::waitqueue::MultiWakerRegistration;

const LINK_UP: u8 = 0b01;
const SESSION_READY: u8 = 0b10;

/// Upper bound on concurrently blocked waiters (session manager, publisher,
/// plus headroom).
const MAX_WAITERS: usize = 4;

/// Collapsed view of the two bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    LinkDown,
    LinkUp,
    SessionReady,
}

struct Inner {
    bits: u8,
    waiters: MultiWakerRegistration<MAX_WAITERS>,
}

pub struct ReadinessSignal {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner>>,
}

impl ReadinessSignal {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                bits: 0,
                waiters: MultiWakerRegistration::new(),
            })),
        }
    }

    pub fn set_link_up(&self) {
        self.update(|bits| bits | LINK_UP);
    }

    /// Losing the link also drops session readiness.
    pub fn clear_link_up(&self) {
        self.update(|bits| bits & !(LINK_UP | SESSION_READY));
    }

    pub fn set_session_ready(&self) {
        self.update(|bits| bits | SESSION_READY);
    }

    pub fn clear_session_ready(&self) {
        self.update(|bits| bits & !SESSION_READY);
    }

    pub fn is_link_up(&self) -> bool {
        self.bits() & LINK_UP != 0
    }

    pub fn is_session_ready(&self) -> bool {
        self.bits() & SESSION_READY != 0
    }

    pub fn state(&self) -> Readiness {
        let bits = self.bits();
        if bits & LINK_UP == 0 {
            Readiness::LinkDown
        } else if bits & SESSION_READY == 0 {
            Readiness::LinkUp
        } else {
            Readiness::SessionReady
        }
    }

    /// Resolve once the link-up bit is set.
    pub async fn wait_link_up(&self) {
        self.wait_for(LINK_UP).await;
    }

    /// Resolve once the session-ready bit is set.
    pub async fn wait_session_ready(&self) {
        self.wait_for(SESSION_READY).await;
    }

    fn bits(&self) -> u8 {
        self.inner.lock(|inner| inner.borrow().bits)
    }

    fn update(&self, f: impl FnOnce(u8) -> u8) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let next = f(inner.bits);
            if next != inner.bits {
                inner.bits = next;
                inner.waiters.wake();
            }
        });
    }

    async fn wait_for(&self, mask: u8) {
        poll_fn(|cx| {
            self.inner.lock(|inner| {
                let mut inner = inner.borrow_mut();
                if inner.bits & mask == mask {
                    Poll::Ready(())
                } else {
                    inner.waiters.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await;
    }
}

impl Default for ReadinessSignal {
    fn default() -> Self {
        Self::new()
    }
}
