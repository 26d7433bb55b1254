use std::sync::atomic::{AtomicU64, Ordering};

const MARK: u64 = 1;

/// The resize owner token of the refinable set: a `(owner, mark)` pair
/// packed into a single atomic word so that both fields transition together
/// in one compare-and-swap.
///
/// The low bit is the mark, the remaining bits hold a crate-assigned thread
/// id (ids start at 1, so an all-zero word reads as "no owner, unmarked").
/// Only two states are reachable: `(none, false)` and `(owner, true)`.
pub(crate) struct OwnerToken {
    state: AtomicU64,
}

impl OwnerToken {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU64::new(0),
        }
    }

    /// Returns `true` while a resize is marked in progress by a thread other
    /// than the caller.
    pub(crate) fn is_held_by_other(&self) -> bool {
        let state = self.state.load(Ordering::SeqCst);
        state & MARK == MARK && state >> 1 != current_thread_id()
    }

    /// Attempts the `(none, false)` to `(caller, true)` transition.
    /// Fails if any resize is already marked.
    pub(crate) fn try_acquire(&self) -> bool {
        let marked = (current_thread_id() << 1) | MARK;
        self.state
            .compare_exchange(0, marked, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Restores the token to `(none, false)`.
    ///
    /// Must only be called by the thread whose `try_acquire` succeeded.
    pub(crate) fn release(&self) {
        debug_assert_eq!(self.state.load(Ordering::SeqCst) >> 1, current_thread_id());
        self.state.store(0, Ordering::SeqCst);
    }
}

/// A small nonzero id for the calling thread. `std::thread::ThreadId` has no
/// stable integer form, so ids are handed out from a global counter the
/// first time a thread asks.
fn current_thread_id() -> u64 {
    static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

    thread_local! {
        static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    }

    THREAD_ID.with(|id| *id)
}
