use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

type Interrupt = Box<dyn Fn() + Send>;

#[derive(Default)]
struct Inner {
    requested: Mutex<bool>,
    wake: Condvar,
    interrupt: Mutex<Option<Interrupt>>,
}

/// Stop request shared between the signal handler and the watcher loop.
///
/// Triggering it wakes a pending [`Shutdown::sleep`] and runs the registered
/// interrupt, which the daemon client uses to unblock its socket read.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        *self.inner.requested.lock() = true;
        self.inner.wake.notify_all();

        if let Some(interrupt) = self.inner.interrupt.lock().as_ref() {
            interrupt();
        }
    }

    pub fn is_requested(&self) -> bool {
        *self.inner.requested.lock()
    }

    /// Sleep for `duration` or until triggered. Returns true when triggered.
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut requested = self.inner.requested.lock();
        if !*requested {
            let _ = self
                .inner
                .wake
                .wait_while_for(&mut requested, |requested| !*requested, duration);
        }
        *requested
    }

    /// Install the action that unblocks the current blocking call
    pub fn set_interrupt(&self, interrupt: impl Fn() + Send + 'static) {
        *self.inner.interrupt.lock() = Some(Box::new(interrupt));
    }

    pub fn clear_interrupt(&self) {
        self.inner.interrupt.lock().take();
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("requested", &self.is_requested())
            .finish()
    }
}
