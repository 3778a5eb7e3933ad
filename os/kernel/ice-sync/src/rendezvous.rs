use core::{
    hint::spin_loop,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// Park barrier for the CPUs that are not running the session.
///
/// The session CPU calls [`request_park`](Self::request_park) and signals the
/// others; each of them calls [`park`](Self::park) from its signal handler.
/// `park` returns only after [`release`](Self::release) has been called.
/// There is no timeout: a session can last as long as the operator likes.
pub struct CpuRendezvous {
    hold: AtomicBool,
    parked: AtomicUsize,
}

impl Default for CpuRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuRendezvous {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hold: AtomicBool::new(false),
            parked: AtomicUsize::new(0),
        }
    }

    /// Close the barrier. CPUs calling [`park`](Self::park) from now on will spin.
    #[inline]
    pub fn request_park(&self) {
        self.hold.store(true, Ordering::Release);
    }

    /// Spin until released. Returns immediately if the barrier is open.
    pub fn park(&self) {
        self.parked.fetch_add(1, Ordering::AcqRel);
        while self.hold.load(Ordering::Acquire) {
            spin_loop();
        }
        self.parked.fetch_sub(1, Ordering::AcqRel);
    }

    /// Open the barrier; every parked CPU resumes.
    #[inline]
    pub fn release(&self) {
        self.hold.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_holding(&self) -> bool {
        self.hold.load(Ordering::Acquire)
    }

    /// CPUs currently spinning in [`park`](Self::park).
    #[inline]
    pub fn parked(&self) -> usize {
        self.parked.load(Ordering::Acquire)
    }
}
