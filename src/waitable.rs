use core::cell::Cell;

use enumset::EnumSet;

use crate::event::Readiness;
#[cfg(windows)]
use crate::event::Event;

/// The native wait handle of a waitable.
#[cfg(unix)]
pub type Handle = std::os::fd::RawFd;

/// The native wait handle of a waitable.
#[cfg(windows)]
pub type Handle = std::os::windows::io::RawHandle;

/// Bookkeeping a wait set keeps on each waitable it has registered.
///
/// A waitable embeds one of these and hands it out through
/// [`Waitable::state`]. Only the wait set holding the registration writes to
/// it; everyone else can only read.
#[derive(Debug, Default)]
pub struct WaitableState {
    registered: Cell<bool>,
    observed: Cell<EnumSet<Readiness>>,
}

impl WaitableState {
    pub const fn new() -> Self {
        Self {
            registered: Cell::new(false),
            observed: Cell::new(EnumSet::empty()),
        }
    }

    /// Whether the owning waitable is registered in some wait set.
    pub fn is_registered(&self) -> bool {
        self.registered.get()
    }

    /// The conditions seen by the last wait that reported the waitable.
    pub fn observed(&self) -> EnumSet<Readiness> {
        self.observed.get()
    }

    pub(crate) fn set_registered(&self, registered: bool) {
        self.registered.set(registered);
    }

    pub(crate) fn set_observed(&self, observed: EnumSet<Readiness>) {
        self.observed.set(observed);
    }
}

/// A resource a [`WaitSet`](crate::WaitSet) can watch.
///
/// The handle returned by [`handle`](Self::handle) must stay valid and
/// unchanged for as long as the waitable is registered.
pub trait Waitable {
    fn handle(&self) -> Handle;

    fn state(&self) -> &WaitableState;

    /// Associates the handle with `interest`, so that the handle becomes
    /// signaled once any of the conditions holds. An empty set dissociates it.
    #[cfg(windows)]
    fn set_waiting_events(&self, interest: EnumSet<Event>) -> std::io::Result<()>;

    /// Called after the handle was signaled; returns the conditions that
    /// actually hold and resets the signal.
    #[cfg(windows)]
    fn check_signaled(&self) -> EnumSet<Readiness>;

    fn is_registered(&self) -> bool {
        self.state().is_registered()
    }

    fn observed(&self) -> EnumSet<Readiness> {
        self.state().observed()
    }
}

/// Whether `a` and `b` are the same waitable instance.
pub(crate) fn same(a: &dyn Waitable, b: &dyn Waitable) -> bool {
    let a: *const _ = a;
    let b: *const _ = b;

    core::ptr::addr_eq(a, b)
}
