use core::time::Duration;

use std::time::Instant;

use enumset::EnumSet;
use log::{debug, error, trace, warn};

use crate::backend::{Backend, Native};
use crate::error::{Error, Result};
use crate::event::{self, Event, Readiness};
use crate::sys;
use crate::table::{Entry, Table};
use crate::waitable::Waitable;

/// A bounded set of waitables watched together for readiness.
///
/// Up to `N` waitables can be registered at once. Every registered waitable
/// is borrowed for `'a`, so it cannot be dropped while the set may still
/// report it.
///
/// A wait set is not synchronized. All calls on one instance must come from
/// one thread at a time.
///
/// Dropping a wait set that still has registrations is a caller bug: the
/// waitables would keep claiming to be registered. Remove everything first.
pub struct WaitSet<'a, const N: usize> {
    table: Table<'a, N>,
    /// Readiness gathered per slot during one wait; a slot can be hit by more
    /// than one native record.
    fired: [EnumSet<Readiness>; N],
    backend: Native<N>,
}

impl<'a, const N: usize> WaitSet<'a, N> {
    /// Creates an empty wait set and its native multiplexing object.
    pub fn new() -> Result<Self> {
        let backend = Native::<N>::open().map_err(Error::Resource)?;

        debug!("Wait set with capacity {N} created");

        Ok(Self {
            table: Table::new(),
            fired: [EnumSet::empty(); N],
            backend,
        })
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of registered waitables.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Whether `waitable` is registered in this set.
    pub fn contains(&self, waitable: &dyn Waitable) -> bool {
        self.table.find(waitable).is_some()
    }

    /// Registers `waitable` for the conditions in `interest`.
    ///
    /// Errors are reported whatever the interest, so an empty interest still
    /// watches the waitable for errors.
    ///
    /// Fails with `AlreadyRegistered` if the waitable is registered anywhere,
    /// `CapacityExceeded` if the set is full, and `RegistrationFailed` if the
    /// native backend rejects the handle. On failure nothing changes.
    pub fn add(&mut self, waitable: &'a dyn Waitable, interest: EnumSet<Event>) -> Result<()> {
        if waitable.is_registered() {
            return Err(Error::AlreadyRegistered);
        }

        let entry = Entry {
            waitable,
            handle: waitable.handle(),
            interest,
        };

        if self.table.is_full() {
            return Err(Error::CapacityExceeded);
        }

        let slot = self.table.insert(entry).ok_or(Error::CapacityExceeded)?;

        if let Err(e) = self.backend.register(slot, &entry) {
            self.table.remove(slot);

            debug!("Registering handle {:?} failed: {e}", entry.handle);
            return Err(Error::RegistrationFailed(e));
        }

        let state = waitable.state();
        state.set_observed(EnumSet::empty());
        state.set_registered(true);

        debug!(
            "Handle {:?} registered in slot {slot} for {interest:?}",
            entry.handle
        );

        Ok(())
    }

    /// Replaces the interest of a registered waitable.
    ///
    /// Conditions dropped from the interest are not reported by any later
    /// wait, and are cleared from the waitable's observed readiness now.
    pub fn change(&mut self, waitable: &dyn Waitable, interest: EnumSet<Event>) -> Result<()> {
        let slot = self.table.find(waitable).ok_or(Error::NotRegistered)?;
        let entry = self.table.get_mut(slot).ok_or(Error::NotRegistered)?;

        let updated = Entry { interest, ..*entry };

        self.backend
            .modify(slot, &updated)
            .map_err(Error::RegistrationFailed)?;

        *entry = updated;

        let state = waitable.state();
        state.set_observed(state.observed() & event::reportable(interest));

        debug!("Handle {:?} changed to {interest:?}", updated.handle);

        Ok(())
    }

    /// Deregisters `waitable`.
    ///
    /// Never fails. Removing a waitable that is not in this set only logs a
    /// warning, and a native deregistration failure (the handle may already
    /// be closed) is logged and otherwise ignored.
    pub fn remove(&mut self, waitable: &dyn Waitable) {
        let Some(slot) = self.table.find(waitable) else {
            warn!(
                "Handle {:?} is not registered in this wait set",
                waitable.handle()
            );
            return;
        };

        let Some(entry) = self.table.remove(slot) else {
            return;
        };

        if let Err(e) = self.backend.unregister(slot, &entry) {
            warn!(
                "Deregistering handle {:?} failed, ignoring: {e}",
                entry.handle
            );
        }

        let state = waitable.state();
        state.set_observed(EnumSet::empty());
        state.set_registered(false);

        debug!("Handle {:?} removed from slot {slot}", entry.handle);
    }

    /// Blocks until at least one registered waitable is ready, or until
    /// `timeout` elapses.
    ///
    /// `None` waits for as long as it takes. A timeout is honoured in whole
    /// milliseconds or finer, rounded up; `Duration::ZERO` polls without
    /// blocking.
    ///
    /// Returns how many distinct waitables are ready, 0 on timeout; a wait
    /// without a timeout never returns 0. Each of
    /// them has its observed readiness replaced with what fired; the others
    /// keep theirs. Interruptions by signals are retried internally.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<usize> {
        self.wait_with(timeout, |_| ())
    }

    /// Like [`wait`](Self::wait), additionally collecting each ready waitable
    /// exactly once into `out`, in no particular order.
    ///
    /// `out` is cleared first, and must have room for every registered
    /// waitable or the call fails with `BufferTooSmall` without waiting.
    pub fn wait_into<const M: usize>(
        &mut self,
        timeout: Option<Duration>,
        out: &mut heapless::Vec<&'a dyn Waitable, M>,
    ) -> Result<usize> {
        if self.table.is_empty() {
            return Err(Error::EmptySet);
        }

        if M < self.table.len() {
            return Err(Error::BufferTooSmall {
                required: self.table.len(),
                available: M,
            });
        }

        out.clear();

        // Cannot overflow: at most `len() <= M` distinct waitables are reported.
        self.wait_with(timeout, |waitable| {
            let _ = out.push(waitable);
        })
    }

    fn wait_with<F>(&mut self, timeout: Option<Duration>, mut triggered: F) -> Result<usize>
    where
        F: FnMut(&'a dyn Waitable),
    {
        if self.table.is_empty() {
            return Err(Error::EmptySet);
        }

        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut remaining = timeout;

        loop {
            self.poll(remaining)?;

            let count = self.collect(&mut triggered);

            trace!("{count} of {} waitables ready", self.table.len());

            if count > 0 {
                return Ok(count);
            }

            // Nothing reportable came back. That is the timeout, unless time
            // is left and every record was masked away.
            if let Some(deadline) = deadline {
                let left = deadline.saturating_duration_since(Instant::now());

                if left.is_zero() {
                    return Ok(0);
                }

                remaining = Some(left);
            }

            trace!("No reportable readiness, waiting again");
        }
    }

    fn poll(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.fired = [EnumSet::empty(); N];

        let table = &self.table;
        let backend = &mut self.backend;
        let fired = &mut self.fired;

        sys::retry_interrupted(timeout, |remaining| {
            backend.poll(table, remaining, |slot, readiness| {
                if let Some(fired) = fired.get_mut(slot) {
                    *fired |= readiness;
                }
            })
        })
        .map_err(Error::WaitFailed)
    }

    fn collect<F>(&self, triggered: &mut F) -> usize
    where
        F: FnMut(&'a dyn Waitable),
    {
        let mut count = 0;

        for (slot, entry) in self.table.iter() {
            // Records queued before a `change` may still carry conditions
            // that are no longer of interest.
            let readiness = self.fired[slot] & event::reportable(entry.interest);

            if readiness.is_empty() {
                continue;
            }

            entry.waitable.state().set_observed(readiness);
            triggered(entry.waitable);

            count += 1;
        }

        count
    }
}

impl<const N: usize> Drop for WaitSet<'_, N> {
    fn drop(&mut self) {
        if !self.table.is_empty() {
            error!(
                "Wait set dropped with {} waitables still registered",
                self.table.len()
            );

            if cfg!(debug_assertions) && !std::thread::panicking() {
                panic!("Wait set dropped while not empty");
            }
        }
    }
}
