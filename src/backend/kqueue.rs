use core::mem;
use core::time::Duration;

use std::io;
use std::os::fd::RawFd;

use enumset::EnumSet;
use log::warn;

use libc as sys;

use super::Backend;
use crate::event::{Event, Readiness};
use crate::table::{Entry, Table};

/// BSD `kqueue` backend.
///
/// Readability and writability are separate filters here, so a waitable may
/// produce two records in one call; the scratch buffer holds two records per
/// slot to fit them all.
pub(crate) struct Kqueue<const N: usize> {
    kq: RawFd,
    events: [[sys::kevent; 2]; N],
}

impl<const N: usize> Kqueue<N> {
    /// Applies one filter change and returns its per-change outcome.
    ///
    /// `EV_RECEIPT` makes the kernel echo the change back with the error
    /// code in `data` instead of draining pending events, and the zero
    /// timeout keeps the call from blocking.
    fn apply(&self, fd: RawFd, filter: i16, flags: u16, slot: usize) -> io::Result<()> {
        let mut change: sys::kevent = unsafe { mem::zeroed() };
        change.ident = fd as _;
        change.filter = filter as _;
        change.flags = (flags | sys::EV_RECEIPT as u16) as _;
        change.udata = slot as _;

        let mut receipt: sys::kevent = unsafe { mem::zeroed() };
        let timeout = sys::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        syscall!(unsafe { sys::kevent(self.kq, &change, 1, &mut receipt, 1, &timeout) })?;

        if receipt.flags as u16 & sys::EV_ERROR as u16 != 0 && receipt.data != 0 {
            Err(io::Error::from_raw_os_error(receipt.data as i32))
        } else {
            Ok(())
        }
    }

    fn add(&self, fd: RawFd, filter: i16, slot: usize) -> io::Result<()> {
        self.apply(fd, filter, sys::EV_ADD as u16, slot)
    }

    /// Removes a filter; a filter that was never armed is not an error.
    fn delete(&self, fd: RawFd, filter: i16) -> io::Result<()> {
        match self.apply(fd, filter, sys::EV_DELETE as u16, 0) {
            Err(e) if e.raw_os_error() == Some(sys::ENOENT) => Ok(()),
            result => result,
        }
    }
}

impl<const N: usize> Backend<N> for Kqueue<N> {
    fn open() -> io::Result<Self> {
        let kq = syscall!(unsafe { sys::kqueue() })?;

        if let Err(e) = syscall!(unsafe { sys::fcntl(kq, sys::F_SETFD, sys::FD_CLOEXEC) }) {
            unsafe { sys::close(kq) };
            return Err(e);
        }

        Ok(Self {
            kq,
            events: [[unsafe { mem::zeroed() }; 2]; N],
        })
    }

    fn register(&mut self, slot: usize, entry: &Entry<'_>) -> io::Result<()> {
        // Errors only ride along with a filter. With no filter to arm, all
        // that can be checked is that the descriptor is open; such a
        // registration reports nothing until `modify` arms a filter.
        if entry.interest.is_empty() {
            syscall!(unsafe { sys::fcntl(entry.handle, sys::F_GETFD) })?;

            return Ok(());
        }

        if entry.interest.contains(Event::Read) {
            self.add(entry.handle, sys::EVFILT_READ as i16, slot)?;
        }

        if entry.interest.contains(Event::Write) {
            if let Err(e) = self.add(entry.handle, sys::EVFILT_WRITE as i16, slot) {
                // Keep the kernel in step with the table, which will not
                // hold this waitable.
                let _ = self.delete(entry.handle, sys::EVFILT_READ as i16);
                return Err(e);
            }
        }

        Ok(())
    }

    fn modify(&mut self, slot: usize, entry: &Entry<'_>) -> io::Result<()> {
        for (event, filter) in [
            (Event::Read, sys::EVFILT_READ as i16),
            (Event::Write, sys::EVFILT_WRITE as i16),
        ] {
            if entry.interest.contains(event) {
                self.add(entry.handle, filter, slot)?;
            } else if let Err(e) = self.delete(entry.handle, filter) {
                warn!("Dropping {event:?} filter on fd {} failed: {e}", entry.handle);
            }
        }

        Ok(())
    }

    fn unregister(&mut self, _slot: usize, entry: &Entry<'_>) -> io::Result<()> {
        let read = self.delete(entry.handle, sys::EVFILT_READ as i16);
        let write = self.delete(entry.handle, sys::EVFILT_WRITE as i16);

        read.and(write)
    }

    fn poll<F>(&mut self, _table: &Table<'_, N>, timeout: Option<Duration>, mut ready: F) -> io::Result<()>
    where
        F: FnMut(usize, EnumSet<Readiness>),
    {
        let timeout = timeout.map(|timeout| sys::timespec {
            tv_sec: timeout.as_secs().min(sys::time_t::MAX as u64) as sys::time_t,
            tv_nsec: timeout.subsec_nanos() as _,
        });

        let events = self.events.as_flattened_mut();

        let count = syscall!(unsafe {
            sys::kevent(
                self.kq,
                core::ptr::null(),
                0,
                events.as_mut_ptr(),
                events.len() as sys::c_int,
                timeout
                    .as_ref()
                    .map_or(core::ptr::null(), |timeout| timeout as *const _),
            )
        })?;

        for event in &events[..count as usize] {
            ready(event.udata as usize, readiness(event));
        }

        Ok(())
    }
}

impl<const N: usize> Drop for Kqueue<N> {
    fn drop(&mut self) {
        if let Err(e) = syscall!(unsafe { sys::close(self.kq) }) {
            warn!("Closing kqueue fd {} failed: {e}", self.kq);
        }
    }
}

fn readiness(event: &sys::kevent) -> EnumSet<Readiness> {
    let mut readiness = EnumSet::empty();

    if event.filter as i16 == sys::EVFILT_READ as i16 {
        readiness |= Readiness::Readable;
    } else if event.filter as i16 == sys::EVFILT_WRITE as i16 {
        readiness |= Readiness::Writable;
    }

    let flags = event.flags as u16;

    if flags & sys::EV_ERROR as u16 != 0 {
        readiness |= Readiness::Error;
    }

    // A pending socket error rides along with EOF in `fflags`. EOF on the
    // write side means the reader is gone and writes will fail.
    if flags & sys::EV_EOF as u16 != 0
        && (event.fflags != 0 || event.filter as i16 == sys::EVFILT_WRITE as i16)
    {
        readiness |= Readiness::Error;
    }

    readiness
}
