use core::time::Duration;

use std::io;
use std::os::fd::RawFd;

use enumset::EnumSet;
use log::warn;

use libc as sys;

use super::Backend;
use crate::event::{Event, Readiness};
use crate::sys::millis_ceil;
use crate::table::{Entry, Table};

/// Linux `epoll` backend.
///
/// Each registration carries its table slot in the `u64` payload of the
/// event, and epoll reports at most one record per descriptor per call.
pub(crate) struct Epoll<const N: usize> {
    epoll: RawFd,
    events: [sys::epoll_event; N],
}

impl<const N: usize> Epoll<N> {
    fn ctl(&self, op: i32, fd: RawFd, slot: usize, interest: EnumSet<Event>) -> io::Result<()> {
        let mut event = sys::epoll_event {
            events: flags(interest),
            u64: slot as u64,
        };

        syscall!(unsafe { sys::epoll_ctl(self.epoll, op, fd, &mut event) })?;

        Ok(())
    }
}

impl<const N: usize> Backend<N> for Epoll<N> {
    fn open() -> io::Result<Self> {
        let epoll = syscall!(unsafe { sys::epoll_create1(sys::EPOLL_CLOEXEC) })?;

        Ok(Self {
            epoll,
            events: [sys::epoll_event { events: 0, u64: 0 }; N],
        })
    }

    fn register(&mut self, slot: usize, entry: &Entry<'_>) -> io::Result<()> {
        self.ctl(sys::EPOLL_CTL_ADD, entry.handle, slot, entry.interest)
    }

    fn modify(&mut self, slot: usize, entry: &Entry<'_>) -> io::Result<()> {
        self.ctl(sys::EPOLL_CTL_MOD, entry.handle, slot, entry.interest)
    }

    fn unregister(&mut self, _slot: usize, entry: &Entry<'_>) -> io::Result<()> {
        syscall!(unsafe {
            sys::epoll_ctl(
                self.epoll,
                sys::EPOLL_CTL_DEL,
                entry.handle,
                core::ptr::null_mut(),
            )
        })?;

        Ok(())
    }

    fn poll<F>(&mut self, table: &Table<'_, N>, timeout: Option<Duration>, mut ready: F) -> io::Result<()>
    where
        F: FnMut(usize, EnumSet<Readiness>),
    {
        let timeout = timeout.map_or(-1, |timeout| {
            millis_ceil(timeout).min(sys::c_int::MAX as u128) as sys::c_int
        });

        let count = syscall!(unsafe {
            sys::epoll_wait(
                self.epoll,
                self.events.as_mut_ptr(),
                N as sys::c_int,
                timeout,
            )
        })?;

        for event in &self.events[..count as usize] {
            let slot = event.u64 as usize;

            if let Some(entry) = table.get(slot) {
                ready(slot, readiness(event.events, entry.interest));
            }
        }

        Ok(())
    }
}

impl<const N: usize> Drop for Epoll<N> {
    fn drop(&mut self) {
        if let Err(e) = syscall!(unsafe { sys::close(self.epoll) }) {
            warn!("Closing epoll fd {} failed: {e}", self.epoll);
        }
    }
}

fn flags(interest: EnumSet<Event>) -> u32 {
    let mut flags = sys::EPOLLERR;

    if interest.contains(Event::Read) {
        flags |= sys::EPOLLIN | sys::EPOLLPRI;
    }

    if interest.contains(Event::Write) {
        flags |= sys::EPOLLOUT;
    }

    flags as u32
}

fn readiness(flags: u32, interest: EnumSet<Event>) -> EnumSet<Readiness> {
    let mut readiness = EnumSet::empty();

    if flags & (sys::EPOLLIN | sys::EPOLLPRI) as u32 != 0 {
        readiness |= Readiness::Readable;
    }

    // A hung up peer reads as end of stream. Without read interest there is
    // nothing left to read, and the hang up is only reportable as an error.
    if flags & (sys::EPOLLHUP | sys::EPOLLRDHUP) as u32 != 0 {
        if interest.contains(Event::Read) {
            readiness |= Readiness::Readable;
        } else {
            readiness |= Readiness::Error;
        }
    }

    if flags & sys::EPOLLOUT as u32 != 0 {
        readiness |= Readiness::Writable;
    }

    if flags & sys::EPOLLERR as u32 != 0 {
        readiness |= Readiness::Error;
    }

    readiness
}
