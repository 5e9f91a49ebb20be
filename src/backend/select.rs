use core::mem::MaybeUninit;
use core::time::Duration;

use std::io::{self, ErrorKind};
use std::os::fd::RawFd;

use enumset::EnumSet;

use libc as sys;

use super::Backend;
use crate::event::{Event, Readiness};
use crate::sys::micros_ceil;
use crate::table::{Entry, Table};

/// Portable `select(2)` backend.
///
/// There is no kernel object to keep in sync: the descriptor sets are
/// rebuilt from the registration table on every poll.
pub(crate) struct Select<const N: usize> {
    fds: Fds,
}

struct Fds {
    read: MaybeUninit<sys::fd_set>,
    write: MaybeUninit<sys::fd_set>,
    except: MaybeUninit<sys::fd_set>,
}

impl Fds {
    const fn new() -> Self {
        Self {
            read: MaybeUninit::uninit(),
            write: MaybeUninit::uninit(),
            except: MaybeUninit::uninit(),
        }
    }

    fn zero(&mut self) {
        unsafe {
            sys::FD_ZERO(self.read.as_mut_ptr());
            sys::FD_ZERO(self.write.as_mut_ptr());
            sys::FD_ZERO(self.except.as_mut_ptr());
        }
    }

    fn is_set(&self, fd: RawFd, readiness: Readiness) -> bool {
        unsafe { sys::FD_ISSET(fd, self.fd_set(readiness)) }
    }

    fn set(&mut self, fd: RawFd, readiness: Readiness) {
        unsafe { sys::FD_SET(fd, self.fd_set_mut(readiness)) }
    }

    // Only valid after `zero`.
    fn fd_set(&self, readiness: Readiness) -> &sys::fd_set {
        unsafe {
            match readiness {
                Readiness::Readable => self.read.assume_init_ref(),
                Readiness::Writable => self.write.assume_init_ref(),
                Readiness::Error => self.except.assume_init_ref(),
            }
        }
    }

    fn fd_set_mut(&mut self, readiness: Readiness) -> &mut sys::fd_set {
        unsafe {
            match readiness {
                Readiness::Readable => self.read.assume_init_mut(),
                Readiness::Writable => self.write.assume_init_mut(),
                Readiness::Error => self.except.assume_init_mut(),
            }
        }
    }

    /// Fills the sets from `table` and returns the highest descriptor set.
    fn fill<const N: usize>(&mut self, table: &Table<'_, N>) -> Option<RawFd> {
        self.zero();

        let mut max: Option<RawFd> = None;

        for (_, entry) in table.iter() {
            for event in entry.interest {
                self.set(entry.handle, event.into());
            }

            self.set(entry.handle, Readiness::Error);

            max = Some(max.map_or(entry.handle, |max| max.max(entry.handle)));
        }

        max
    }
}

impl<const N: usize> Backend<N> for Select<N> {
    fn open() -> io::Result<Self> {
        Ok(Self { fds: Fds::new() })
    }

    fn register(&mut self, _slot: usize, entry: &Entry<'_>) -> io::Result<()> {
        if entry.handle < 0 || entry.handle as usize >= sys::FD_SETSIZE as usize {
            Err(ErrorKind::InvalidInput)?;
        }

        Ok(())
    }

    fn modify(&mut self, _slot: usize, _entry: &Entry<'_>) -> io::Result<()> {
        Ok(())
    }

    fn unregister(&mut self, _slot: usize, _entry: &Entry<'_>) -> io::Result<()> {
        Ok(())
    }

    fn poll<F>(&mut self, table: &Table<'_, N>, timeout: Option<Duration>, mut ready: F) -> io::Result<()>
    where
        F: FnMut(usize, EnumSet<Readiness>),
    {
        let Some(max) = self.fds.fill(table) else {
            return Ok(());
        };

        let mut timeout = timeout.map(|timeout| {
            let micros = micros_ceil(timeout);

            sys::timeval {
                tv_sec: (micros / 1_000_000).min(sys::time_t::MAX as u128) as sys::time_t,
                tv_usec: (micros % 1_000_000) as sys::suseconds_t,
            }
        });

        syscall!(unsafe {
            sys::select(
                max + 1,
                self.fds.read.assume_init_mut(),
                self.fds.write.assume_init_mut(),
                self.fds.except.assume_init_mut(),
                timeout
                    .as_mut()
                    .map_or(core::ptr::null_mut(), |timeout| timeout as *mut _),
            )
        })?;

        for (slot, entry) in table.iter() {
            let mut readiness = EnumSet::empty();

            for candidate in EnumSet::<Readiness>::all() {
                let watched = match candidate {
                    Readiness::Readable => entry.interest.contains(Event::Read),
                    Readiness::Writable => entry.interest.contains(Event::Write),
                    Readiness::Error => true,
                };

                if watched && self.fds.is_set(entry.handle, candidate) {
                    readiness |= candidate;
                }
            }

            if !readiness.is_empty() {
                ready(slot, readiness);
            }
        }

        Ok(())
    }
}
