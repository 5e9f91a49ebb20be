use core::time::Duration;

use std::io::{self, ErrorKind};

use enumset::EnumSet;
use log::trace;

use windows_sys::Win32::Foundation::{HANDLE, WAIT_FAILED, WAIT_TIMEOUT};
use windows_sys::Win32::System::Threading::{WaitForMultipleObjectsEx, INFINITE};

use super::Backend;
use crate::event::Readiness;
use crate::sys::millis_ceil;
use crate::table::{Entry, Table};

const MAXIMUM_WAIT_OBJECTS: usize = 64;

/// `WaitForMultipleObjectsEx` backend.
///
/// The waitable itself ties its handle to the requested readiness and
/// decodes what happened once the handle is signaled. The handle array is
/// rebuilt from the table on every poll, so removal never shifts anything.
pub(crate) struct WaitHandles<const N: usize> {
    handles: [HANDLE; N],
    slots: [usize; N],
    registered: usize,
}

impl<const N: usize> Backend<N> for WaitHandles<N> {
    fn open() -> io::Result<Self> {
        Ok(Self {
            handles: [core::ptr::null_mut(); N],
            slots: [0; N],
            registered: 0,
        })
    }

    fn register(&mut self, _slot: usize, entry: &Entry<'_>) -> io::Result<()> {
        if self.registered == MAXIMUM_WAIT_OBJECTS {
            Err(ErrorKind::OutOfMemory)?;
        }

        entry.waitable.set_waiting_events(entry.interest)?;
        self.registered += 1;

        Ok(())
    }

    fn modify(&mut self, _slot: usize, entry: &Entry<'_>) -> io::Result<()> {
        entry.waitable.set_waiting_events(entry.interest)
    }

    fn unregister(&mut self, _slot: usize, entry: &Entry<'_>) -> io::Result<()> {
        self.registered -= 1;

        entry.waitable.set_waiting_events(EnumSet::empty())
    }

    fn poll<F>(&mut self, table: &Table<'_, N>, timeout: Option<Duration>, mut ready: F) -> io::Result<()>
    where
        F: FnMut(usize, EnumSet<Readiness>),
    {
        let mut count = 0;

        for (slot, entry) in table.iter() {
            self.handles[count] = entry.handle as HANDLE;
            self.slots[count] = slot;
            count += 1;
        }

        let timeout = timeout.map_or(INFINITE, |timeout| {
            millis_ceil(timeout).min((INFINITE - 1) as u128) as u32
        });

        let res = unsafe {
            WaitForMultipleObjectsEx(count as u32, self.handles.as_ptr(), 0, timeout, 0)
        };

        if res == WAIT_FAILED {
            return Err(io::Error::last_os_error());
        }

        if res == WAIT_TIMEOUT {
            return Ok(());
        }

        for &slot in &self.slots[..count] {
            let Some(entry) = table.get(slot) else {
                continue;
            };

            let readiness = entry.waitable.check_signaled();

            if readiness.is_empty() {
                // Signaled with nothing to show for it happens now and then;
                // such a waitable is not reported.
                trace!("Handle {:?} signaled without readiness", entry.handle);
            } else {
                ready(slot, readiness);
            }
        }

        Ok(())
    }
}
