//! Native readiness backends.
//!
//! Exactly one backend is compiled in, chosen by target:
//! - `epoll` on Linux and Android,
//! - `kqueue` on macOS, iOS, FreeBSD and DragonFly,
//! - `select` on every other unix (ESP-IDF included), or on any unix with the
//!   `select` feature enabled,
//! - `WaitForMultipleObjectsEx` on Windows.

use core::time::Duration;

use std::io;

use enumset::EnumSet;

use crate::event::Readiness;
use crate::table::{Entry, Table};

#[cfg(all(
    any(target_os = "linux", target_os = "android"),
    not(feature = "select")
))]
mod epoll;

#[cfg(all(
    any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly"
    ),
    not(feature = "select")
))]
mod kqueue;

#[cfg(all(
    unix,
    any(
        feature = "select",
        not(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "dragonfly"
        ))
    )
))]
mod select;

#[cfg(windows)]
mod windows;

#[cfg(all(
    any(target_os = "linux", target_os = "android"),
    not(feature = "select")
))]
pub(crate) type Native<const N: usize> = epoll::Epoll<N>;

#[cfg(all(
    any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly"
    ),
    not(feature = "select")
))]
pub(crate) type Native<const N: usize> = kqueue::Kqueue<N>;

#[cfg(all(
    unix,
    any(
        feature = "select",
        not(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "dragonfly"
        ))
    )
))]
pub(crate) type Native<const N: usize> = select::Select<N>;

#[cfg(windows)]
pub(crate) type Native<const N: usize> = windows::WaitHandles<N>;

/// A kernel facility able to watch up to `N` waitables at once.
///
/// Registrations are keyed by the table slot of their entry.
pub(crate) trait Backend<const N: usize>: Sized {
    fn open() -> io::Result<Self>;

    fn register(&mut self, slot: usize, entry: &Entry<'_>) -> io::Result<()>;

    /// Replaces the interest of an existing registration with `entry.interest`.
    fn modify(&mut self, slot: usize, entry: &Entry<'_>) -> io::Result<()>;

    fn unregister(&mut self, slot: usize, entry: &Entry<'_>) -> io::Result<()>;

    /// Blocks until a registered waitable is ready or `timeout` elapses.
    ///
    /// Every native record that fired is passed to `ready` with the slot it
    /// belongs to; a slot may be passed more than once. A signal interruption
    /// is returned as `ErrorKind::Interrupted` without calling `ready`.
    fn poll<F>(&mut self, table: &Table<'_, N>, timeout: Option<Duration>, ready: F) -> io::Result<()>
    where
        F: FnMut(usize, EnumSet<Readiness>);
}
