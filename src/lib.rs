//! Readiness multiplexing over a bounded set of sockets, pipes and other
//! native handles.
//!
//! A [`WaitSet`] holds up to `N` registered [`Waitable`]s, each with an
//! interest in [`Event::Read`] and/or [`Event::Write`], and blocks the calling
//! thread until at least one of them is ready. Errors on a waitable are
//! always reported, whatever the interest.
//!
//! # Implementation
//!
//! One native backend is chosen at build time:
//! `epoll` on Linux and Android, `kqueue` on macOS, iOS, FreeBSD and
//! DragonFly, `WaitForMultipleObjectsEx` on Windows, and the [select] syscall
//! on every other unix (ESP-IDF included). Enabling the `select` feature forces
//! the [select] backend on any unix.
//!
//! There is no background thread: `wait` blocks whichever thread calls it.
//! To wake a blocked wait from elsewhere, keep a self-pipe or an event
//! descriptor registered and signal it.
//!
//! # Examples
//!
//! Wait for one end of a socket pair to become readable.
//!
//! ```
//! # #[cfg(unix)]
//! # fn main() -> std::io::Result<()> {
//! use std::io::Write;
//! use std::os::fd::AsRawFd;
//! use std::os::unix::net::UnixStream;
//! use std::time::Duration;
//!
//! use wait_set::{Event, Handle, Readiness, WaitSet, Waitable, WaitableState};
//!
//! struct Socket(UnixStream, WaitableState);
//!
//! impl Waitable for Socket {
//!     fn handle(&self) -> Handle {
//!         self.0.as_raw_fd()
//!     }
//!
//!     fn state(&self) -> &WaitableState {
//!         &self.1
//!     }
//! }
//!
//! let (a, mut b) = UnixStream::pair()?;
//! let a = Socket(a, WaitableState::new());
//!
//! let mut set = WaitSet::<4>::new()?;
//! set.add(&a, Event::Read.into())?;
//!
//! b.write_all(b"ping")?;
//!
//! assert_eq!(set.wait(Some(Duration::from_secs(5)))?, 1);
//! assert!(a.observed().contains(Readiness::Readable));
//!
//! set.remove(&a);
//! # Ok(())
//! # }
//! # #[cfg(not(unix))]
//! # fn main() {}
//! ```
//!
//! [select]: https://man7.org/linux/man-pages/man2/select.2.html

pub use error::{Error, Result};
pub use event::*;
pub use wait_set::*;
pub use waitable::*;

#[macro_use]
mod sys;

mod backend;
mod error;
mod event;
mod table;
mod wait_set;
mod waitable;
