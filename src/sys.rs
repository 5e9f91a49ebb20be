use core::time::Duration;

use std::io;
use std::time::Instant;

use log::trace;

/// Turns a negative libc return value into the thread's last OS error.
#[cfg(unix)]
macro_rules! syscall {
    ($ret:expr) => {{
        let ret = $ret;
        if ret < 0 {
            Err(::std::io::Error::last_os_error())
        } else {
            Ok(ret)
        }
    }};
}

/// Runs a blocking primitive, retrying it for as long as it fails with
/// `ErrorKind::Interrupted`.
///
/// The primitive gets the time left until the deadline derived from `timeout`,
/// so a signal storm cannot stretch a finite wait. `None` means "no deadline"
/// and is passed through unchanged.
pub(crate) fn retry_interrupted<T, F>(timeout: Option<Duration>, mut primitive: F) -> io::Result<T>
where
    F: FnMut(Option<Duration>) -> io::Result<T>,
{
    let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
    let mut remaining = timeout;

    loop {
        match primitive(remaining) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                trace!("Wait interrupted, retrying");

                if let Some(deadline) = deadline {
                    remaining = Some(deadline.saturating_duration_since(Instant::now()));
                }
            }
            result => break result,
        }
    }
}

/// Whole milliseconds in `duration`, rounded up.
///
/// A positive duration shorter than a millisecond yields 1, never 0.
#[allow(dead_code)]
pub(crate) fn millis_ceil(duration: Duration) -> u128 {
    let millis = duration.as_millis();

    if duration.subsec_nanos() % 1_000_000 != 0 {
        millis + 1
    } else {
        millis
    }
}

/// Whole microseconds in `duration`, rounded up.
#[allow(dead_code)]
pub(crate) fn micros_ceil(duration: Duration) -> u128 {
    let micros = duration.as_micros();

    if duration.subsec_nanos() % 1_000 != 0 {
        micros + 1
    } else {
        micros
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_round_up() {
        assert_eq!(millis_ceil(Duration::ZERO), 0);
        assert_eq!(millis_ceil(Duration::from_nanos(1)), 1);
        assert_eq!(millis_ceil(Duration::from_micros(999)), 1);
        assert_eq!(millis_ceil(Duration::from_millis(50)), 50);
        assert_eq!(millis_ceil(Duration::from_micros(50_001)), 51);
        assert_eq!(millis_ceil(Duration::from_secs(2)), 2000);
    }

    #[test]
    fn micros_round_up() {
        assert_eq!(micros_ceil(Duration::ZERO), 0);
        assert_eq!(micros_ceil(Duration::from_nanos(1)), 1);
        assert_eq!(micros_ceil(Duration::from_nanos(1_500)), 2);
        assert_eq!(micros_ceil(Duration::from_millis(3)), 3000);
    }

    #[test]
    fn interrupted_is_retried() {
        let mut calls = 0;

        let result = retry_interrupted(None, |remaining| {
            assert_eq!(remaining, None);

            calls += 1;
            if calls < 3 {
                Err(io::ErrorKind::Interrupted.into())
            } else {
                Ok(calls)
            }
        });

        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn retry_shrinks_remaining_time() {
        let timeout = Duration::from_secs(10);
        let mut seen = Vec::new();

        let result: io::Result<()> = retry_interrupted(Some(timeout), |remaining| {
            seen.push(remaining.unwrap());

            if seen.len() < 2 {
                std::thread::sleep(Duration::from_millis(5));
                Err(io::ErrorKind::Interrupted.into())
            } else {
                Ok(())
            }
        });

        assert!(result.is_ok());
        assert_eq!(seen[0], timeout);
        assert!(seen[1] < timeout);
    }

    #[test]
    fn other_errors_are_returned() {
        let mut calls = 0;

        let result: io::Result<()> = retry_interrupted(Some(Duration::ZERO), |_| {
            calls += 1;
            Err(io::ErrorKind::InvalidInput.into())
        });

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::InvalidInput);
        assert_eq!(calls, 1);
    }
}
