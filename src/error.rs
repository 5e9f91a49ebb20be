use core::fmt;

use std::io::{self, ErrorKind};

pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by a [`WaitSet`](crate::WaitSet).
///
/// Every variant except `Resource`, `RegistrationFailed` and `WaitFailed` is a
/// caller contract violation, detected before any native call is made.
#[derive(Debug)]
pub enum Error {
    /// The native multiplexing object could not be created.
    Resource(io::Error),
    /// The registration table is full.
    CapacityExceeded,
    /// The waitable is already registered in a wait set.
    AlreadyRegistered,
    /// The native backend rejected the registration or the interest update.
    RegistrationFailed(io::Error),
    /// The waitable is not registered in this wait set.
    NotRegistered,
    /// Waiting with nothing registered.
    EmptySet,
    /// The output buffer cannot hold every registered waitable.
    BufferTooSmall { required: usize, available: usize },
    /// The blocking native call failed for a reason other than a signal.
    WaitFailed(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(e) => write!(f, "Failed to create the native wait object: {e}"),
            Self::CapacityExceeded => write!(f, "Wait set is full"),
            Self::AlreadyRegistered => write!(f, "Waitable is already registered in a wait set"),
            Self::RegistrationFailed(e) => write!(f, "Native registration failed: {e}"),
            Self::NotRegistered => write!(f, "Waitable is not registered in this wait set"),
            Self::EmptySet => write!(f, "No waitables registered, nothing to wait for"),
            Self::BufferTooSmall {
                required,
                available,
            } => write!(
                f,
                "Output buffer too small: {available} slots for {required} registered waitables"
            ),
            Self::WaitFailed(e) => write!(f, "Native wait failed: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resource(e) | Self::RegistrationFailed(e) | Self::WaitFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        let kind = match &e {
            Error::Resource(e) | Error::RegistrationFailed(e) | Error::WaitFailed(e) => e.kind(),
            Error::CapacityExceeded => ErrorKind::OutOfMemory,
            Error::AlreadyRegistered => ErrorKind::AlreadyExists,
            Error::NotRegistered => ErrorKind::NotFound,
            Error::EmptySet | Error::BufferTooSmall { .. } => ErrorKind::InvalidInput,
        };

        io::Error::new(kind, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::error::Error as _;

    #[test]
    fn io_kinds() {
        let kind = |e: Error| io::Error::from(e).kind();

        assert_eq!(kind(Error::CapacityExceeded), ErrorKind::OutOfMemory);
        assert_eq!(kind(Error::AlreadyRegistered), ErrorKind::AlreadyExists);
        assert_eq!(kind(Error::NotRegistered), ErrorKind::NotFound);
        assert_eq!(kind(Error::EmptySet), ErrorKind::InvalidInput);
        assert_eq!(
            kind(Error::WaitFailed(ErrorKind::PermissionDenied.into())),
            ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn native_cause_is_the_source() {
        let e = Error::RegistrationFailed(io::Error::from_raw_os_error(9));

        assert!(e.source().is_some());
        assert!(Error::EmptySet.source().is_none());
    }
}
