use enumset::{EnumSet, EnumSetType};

/// A readiness condition a caller can ask to be woken for.
///
/// Interest is expressed as an `EnumSet<Event>`.
#[derive(EnumSetType, Debug)]
pub enum Event {
    Read = 0,
    Write = 1,
}

/// A readiness condition observed on a waitable after a wait.
///
/// `Error` cannot be requested. It is always monitored and reported whenever
/// the native backend signals it, whatever the interest was.
#[derive(EnumSetType, Debug)]
pub enum Readiness {
    Readable = 0,
    Writable = 1,
    Error = 2,
}

impl From<Event> for Readiness {
    fn from(event: Event) -> Self {
        match event {
            Event::Read => Readiness::Readable,
            Event::Write => Readiness::Writable,
        }
    }
}

/// The observed conditions a registration with `interest` may report.
pub(crate) fn reportable(interest: EnumSet<Event>) -> EnumSet<Readiness> {
    interest.iter().map(Readiness::from).collect::<EnumSet<_>>() | Readiness::Error
}
