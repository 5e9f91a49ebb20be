use enumset::EnumSet;

use crate::event::Event;
use crate::waitable::{self, Handle, Waitable};

/// One registered waitable.
#[derive(Clone, Copy)]
pub(crate) struct Entry<'a> {
    pub(crate) waitable: &'a dyn Waitable,
    pub(crate) handle: Handle,
    pub(crate) interest: EnumSet<Event>,
}

/// Fixed-capacity registration table.
///
/// Slot indices stay stable for the lifetime of a registration and are what
/// the native backends tag their kernel registrations with. Freed slots are
/// recycled LIFO.
pub(crate) struct Table<'a, const N: usize> {
    slots: [Option<Entry<'a>>; N],
    free: heapless::Vec<usize, N>,
    /// Slots at and above this index were never handed out.
    fresh: usize,
    len: usize,
}

impl<'a, const N: usize> Table<'a, N> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: [None; N],
            free: heapless::Vec::new(),
            fresh: 0,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len == N
    }

    pub(crate) fn insert(&mut self, entry: Entry<'a>) -> Option<usize> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None if self.fresh < N => {
                self.fresh += 1;
                self.fresh - 1
            }
            None => return None,
        };

        self.slots[slot] = Some(entry);
        self.len += 1;

        Some(slot)
    }

    pub(crate) fn remove(&mut self, slot: usize) -> Option<Entry<'a>> {
        let entry = self.slots.get_mut(slot)?.take()?;

        // Cannot overflow: at most N slots are ever handed out.
        let _ = self.free.push(slot);
        self.len -= 1;

        Some(entry)
    }

    pub(crate) fn get(&self, slot: usize) -> Option<&Entry<'a>> {
        self.slots.get(slot)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> Option<&mut Entry<'a>> {
        self.slots.get_mut(slot)?.as_mut()
    }

    pub(crate) fn find(&self, waitable: &dyn Waitable) -> Option<usize> {
        self.iter()
            .find(|(_, entry)| waitable::same(entry.waitable, waitable))
            .map(|(slot, _)| slot)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &Entry<'a>)> {
        self.slots[..self.fresh]
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|entry| (slot, entry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::waitable::WaitableState;

    struct Dummy(WaitableState, Handle);

    impl Waitable for Dummy {
        fn handle(&self) -> Handle {
            self.1
        }

        fn state(&self) -> &WaitableState {
            &self.0
        }

        #[cfg(windows)]
        fn set_waiting_events(&self, _interest: EnumSet<Event>) -> std::io::Result<()> {
            Ok(())
        }

        #[cfg(windows)]
        fn check_signaled(&self) -> EnumSet<crate::Readiness> {
            EnumSet::empty()
        }
    }

    #[cfg(unix)]
    fn dummy(handle: i32) -> Dummy {
        Dummy(WaitableState::new(), handle)
    }

    #[cfg(windows)]
    fn dummy(handle: i32) -> Dummy {
        Dummy(WaitableState::new(), handle as isize as Handle)
    }

    fn entry(waitable: &dyn Waitable) -> Entry<'_> {
        Entry {
            waitable,
            handle: waitable.handle(),
            interest: Event::Read.into(),
        }
    }

    #[test]
    fn capacity_is_enforced() {
        let (a, b, c) = (dummy(3), dummy(4), dummy(5));
        let mut table = Table::<2>::new();

        assert_eq!(table.insert(entry(&a)), Some(0));
        assert_eq!(table.insert(entry(&b)), Some(1));
        assert!(table.is_full());
        assert_eq!(table.insert(entry(&c)), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn slots_are_stable_and_recycled() {
        let (a, b, c) = (dummy(3), dummy(4), dummy(5));
        let mut table = Table::<4>::new();

        let slot_a = table.insert(entry(&a)).unwrap();
        let slot_b = table.insert(entry(&b)).unwrap();

        assert!(table.remove(slot_a).is_some());
        assert!(table.remove(slot_a).is_none());
        assert_eq!(table.find(&b), Some(slot_b));
        assert_eq!(table.find(&a), None);

        assert_eq!(table.insert(entry(&c)), Some(slot_a));
        assert_eq!(table.find(&c), Some(slot_a));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn iter_skips_holes() {
        let (a, b, c) = (dummy(3), dummy(4), dummy(5));
        let mut table = Table::<3>::new();

        table.insert(entry(&a));
        let slot_b = table.insert(entry(&b)).unwrap();
        table.insert(entry(&c));
        table.remove(slot_b);

        let slots = table.iter().map(|(slot, _)| slot).collect::<Vec<_>>();
        assert_eq!(slots, [0, 2]);
    }

    #[test]
    fn identity_is_by_instance() {
        let (a, twin) = (dummy(3), dummy(3));
        let mut table = Table::<2>::new();

        table.insert(entry(&a));

        assert_eq!(table.find(&a), Some(0));
        assert_eq!(table.find(&twin), None);
    }
}
