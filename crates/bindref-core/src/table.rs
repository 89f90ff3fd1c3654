//! Engine-side store of object references.

use std::fmt;

use log::trace;

use crate::{EngineHandle, ObjectReference, ObjectReferenceBase, ReferenceError};

/// Generational arena holding the references the engine can see.
///
/// Each inserted reference gets an [`EngineHandle`] written into it and an
/// engine-side count starting at 1. When the count drops to zero the
/// reference is dropped, which drops its instance if it owns a raw one.
/// Freed slots are reused with a bumped generation, so stale handles are
/// rejected instead of reaching a different reference.
pub struct ReferenceTable {
    slots: Vec<TableSlot>,
    free_list: Vec<u32>,
}

struct TableSlot {
    generation: u32,
    reference: Option<Box<dyn ObjectReferenceBase>>,
    ref_count: u32,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Store a reference and hand out its engine handle.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn insert<T: 'static>(&mut self, reference: ObjectReference<T>) -> EngineHandle {
        self.insert_dyn(Box::new(reference))
    }

    /// Store a type-erased reference and hand out its engine handle.
    ///
    /// # Panics
    ///
    /// Panics if the table would grow past `u32::MAX` slots, the limit of
    /// what an [`EngineHandle`] can index.
    pub fn insert_dyn(&mut self, mut reference: Box<dyn ObjectReferenceBase>) -> EngineHandle {
        let handle = if let Some(index) = self.free_list.pop() {
            EngineHandle::new(index, self.slots[index as usize].generation)
        } else {
            let index = u32::try_from(self.slots.len())
                .expect("reference table exceeded u32::MAX slots");
            self.slots.push(TableSlot {
                generation: 0,
                reference: None,
                ref_count: 0,
            });
            EngineHandle::new(index, 0)
        };

        *reference.engine_handle_mut() = handle;
        trace!("inserted {} as {:?}", reference.type_name(), handle);

        let slot = &mut self.slots[handle.index() as usize];
        slot.reference = Some(reference);
        slot.ref_count = 1;
        handle
    }

    /// Check if the handle refers to a live reference.
    pub fn contains(&self, handle: EngineHandle) -> bool {
        self.live_slot(handle).is_some()
    }

    /// Get the reference behind a handle without knowing its type.
    pub fn get_dyn(&self, handle: EngineHandle) -> Option<&dyn ObjectReferenceBase> {
        self.live_slot(handle)?.reference.as_deref()
    }

    /// Get the typed reference behind a handle.
    pub fn get<T: 'static>(
        &self,
        handle: EngineHandle,
    ) -> Result<&ObjectReference<T>, ReferenceError> {
        let reference = self
            .get_dyn(handle)
            .ok_or(ReferenceError::StaleHandle {
                index: handle.index(),
            })?;
        let actual = reference.type_name();
        reference
            .downcast_ref::<T>()
            .ok_or(ReferenceError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                actual,
            })
    }

    /// Get the typed reference behind a handle mutably.
    pub fn get_mut<T: 'static>(
        &mut self,
        handle: EngineHandle,
    ) -> Result<&mut ObjectReference<T>, ReferenceError> {
        let slot = self
            .live_slot_mut(handle)
            .ok_or(ReferenceError::StaleHandle {
                index: handle.index(),
            })?;
        let reference = slot
            .reference
            .as_deref_mut()
            .ok_or(ReferenceError::StaleHandle {
                index: handle.index(),
            })?;
        let actual = reference.type_name();
        reference
            .downcast_mut::<T>()
            .ok_or(ReferenceError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                actual,
            })
    }

    /// Increment the engine-side count.
    pub fn add_ref(&mut self, handle: EngineHandle) -> bool {
        if let Some(slot) = self.live_slot_mut(handle) {
            slot.ref_count = slot.ref_count.saturating_add(1);
            return true;
        }
        false
    }

    /// Decrement the engine-side count, dropping the reference at zero.
    ///
    /// Returns true if the reference was dropped.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn release(&mut self, handle: EngineHandle) -> bool {
        let Some(slot) = self.live_slot_mut(handle) else {
            return false;
        };

        slot.ref_count = slot.ref_count.saturating_sub(1);
        if slot.ref_count > 0 {
            return false;
        }

        if let Some(reference) = self.vacate(handle.index()) {
            trace!("released {} at {:?}", reference.type_name(), handle);
        }
        true
    }

    /// Take a reference out of the table regardless of its count.
    ///
    /// The returned reference still carries the (now stale) engine handle.
    pub fn remove(&mut self, handle: EngineHandle) -> Option<Box<dyn ObjectReferenceBase>> {
        self.live_slot(handle)?;
        self.vacate(handle.index())
    }

    /// Get the engine-side count for a handle.
    pub fn ref_count(&self, handle: EngineHandle) -> Option<u32> {
        self.live_slot(handle).map(|slot| slot.ref_count)
    }

    /// Number of live references.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_slot(&self, handle: EngineHandle) -> Option<&TableSlot> {
        let slot = self.slots.get(handle.index() as usize)?;
        (slot.generation == handle.generation() && slot.reference.is_some()).then_some(slot)
    }

    fn live_slot_mut(&mut self, handle: EngineHandle) -> Option<&mut TableSlot> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        (slot.generation == handle.generation() && slot.reference.is_some()).then_some(slot)
    }

    fn vacate(&mut self, index: u32) -> Option<Box<dyn ObjectReferenceBase>> {
        let slot = &mut self.slots[index as usize];
        let reference = slot.reference.take();
        slot.ref_count = 0;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index);
        reference
    }
}

impl Default for ReferenceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReferenceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceTable")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;

    use super::*;
    use crate::ReferenceState;

    struct Counted(Rc<Cell<u32>>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn owned<T>(value: T) -> ObjectReference<T> {
        let mut reference = ObjectReference::<T>::new();
        reference.set_object(value);
        reference
    }

    #[test]
    fn insert_writes_engine_handle() {
        let mut table = ReferenceTable::new();
        let handle = table.insert(owned(42i32));

        assert!(!handle.is_reset());
        assert_eq!(table.get::<i32>(handle).unwrap().engine_handle(), handle);
        assert_eq!(table.ref_count(handle), Some(1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn insert_grows_indices_in_order() {
        let mut table = ReferenceTable::new();
        let handles: Vec<_> = (0..4i32).map(|i| table.insert(owned(i))).collect();

        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(handle.index() as usize, i);
            assert_eq!(handle.generation(), 0);
            assert_eq!(**table.get::<i32>(*handle).unwrap(), i as i32);
        }
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn get_wrong_type() {
        let mut table = ReferenceTable::new();
        let handle = table.insert(owned(42i32));

        let err = table.get::<String>(handle).unwrap_err();
        assert_eq!(
            err,
            ReferenceError::TypeMismatch {
                expected: "alloc::string::String",
                actual: "i32",
            }
        );
        assert!(matches!(
            table.get_mut::<String>(handle),
            Err(ReferenceError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn get_mut_reaches_instance() {
        let mut table = ReferenceTable::new();
        let handle = table.insert(owned(42i32));

        *table.get_mut::<i32>(handle).unwrap().get_mut().unwrap() = 100;
        assert_eq!(**table.get::<i32>(handle).unwrap(), 100);
    }

    #[test]
    fn release_drops_owned_instance_once() {
        let drops = Rc::new(Cell::new(0));
        let mut table = ReferenceTable::new();
        let handle = table.insert(owned(Counted(Rc::clone(&drops))));

        table.add_ref(handle);
        assert_eq!(table.ref_count(handle), Some(2));

        assert!(!table.release(handle));
        assert_eq!(drops.get(), 0);

        assert!(table.release(handle));
        assert_eq!(drops.get(), 1);
        assert!(!table.contains(handle));
        assert!(table.is_empty());

        // Releasing again is a stale no-op
        assert!(!table.release(handle));
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn release_after_promotion_keeps_instance() {
        let drops = Rc::new(Cell::new(0));
        let mut table = ReferenceTable::new();
        let handle = table.insert(owned(Counted(Rc::clone(&drops))));

        let shared = table.get_mut::<Counted>(handle).unwrap().promote().unwrap();
        assert!(table.release(handle));
        assert_eq!(drops.get(), 0);

        drop(shared);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn stale_handles_are_rejected() {
        let mut table = ReferenceTable::new();
        let first = table.insert(owned(1i32));
        table.release(first);

        let second = table.insert(owned(2i32));
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());

        assert_eq!(
            table.get::<i32>(first).unwrap_err(),
            ReferenceError::StaleHandle {
                index: first.index()
            }
        );
        assert!(!table.add_ref(first));
        assert!(table.ref_count(first).is_none());
        assert_eq!(**table.get::<i32>(second).unwrap(), 2);
    }

    #[test]
    fn reset_handle_is_stale() {
        let table = ReferenceTable::new();
        assert!(!table.contains(EngineHandle::reset()));
        assert!(table.get_dyn(EngineHandle::reset()).is_none());
    }

    #[test]
    fn remove_hands_reference_back() {
        let mut table = ReferenceTable::new();
        let mut reference = ObjectReference::<i32>::new();
        reference.set_shared_object(Arc::new(5i32));
        let handle = table.insert(reference);
        table.add_ref(handle);

        let removed = table.remove(handle).unwrap();
        assert_eq!(removed.engine_handle(), handle);
        assert_eq!(removed.downcast_ref::<i32>().unwrap().state(), ReferenceState::Shared);
        assert!(!table.contains(handle));
        assert!(table.remove(handle).is_none());
    }

    #[test]
    fn insert_dyn_accepts_erased_reference() {
        let mut table = ReferenceTable::new();
        let erased: Box<dyn ObjectReferenceBase> = Box::new(owned(3u16));
        let handle = table.insert_dyn(erased);

        let stored = table.get_dyn(handle).unwrap();
        assert!(stored.is::<u16>());
        assert!(stored.is_valid());
    }

    #[test]
    fn debug_output() {
        let mut table = ReferenceTable::default();
        let handle = table.insert(owned(1i32));
        table.release(handle);
        assert_eq!(
            format!("{:?}", table),
            "ReferenceTable { slot_count: 1, free_count: 1 }"
        );
    }
}
