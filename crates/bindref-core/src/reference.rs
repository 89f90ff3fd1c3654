//! Typed storage for one native instance exposed to the engine.

use std::any::{Any, type_name};
use std::fmt;
use std::mem;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;

use log::{debug, trace};

use crate::EngineHandle;
use crate::base::{ObjectReferenceBase, ReferenceHeader};

/// Observable ownership mode of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceState {
    /// No instance
    Empty,
    /// Raw instance dropped by this reference
    OwnedRaw,
    /// Raw instance owned elsewhere
    BorrowedRaw,
    /// Instance held through a shared handle
    Shared,
}

enum Slot<T> {
    Empty,
    Raw(NonNull<T>),
    Shared(Arc<T>),
}

/// Handle over a native instance of type `T`.
///
/// The instance is held in exactly one of two ways:
///
/// - **raw**: a pointer that this reference drops when it is dropped, if it
///   is an owner. Non-owning references leave the instance alone.
/// - **shared**: an [`Arc<T>`]; the instance lives as long as the longest
///   holder, regardless of the owner flag.
///
/// [`promote`](Self::promote) turns an owned raw instance into a shared one
/// without moving it, so pointers taken before promotion stay valid.
///
/// # Example
///
/// ```
/// use bindref_core::{ObjectReference, ObjectReferenceBase};
///
/// let mut reference = ObjectReference::<String>::new();
/// reference.set_object(String::from("native"));
/// assert!(reference.is_valid() && !reference.is_shared());
///
/// let shared = reference.promote().unwrap();
/// assert!(reference.is_shared());
/// assert_eq!(*shared, "native");
/// ```
pub struct ObjectReference<T> {
    header: ReferenceHeader,
    slot: Slot<T>,
}

impl<T> ObjectReference<T> {
    /// Create an empty owning reference.
    pub fn new() -> Self {
        Self::with_owner(true)
    }

    /// Create an empty reference with the given owner flag.
    pub fn with_owner(owner: bool) -> Self {
        Self {
            header: ReferenceHeader::new(owner),
            slot: Slot::Empty,
        }
    }

    /// Move `value` into an allocation that an owning reference can adopt
    /// through [`set_object_ptr`](Self::set_object_ptr) and later promote.
    pub fn into_raw_object(value: T) -> NonNull<T> {
        let ptr = Arc::into_raw(Arc::new(value)).cast_mut();
        // SAFETY: `Arc::into_raw` never returns null.
        unsafe { NonNull::new_unchecked(ptr) }
    }

    /// Adopt `value` into the raw slot, clearing any shared handle.
    ///
    /// The reference always owns a value moved in this way, so the owner flag
    /// is set after the previous slot has been released. Borrowed instances
    /// go through [`set_object_ptr`](Self::set_object_ptr) instead.
    pub fn set_object(&mut self, value: T) {
        let ptr = Self::into_raw_object(value);
        self.replace_slot(Slot::Raw(ptr));
        self.header.adopt();
    }

    /// Adopt a raw pointer, clearing any shared handle.
    ///
    /// # Safety
    ///
    /// If the reference is an owner, `ptr` must come from
    /// [`into_raw_object`](Self::into_raw_object) (or `Arc::into_raw` with no
    /// other strong count), and no one else may drop it. Handing the same
    /// pointer to two owning references frees it twice.
    ///
    /// If the reference is not an owner, `ptr` must stay valid and free of
    /// conflicting access for as long as it is reached through this reference.
    pub unsafe fn set_object_ptr(&mut self, ptr: NonNull<T>) {
        self.replace_slot(Slot::Raw(ptr));
    }

    /// The raw slot, verbatim. `None` when the instance is shared.
    pub fn get_object(&self) -> Option<NonNull<T>> {
        match &self.slot {
            Slot::Raw(ptr) => Some(*ptr),
            _ => None,
        }
    }

    /// Adopt a shared handle, clearing the raw slot.
    ///
    /// The owner flag is left untouched.
    pub fn set_shared_object(&mut self, object: Arc<T>) {
        self.replace_slot(Slot::Shared(object));
    }

    /// The shared slot, verbatim. `None` when the instance is raw.
    pub fn get_shared_object(&self) -> Option<Arc<T>> {
        match &self.slot {
            Slot::Shared(shared) => Some(Arc::clone(shared)),
            _ => None,
        }
    }

    /// Move the shared handle out, leaving the reference empty.
    pub fn take_shared(&mut self) -> Option<Arc<T>> {
        match mem::replace(&mut self.slot, Slot::Empty) {
            Slot::Shared(shared) => Some(shared),
            other => {
                self.slot = other;
                None
            }
        }
    }

    /// Switch an owned raw instance to shared ownership.
    ///
    /// The returned handle takes over dropping the instance, which keeps its
    /// address. Already-shared references return their handle; borrowed or
    /// empty ones are left alone and return `None`. Safe to call repeatedly.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn promote(&mut self) -> Option<Arc<T>> {
        if let Slot::Raw(ptr) = self.slot
            && self.owns_instance()
        {
            // SAFETY: an owning raw slot holds a pointer from `Arc::into_raw`
            // whose single strong count belongs to this reference.
            let shared = unsafe { Arc::from_raw(ptr.as_ptr().cast_const()) };
            debug!("promoted {} at {:p} to shared ownership", type_name::<T>(), ptr);
            self.slot = Slot::Shared(shared);
        }

        self.get_shared_object()
    }

    /// Address of the instance, whichever slot holds it.
    pub fn get_pointer(&self) -> Option<NonNull<T>> {
        match &self.slot {
            Slot::Empty => None,
            Slot::Raw(ptr) => Some(*ptr),
            Slot::Shared(shared) => Some(NonNull::from(&**shared)),
        }
    }

    /// Borrow the instance, whichever slot holds it.
    pub fn get_reference(&self) -> Option<&T> {
        match &self.slot {
            Slot::Empty => None,
            // SAFETY: raw pointers are valid while held, per `set_object_ptr`.
            Slot::Raw(ptr) => Some(unsafe { ptr.as_ref() }),
            Slot::Shared(shared) => Some(&**shared),
        }
    }

    /// Mutably borrow the instance.
    ///
    /// Shared instances are only reachable when no other handle exists.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match &mut self.slot {
            Slot::Empty => None,
            // SAFETY: raw pointers are valid and unaliased while held.
            Slot::Raw(ptr) => Some(unsafe { ptr.as_mut() }),
            Slot::Shared(shared) => Arc::get_mut(shared),
        }
    }

    pub fn state(&self) -> ReferenceState {
        match &self.slot {
            Slot::Empty => ReferenceState::Empty,
            Slot::Raw(_) if self.owns_instance() => ReferenceState::OwnedRaw,
            Slot::Raw(_) => ReferenceState::BorrowedRaw,
            Slot::Shared(_) => ReferenceState::Shared,
        }
    }

    /// Release whatever the reference holds and leave it empty.
    pub fn clear(&mut self) {
        self.replace_slot(Slot::Empty);
    }

    fn owns_instance(&self) -> bool {
        self.header.is_owner()
    }

    fn replace_slot(&mut self, slot: Slot<T>) {
        let previous = mem::replace(&mut self.slot, slot);
        if let (Slot::Raw(old), Slot::Raw(new)) = (&previous, &self.slot)
            && old == new
        {
            return;
        }
        self.release_slot(previous);
    }

    fn release_slot(&self, slot: Slot<T>) {
        if let Slot::Raw(ptr) = slot
            && self.owns_instance()
        {
            trace!("dropping owned {} at {:p}", type_name::<T>(), ptr);
            // SAFETY: see `promote`; the strong count is ours to give up.
            drop(unsafe { Arc::from_raw(ptr.as_ptr().cast_const()) });
        }
    }
}

impl<T> Default for ObjectReference<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ObjectReference<T> {
    fn drop(&mut self) {
        let slot = mem::replace(&mut self.slot, Slot::Empty);
        self.release_slot(slot);
    }
}

impl<T> Deref for ObjectReference<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the reference is empty.
    fn deref(&self) -> &T {
        match self.get_reference() {
            Some(instance) => instance,
            None => panic!("dereferenced an empty ObjectReference<{}>", type_name::<T>()),
        }
    }
}

impl<T: 'static> ObjectReferenceBase for ObjectReference<T> {
    fn is_null(&self) -> bool {
        matches!(self.slot, Slot::Empty)
    }

    fn is_shared(&self) -> bool {
        matches!(self.slot, Slot::Shared(_))
    }

    fn is_valid(&self) -> bool {
        !matches!(self.slot, Slot::Empty)
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn is_owner(&self) -> bool {
        self.header.is_owner()
    }

    fn disown(&mut self) {
        self.header.disown();
    }

    fn engine_handle(&self) -> EngineHandle {
        self.header.engine_handle()
    }

    fn set_engine_handle(&mut self, handle: EngineHandle) {
        *self.header.engine_handle_mut() = handle;
    }

    fn engine_handle_mut(&mut self) -> &mut EngineHandle {
        self.header.engine_handle_mut()
    }
}

impl<T> fmt::Debug for ObjectReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReference")
            .field("type", &type_name::<T>())
            .field("state", &self.state())
            .field("header", &self.header)
            .finish()
    }
}
