//! Engine-agnostic bookkeeping shared by every bound type.
//!
//! Every [`ObjectReference<T>`](crate::ObjectReference) embeds a
//! private header holding its owner flag and engine handle, and
//! implements [`ObjectReferenceBase`] so the engine side can store references
//! of different native types behind one trait object.

use std::any::Any;

use bitflags::bitflags;

use crate::EngineHandle;

bitflags! {
    /// Lifetime flags of a reference.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReferenceFlags: u8 {
        /// The reference drops its raw instance when it is dropped.
        const OWNER = 1 << 0;
    }
}

/// Owner flag and engine handle carried by every reference.
///
/// Only the reference itself can reach its header. The owner flag can be
/// cleared from outside through [`ObjectReferenceBase::disown`], but never set,
/// since a raw pointer adopted without ownership must not be freed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReferenceHeader {
    flags: ReferenceFlags,
    engine_handle: EngineHandle,
}

impl ReferenceHeader {
    /// Create a header. The engine handle starts reset.
    pub(crate) fn new(owner: bool) -> Self {
        let mut flags = ReferenceFlags::empty();
        flags.set(ReferenceFlags::OWNER, owner);
        Self {
            flags,
            engine_handle: EngineHandle::reset(),
        }
    }

    /// Current lifetime flags.
    pub(crate) fn flags(&self) -> ReferenceFlags {
        self.flags
    }

    pub(crate) fn is_owner(&self) -> bool {
        self.flags().contains(ReferenceFlags::OWNER)
    }

    pub(crate) fn disown(&mut self) {
        self.flags.remove(ReferenceFlags::OWNER);
    }

    /// Mark the header as owning. Callers must hold an `Arc`-backed raw slot.
    pub(crate) fn adopt(&mut self) {
        self.flags.insert(ReferenceFlags::OWNER);
    }

    pub(crate) fn engine_handle(&self) -> EngineHandle {
        self.engine_handle
    }

    pub(crate) fn engine_handle_mut(&mut self) -> &mut EngineHandle {
        &mut self.engine_handle
    }
}

mod sealed {
    pub trait Sealed {}

    impl<T> Sealed for crate::ObjectReference<T> {}
}

/// Capability set shared by references of every native type.
///
/// Only [`ObjectReference<T>`](crate::ObjectReference) implements it. The
/// state queries agree with each other: `is_valid` holds iff exactly one
/// storage slot is populated, and `is_null` iff none is.
///
/// Ownership can be given up but not taken back:
///
/// ```compile_fail
/// use bindref_core::{ObjectReference, ObjectReferenceBase};
///
/// let mut reference = ObjectReference::<u64>::with_owner(false);
/// let _ = reference.header_mut();
/// ```
///
/// ```compile_fail
/// let _ = bindref_core::ReferenceHeader::new(true);
/// ```
pub trait ObjectReferenceBase: Any + sealed::Sealed {
    /// True when neither a raw nor a shared instance is held.
    fn is_null(&self) -> bool;

    /// True when the instance is held through a shared handle.
    fn is_shared(&self) -> bool;

    /// True when exactly one storage slot is populated.
    fn is_valid(&self) -> bool;

    /// Name of the native type behind this reference.
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Whether dropping this reference drops its raw instance.
    fn is_owner(&self) -> bool;

    /// Give up ownership of the raw instance.
    ///
    /// Unconditionally clears the owner flag. A raw instance held at this
    /// point is no longer dropped by the reference; whoever disowned it is
    /// responsible for it. Shared instances are unaffected.
    fn disown(&mut self);

    fn engine_handle(&self) -> EngineHandle;

    fn set_engine_handle(&mut self, handle: EngineHandle);

    /// Write-through access for engine code that fills the handle in place.
    ///
    /// The borrow ends with the reference, so the slot can't be retained.
    fn engine_handle_mut(&mut self) -> &mut EngineHandle;
}

impl dyn ObjectReferenceBase {
    /// Check if the erased reference is an `ObjectReference<T>`.
    pub fn is<T: 'static>(&self) -> bool {
        self.as_any().is::<crate::ObjectReference<T>>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&crate::ObjectReference<T>> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut crate::ObjectReference<T>> {
        self.as_any_mut().downcast_mut()
    }
}
