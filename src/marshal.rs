//! Moving native instances across the engine boundary.
//!
//! Values going *in* are wrapped in an [`ObjectReference`] and stored in the
//! [`ReferenceTable`]; the engine only ever sees the returned
//! [`EngineHandle`]. Values coming *out* are looked up by handle. Handing an
//! instance back to native code as shared ownership promotes an owned raw
//! instance first, so the engine and the host can both hold it without
//! dropping it twice.

use std::ptr::NonNull;
use std::sync::Arc;

use bindref_core::{
    EngineHandle, ObjectReference, ObjectReferenceBase, ReferenceError, ReferenceState,
    ReferenceTable,
};
use log::debug;

/// Hand a script-constructed instance to the engine.
///
/// The engine's reference owns the instance; it is dropped when the engine
/// releases its last count, unless it was promoted and shared out first.
pub fn push_value<T: 'static>(table: &mut ReferenceTable, value: T) -> EngineHandle {
    let mut reference = ObjectReference::<T>::new();
    reference.set_object(value);
    table.insert(reference)
}

/// Hand a shared native instance to the engine.
pub fn push_shared<T: 'static>(table: &mut ReferenceTable, object: Arc<T>) -> EngineHandle {
    let mut reference = ObjectReference::<T>::new();
    reference.set_shared_object(object);
    table.insert(reference)
}

/// Let the engine see an instance the host keeps owning.
///
/// # Safety
///
/// `ptr` must stay valid, and free of conflicting access while the engine
/// uses it, until the handle is released.
pub unsafe fn push_borrowed<T: 'static>(
    table: &mut ReferenceTable,
    ptr: NonNull<T>,
) -> EngineHandle {
    let mut reference = ObjectReference::<T>::with_owner(false);
    // SAFETY: non-owning; validity is the caller's contract above.
    unsafe { reference.set_object_ptr(ptr) };
    table.insert(reference)
}

/// Borrow the instance behind a handle.
pub fn fetch_ref<T: 'static>(
    table: &ReferenceTable,
    handle: EngineHandle,
) -> Result<&T, ReferenceError> {
    let reference = table.get::<T>(handle)?;
    reference.get_reference().ok_or(ReferenceError::NullReference {
        type_name: reference.type_name(),
    })
}

/// Take shared ownership of the instance behind a handle.
///
/// Owned raw instances are promoted in place, so the engine's reference
/// and the returned handle point at the same instance.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn fetch_shared<T: 'static>(
    table: &mut ReferenceTable,
    handle: EngineHandle,
) -> Result<Arc<T>, ReferenceError> {
    let reference = table.get_mut::<T>(handle)?;
    match reference.state() {
        ReferenceState::Empty => Err(ReferenceError::NullReference {
            type_name: reference.type_name(),
        }),
        ReferenceState::BorrowedRaw => Err(ReferenceError::NotShareable {
            type_name: reference.type_name(),
        }),
        ReferenceState::OwnedRaw | ReferenceState::Shared => {
            reference.promote().ok_or(ReferenceError::NullReference {
                type_name: reference.type_name(),
            })
        }
    }
}

/// Build a native-side reference to the instance behind a handle.
///
/// This is what a bound function returning an object yields to the host:
/// a shared reference carrying the engine handle it came from.
pub fn return_reference<T: 'static>(
    table: &mut ReferenceTable,
    handle: EngineHandle,
) -> Result<ObjectReference<T>, ReferenceError> {
    let shared = fetch_shared::<T>(table, handle)?;
    debug!("returning {} from {:?}", std::any::type_name::<T>(), handle);

    let mut reference = ObjectReference::<T>::new();
    reference.set_shared_object(shared);
    reference.set_engine_handle(handle);
    Ok(reference)
}
