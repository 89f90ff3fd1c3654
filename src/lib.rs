//! Bind native Rust instances to a script engine without losing track of
//! who drops them.
//!
//! The reference types live in [`bindref_core`]; this crate adds the
//! [`marshal`] helpers that move instances across the boundary.
//!
//! ```
//! use bindref::prelude::*;
//!
//! let mut table = ReferenceTable::new();
//! let handle = marshal::push_value(&mut table, 42i32);
//!
//! let shared = marshal::fetch_shared::<i32>(&mut table, handle).unwrap();
//! table.release(handle);
//! assert_eq!(*shared, 42);
//! ```

pub mod marshal;

pub use bindref_core::*;

// Re-export main types
pub mod prelude {
    pub use crate::marshal;
    pub use bindref_core::{
        EngineHandle, ObjectReference, ObjectReferenceBase, ReferenceError, ReferenceFlags,
        ReferenceState, ReferenceTable,
    };
}
