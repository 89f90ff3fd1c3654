//! Ownership-mediating references for native objects bound to a script engine.
//!
//! ## Key Types
//!
//! - [`ObjectReference`]: typed handle over a raw or shared native instance
//! - [`ObjectReferenceBase`]: type-erased capabilities shared by every reference
//! - [`EngineHandle`]: opaque token for the engine-side value
//! - [`ReferenceTable`]: engine-side generational store issuing handles
//!
//! ```text
//! ObjectReference<T> --insert--> ReferenceTable --EngineHandle--> script
//!        |                                                          |
//!        +---------- promote() -> Arc<T> <------ fetch back --------+
//! ```

mod base;
mod engine_handle;
mod error;
mod reference;
mod table;

pub use base::{ObjectReferenceBase, ReferenceFlags};
pub use engine_handle::EngineHandle;
pub use error::ReferenceError;
pub use reference::{ObjectReference, ReferenceState};
pub use table::ReferenceTable;
