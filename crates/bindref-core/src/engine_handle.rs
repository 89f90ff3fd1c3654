//! Opaque handle identifying a value inside the script engine.

use std::fmt;

/// Token for a value in the engine's object graph.
///
/// References store this handle but never interpret it. Only the engine side
/// (see [`ReferenceTable`](crate::ReferenceTable)) constructs meaningful
/// handles; everyone else copies, compares, or resets them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineHandle {
    index: u32,
    generation: u32,
}

impl EngineHandle {
    const RESET_INDEX: u32 = u32::MAX;

    /// Create a handle for a table slot.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// A handle in the reset state, pointing at nothing.
    pub const fn reset() -> Self {
        Self {
            index: Self::RESET_INDEX,
            generation: 0,
        }
    }

    /// Check if this handle is in the reset state.
    pub const fn is_reset(&self) -> bool {
        self.index == Self::RESET_INDEX
    }

    /// Slot index assigned by the engine.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when the handle was issued.
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::reset()
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_reset() {
            write!(f, "EngineHandle(reset)")
        } else {
            write!(f, "EngineHandle({}v{})", self.index, self.generation)
        }
    }
}
