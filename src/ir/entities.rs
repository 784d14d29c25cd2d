//! IR entity references.
//!
//! Instructions, values and blocks in the data flow graph are referenced by
//! dense integer handles into per-function vectors, never by pointer.

use std::fmt;
use std::u32;

macro_rules! entity_ref {
    ($name:ident, $display:expr) => {
        /// An opaque reference to an IR entity, held as a dense index.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Create a new entity reference from its number.
            pub fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                Self(index as u32)
            }

            /// Return the underlying index.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, concat!($display, "{}"), self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }
    };
}

entity_ref!(Value, "v");
entity_ref!(Inst, "inst");
entity_ref!(Block, "block");
entity_ref!(StackSlot, "ss");
