//! Representation of Oxbow IR functions, reduced to the read-only surface
//! the AArch64 backend consumes.

mod condcodes;
mod dfg;
mod entities;
mod extfunc;
mod extname;
pub mod types;

pub use self::condcodes::{FloatCC, IntCC};
pub use self::dfg::{
    AtomicOrdering, Block as BlockData, DataFlowGraph, Function, InstructionData, Opcode, ValueDef,
};
pub use self::entities::{Block, Inst, StackSlot, Value};
pub use self::extfunc::{AbiParam, ParamType, Signature, StructField};
pub use self::extname::ExternalName;
pub use self::types::Type;

use std::fmt;

/// A trap code describing the reason for a trap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrapCode {
    /// The current stack space was exhausted.
    StackOverflow,
    /// An integer arithmetic operation caused an overflow.
    IntegerOverflow,
    /// An integer division by zero.
    IntegerDivisionByZero,
    /// Failed float-to-int conversion.
    BadConversionToInteger,
    /// Code that was supposed to have been unreachable was reached.
    UnreachableCodeReached,
    /// A user-defined trap code.
    User(u16),
}

impl fmt::Display for TrapCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let identifier = match self {
            TrapCode::StackOverflow => "stk_ovf",
            TrapCode::IntegerOverflow => "int_ovf",
            TrapCode::IntegerDivisionByZero => "int_divz",
            TrapCode::BadConversionToInteger => "bad_toint",
            TrapCode::UnreachableCodeReached => "unreachable",
            TrapCode::User(x) => return write!(f, "user{}", x),
        };
        f.write_str(identifier)
    }
}

/// Flags for memory operations.
///
/// Loads and stores are "trusted" when the address is known to be valid
/// (e.g. spill slots and ABI-generated frame accesses); trusted accesses
/// never need a trap record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemFlags {
    notrap: bool,
    aligned: bool,
}

impl MemFlags {
    /// Create a new empty set of flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set of flags representing an access from a "trusted"
    /// address, i.e. one known to be aligned and non-trapping.
    pub fn trusted() -> Self {
        Self {
            notrap: true,
            aligned: true,
        }
    }

    /// Test if the `notrap` flag is set.
    pub fn notrap(self) -> bool {
        self.notrap
    }

    /// Test if the `aligned` flag is set.
    pub fn aligned(self) -> bool {
        self.aligned
    }
}

/// A source location, propagated into trap and relocation records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceLoc(u32);

impl SourceLoc {
    /// Create a new source location with the given bits.
    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Is this the default (unknown) location?
    pub fn is_default(self) -> bool {
        self.0 == 0
    }

    /// The raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }
}
