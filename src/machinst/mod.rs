//! This module exposes the machine-specific backend definition pieces: the
//! register model, the `MachBuffer` of emitted code, the `VCode` container
//! of partially lowered instructions, and the lowering context.

use crate::ir::Type;

pub mod buffer;
pub mod lower;
pub mod reg;
pub mod vcode;

pub use buffer::{
    CodeOffset, LabelUse, LitPool, MachBuffer, MachBufferFinalized, MachLabel, MachReloc, Reloc,
};
pub use lower::{Lower, RuleCoverage, ValueRegs};
pub use reg::{RealReg, Reg, RegClass, VirtualReg, Writable};
pub use vcode::{BlockIndex, InsnIndex, VCode, VCodeBuilder};

/// A trait describing the ability of a backend's instruction type to be
/// created and queried by the target-independent parts of the pipeline.
pub trait MachInst: Clone + std::fmt::Debug {
    /// Generate a register-to-register move of the given type.
    fn gen_move(dst: Writable<Reg>, src: Reg, ty: Type) -> Self;

    /// The register class holding values of the given IR type.
    fn rc_for_type(ty: Type) -> RegClass;

    /// Is this instruction a block terminator?
    fn is_term(&self) -> bool;
}

/// Width of a value in bits.
pub fn ty_bits(ty: Type) -> usize {
    ty.bits() as usize
}

/// Align `x` up to a multiple of `alignment`, which must be a power of
/// two.
pub fn align_to(x: u32, alignment: u32) -> u32 {
    debug_assert!(alignment.is_power_of_two());
    (x + alignment - 1) & !(alignment - 1)
}

/// The result of compiling one function: the final code bytes and
/// relocations, plus the frame metadata the driver and unwinder consume.
pub struct CompiledCode {
    /// The emitted machine code and literal pool.
    pub buffer: MachBufferFinalized,
    /// Total frame size allocated by the prologue, in bytes.
    pub frame_size: u32,
    /// Unwind descriptor for this function.
    pub unwind: UnwindInfo,
    /// Rule-coverage report from lowering, if requested.
    pub coverage: Option<RuleCoverage>,
}

/// Frame unwind descriptor handed to the object-file writer.
#[derive(Clone, Debug, Default)]
pub struct UnwindInfo {
    /// Total frame size in bytes.
    pub frame_size: u32,
    /// Offset of the saved FP (X29) from the frame pointer.
    pub fp_offset: i32,
    /// Offset of the saved LR (X30) from the frame pointer.
    pub lr_offset: i32,
    /// Offsets of each saved callee-save from the frame pointer, in save
    /// order.
    pub callee_save_offsets: Vec<(RealReg, i32)>,
    /// Whether a variadic register save area is present.
    pub has_varargs_save_area: bool,
}
