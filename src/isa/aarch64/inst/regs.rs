//! AArch64 ISA definitions: registers.

use crate::isa::aarch64::inst::{OperandSize, ScalarSize, VectorSize};
use crate::machinst::{RealReg, Reg, RegClass, Writable};

/// Get a reference to an X-register (integer register).
pub fn xreg(num: u8) -> Reg {
    assert!(num < 31);
    Reg::new_real(RegClass::Int, num)
}

/// Get a writable reference to an X-register.
pub fn writable_xreg(num: u8) -> Writable<Reg> {
    Writable::from_reg(xreg(num))
}

/// Get a reference to a V-register (vector/FP register).
pub fn vreg(num: u8) -> Reg {
    assert!(num < 32);
    Reg::new_real(RegClass::Float, num)
}

/// Get a writable reference to a V-register.
pub fn writable_vreg(num: u8) -> Writable<Reg> {
    Writable::from_reg(vreg(num))
}

/// Get a reference to the zero-register.
pub fn zero_reg() -> Reg {
    // XSP (stack) and XZR (zero) are logically different registers which
    // have the same hardware encoding, and whose meaning, in real aarch64
    // instructions, is context-dependent. We make them two different real
    // registers so they can never be confused.
    Reg::new_real(RegClass::Int, 31)
}

/// Get a writable reference to the zero-register (this discards a result).
pub fn writable_zero_reg() -> Writable<Reg> {
    Writable::from_reg(zero_reg())
}

/// Get a reference to the stack-pointer register.
pub fn stack_reg() -> Reg {
    Reg::new_real(RegClass::Int, 32)
}

/// Get a writable reference to the stack-pointer register.
pub fn writable_stack_reg() -> Writable<Reg> {
    Writable::from_reg(stack_reg())
}

/// Get a reference to the link register (x30).
pub fn link_reg() -> Reg {
    xreg(30)
}

/// Get a writable reference to the link register.
pub fn writable_link_reg() -> Writable<Reg> {
    Writable::from_reg(link_reg())
}

/// Get a reference to the frame pointer (x29).
pub fn fp_reg() -> Reg {
    xreg(29)
}

/// Get a writable reference to the frame pointer.
pub fn writable_fp_reg() -> Writable<Reg> {
    Writable::from_reg(fp_reg())
}

/// Get a reference to the first temporary, sometimes "spill temporary",
/// register. This register is used to compute the address of a spill slot
/// or to materialize an out-of-range constant or offset. We exclude this
/// register from allocation and reserve it for this purpose; otherwise we
/// would need a multi-stage analysis that first determines how many spill
/// slots exist.
///
/// We use x16 (aka IP0 in the AArch64 ABI) because it's a scratch register
/// that is slightly special (used for linker veneers); we're free to use
/// it as long as we don't expect it to live through call instructions.
pub fn spilltmp_reg() -> Reg {
    xreg(16)
}

/// Get a writable reference to the spilltmp reg.
pub fn writable_spilltmp_reg() -> Writable<Reg> {
    Writable::from_reg(spilltmp_reg())
}

/// Get a reference to the second temp register, x17 (aka IP1), for the
/// edge cases that need both the spilltmp and another temporary.
pub fn tmp2_reg() -> Reg {
    xreg(17)
}

/// Get a writable reference to the tmp2 reg.
pub fn writable_tmp2_reg() -> Writable<Reg> {
    Writable::from_reg(tmp2_reg())
}

/// The vector-class spill temporary, v31.
pub fn vec_spilltmp_reg() -> Reg {
    vreg(31)
}

/// Get a writable reference to the vector spill temporary.
pub fn writable_vec_spilltmp_reg() -> Writable<Reg> {
    Writable::from_reg(vec_spilltmp_reg())
}

/// Is the given physical register legal as a callee-save? Only X19..X28
/// and V8..V15 (plus the preserve-all extensions X8..X18 and V16..V31) may
/// appear in a clobbered-callee-save list.
pub fn is_legal_callee_save(reg: RealReg) -> bool {
    match reg.class() {
        RegClass::Int => {
            let enc = reg.hw_enc();
            (8..=28).contains(&enc)
        }
        RegClass::Float | RegClass::Vector => true,
    }
}

/// Show an integer register at the given operand size ("x" or "w" names).
pub fn show_ireg_sized(reg: Reg, size: OperandSize) -> String {
    match (reg.to_real_reg(), size) {
        (Some(real), OperandSize::Size32) if real.class() == RegClass::Int => {
            match real.raw_enc() {
                31 => "wzr".to_string(),
                32 => "wsp".to_string(),
                n => format!("w{}", n),
            }
        }
        _ => format!("{}", reg),
    }
}

/// Show a vector register used in a scalar context ("b"/"h"/"s"/"d"
/// names).
pub fn show_vreg_scalar(reg: Reg, size: ScalarSize) -> String {
    match reg.to_real_reg() {
        Some(real) if real.class() != RegClass::Int => {
            let prefix = match size {
                ScalarSize::Size8 => "b",
                ScalarSize::Size16 => "h",
                ScalarSize::Size32 => "s",
                ScalarSize::Size64 => "d",
                ScalarSize::Size128 => "q",
            };
            format!("{}{}", prefix, real.hw_enc())
        }
        _ => format!("{}", reg),
    }
}

/// Show a vector register with its lane arrangement, e.g. "v3.4s".
pub fn show_vreg_vector(reg: Reg, size: VectorSize) -> String {
    format!("{}.{}", reg, size.suffix())
}
