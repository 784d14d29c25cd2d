//! AArch64 ISA definitions: instruction arguments.

use crate::ir::Type;
use crate::isa::aarch64::inst::*;
use crate::machinst::{MachLabel, Reg, Writable};

/// Type used to communicate the operand size of a machine instruction, as
/// AArch64 has 32- and 64-bit variants of many instructions (and integer
/// registers).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandSize {
    /// 32-bit (W registers).
    Size32,
    /// 64-bit (X registers).
    Size64,
}

impl OperandSize {
    /// 32-bit case?
    pub fn is32(self) -> bool {
        self == OperandSize::Size32
    }

    /// 64-bit case?
    pub fn is64(self) -> bool {
        self == OperandSize::Size64
    }

    /// Convert from a needed width to the smallest size that fits.
    pub fn from_bits(bits: u32) -> OperandSize {
        debug_assert!(bits <= 64);
        if bits <= 32 {
            OperandSize::Size32
        } else {
            OperandSize::Size64
        }
    }

    /// The operand size for an IR type.
    pub fn from_ty(ty: Type) -> OperandSize {
        Self::from_bits(ty.bits())
    }

    /// The `sf` bit: bit 31 of most integer instructions, 1 iff 64-bit.
    pub fn sf_bit(self) -> u32 {
        match self {
            OperandSize::Size32 => 0,
            OperandSize::Size64 => 1,
        }
    }

    /// Size in bytes.
    pub fn bytes(self) -> u8 {
        match self {
            OperandSize::Size32 => 4,
            OperandSize::Size64 => 8,
        }
    }
}

/// Type used to communicate the size of a scalar floating-point or SIMD
/// register operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarSize {
    /// 8-bit (B).
    Size8,
    /// 16-bit (H).
    Size16,
    /// 32-bit (S).
    Size32,
    /// 64-bit (D).
    Size64,
    /// 128-bit (Q).
    Size128,
}

impl ScalarSize {
    /// The scalar size for an IR type.
    pub fn from_ty(ty: Type) -> ScalarSize {
        Self::from_bits(ty.bits())
    }

    /// Convert from a width in bits.
    pub fn from_bits(bits: u32) -> ScalarSize {
        match bits {
            8 => ScalarSize::Size8,
            16 => ScalarSize::Size16,
            32 => ScalarSize::Size32,
            64 => ScalarSize::Size64,
            128 => ScalarSize::Size128,
            w => panic!("invalid scalar width {}", w),
        }
    }

    /// FP "ftype" field encoding: 00 = S, 01 = D.
    pub fn ftype(self) -> u32 {
        match self {
            ScalarSize::Size32 => 0b00,
            ScalarSize::Size64 => 0b01,
            _ => panic!("bad FP size"),
        }
    }

    /// Size in bytes.
    pub fn bytes(self) -> u8 {
        match self {
            ScalarSize::Size8 => 1,
            ScalarSize::Size16 => 2,
            ScalarSize::Size32 => 4,
            ScalarSize::Size64 => 8,
            ScalarSize::Size128 => 16,
        }
    }
}

/// The lane arrangement of a vector operand: lane width times lane count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorSize {
    /// 8 lanes of 8 bits (64-bit vector).
    Size8x8,
    /// 16 lanes of 8 bits.
    Size8x16,
    /// 4 lanes of 16 bits (64-bit vector).
    Size16x4,
    /// 8 lanes of 16 bits.
    Size16x8,
    /// 2 lanes of 32 bits (64-bit vector).
    Size32x2,
    /// 4 lanes of 32 bits.
    Size32x4,
    /// 2 lanes of 64 bits.
    Size64x2,
}

impl VectorSize {
    /// The vector size for an IR vector type.
    pub fn from_ty(ty: Type) -> VectorSize {
        debug_assert!(ty.is_vector());
        match (ty.lane_bits(), ty.lane_count()) {
            (8, 8) => VectorSize::Size8x8,
            (8, 16) => VectorSize::Size8x16,
            (16, 4) => VectorSize::Size16x4,
            (16, 8) => VectorSize::Size16x8,
            (32, 2) => VectorSize::Size32x2,
            (32, 4) => VectorSize::Size32x4,
            (64, 2) => VectorSize::Size64x2,
            _ => panic!("unsupported vector type {}", ty),
        }
    }

    /// Build from lane width in bits and a "full 128-bit" flag.
    pub fn from_lane_size(lane_bits: u32, is_128bit: bool) -> VectorSize {
        match (lane_bits, is_128bit) {
            (8, false) => VectorSize::Size8x8,
            (8, true) => VectorSize::Size8x16,
            (16, false) => VectorSize::Size16x4,
            (16, true) => VectorSize::Size16x8,
            (32, false) => VectorSize::Size32x2,
            (32, true) => VectorSize::Size32x4,
            (64, true) => VectorSize::Size64x2,
            _ => panic!("unsupported lane size {}", lane_bits),
        }
    }

    /// Width of one lane in bits.
    pub fn lane_bits(self) -> u32 {
        match self {
            VectorSize::Size8x8 | VectorSize::Size8x16 => 8,
            VectorSize::Size16x4 | VectorSize::Size16x8 => 16,
            VectorSize::Size32x2 | VectorSize::Size32x4 => 32,
            VectorSize::Size64x2 => 64,
        }
    }

    /// Number of lanes.
    pub fn lane_count(self) -> u32 {
        match self {
            VectorSize::Size8x16 => 16,
            VectorSize::Size8x8 | VectorSize::Size16x8 => 8,
            VectorSize::Size16x4 | VectorSize::Size32x4 => 4,
            VectorSize::Size32x2 | VectorSize::Size64x2 => 2,
        }
    }

    /// Is this a full 128-bit vector?
    pub fn is_128bits(self) -> bool {
        self.lane_bits() * self.lane_count() == 128
    }

    /// The `Q` bit and 2-bit `size` field for most SIMD encodings.
    pub fn enc_size(self) -> (u32, u32) {
        let q = self.is_128bits() as u32;
        let size = match self.lane_bits() {
            8 => 0b00,
            16 => 0b01,
            32 => 0b10,
            64 => 0b11,
            _ => unreachable!(),
        };
        (q, size)
    }

    /// Assembly suffix, e.g. "4s".
    pub fn suffix(self) -> &'static str {
        match self {
            VectorSize::Size8x8 => "8b",
            VectorSize::Size8x16 => "16b",
            VectorSize::Size16x4 => "4h",
            VectorSize::Size16x8 => "8h",
            VectorSize::Size32x2 => "2s",
            VectorSize::Size32x4 => "4s",
            VectorSize::Size64x2 => "2d",
        }
    }

    /// The arrangement with lanes twice as wide and half as many (the
    /// destination arrangement of a widening instruction's low half).
    pub fn widen(self) -> VectorSize {
        match self {
            VectorSize::Size8x8 | VectorSize::Size8x16 => VectorSize::Size16x8,
            VectorSize::Size16x4 | VectorSize::Size16x8 => VectorSize::Size32x4,
            VectorSize::Size32x2 | VectorSize::Size32x4 => VectorSize::Size64x2,
            VectorSize::Size64x2 => panic!("cannot widen 64-bit lanes"),
        }
    }

    /// The 64-bit arrangement with the same lane width.
    pub fn halve(self) -> VectorSize {
        match self {
            VectorSize::Size8x16 => VectorSize::Size8x8,
            VectorSize::Size16x8 => VectorSize::Size16x4,
            VectorSize::Size32x4 => VectorSize::Size32x2,
            other => other,
        }
    }
}

/// A shift operator for a register or immediate.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum ShiftOp {
    /// Logical shift left.
    LSL = 0b00,
    /// Logical shift right.
    LSR = 0b01,
    /// Arithmetic shift right.
    ASR = 0b10,
    /// Rotate right.
    ROR = 0b11,
}

impl ShiftOp {
    /// Get the encoding of this shift op.
    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// A shift operator amount.
#[derive(Clone, Copy, Debug)]
pub struct ShiftOpShiftImm(u8);

impl ShiftOpShiftImm {
    /// Maximum shift for shifted-register operands.
    pub const MAX_SHIFT: u64 = 63;

    /// Create a new shiftop shift amount, if possible.
    pub fn maybe_from_shift(shift: u64) -> Option<ShiftOpShiftImm> {
        if shift <= Self::MAX_SHIFT {
            Some(ShiftOpShiftImm(shift as u8))
        } else {
            None
        }
    }

    /// Return the shift amount.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Mask the shift amount to the size of the shifted value.
    pub fn mask(self, bits: u8) -> ShiftOpShiftImm {
        ShiftOpShiftImm(self.0 & (bits - 1))
    }
}

/// A shift operator with an amount, guaranteed to be within range.
#[derive(Clone, Copy, Debug)]
pub struct ShiftOpAndAmt {
    op: ShiftOp,
    shift: ShiftOpShiftImm,
}

impl ShiftOpAndAmt {
    /// Create a shift-op-and-amount.
    pub fn new(op: ShiftOp, shift: ShiftOpShiftImm) -> ShiftOpAndAmt {
        ShiftOpAndAmt { op, shift }
    }

    /// Get the shift op.
    pub fn op(&self) -> ShiftOp {
        self.op
    }

    /// Get the shift amount.
    pub fn amt(&self) -> ShiftOpShiftImm {
        self.shift
    }
}

/// An extend operator for a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ExtendOp {
    UXTB = 0b000,
    UXTH = 0b001,
    UXTW = 0b010,
    UXTX = 0b011,
    SXTB = 0b100,
    SXTH = 0b101,
    SXTW = 0b110,
    SXTX = 0b111,
}

impl ExtendOp {
    /// Encoding of this op.
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Is this a signed extend?
    pub fn is_signed(self) -> bool {
        (self as u8) & 0b100 != 0
    }
}

/// A reference to some memory address.
#[derive(Clone, Copy, Debug)]
pub enum MemLabel {
    /// An address relative to this instruction's PC, in bytes.
    PCRel(i32),
    /// A label in the code buffer (e.g. a literal-pool entry), resolved by
    /// a fixup.
    Mach(MachLabel),
}

/// An addressing mode for a load or store.
///
/// `RegReg`, `RegScaled` and `RegScaledExtended` all correspond to what
/// the ISA calls the "register offset" addressing mode; they are split out
/// here for more ergonomic codegen. `SPOffset` and `FPOffset` are
/// pseudo-modes lowered into real modes by `mem_finalize` at emission.
#[derive(Clone, Copy, Debug)]
pub enum AMode {
    /// PC-relative addressing (literal pools, jump tables).
    Label(MemLabel),
    /// "Post-indexed" mode: use the register value, then increment it.
    PostIndexed(Writable<Reg>, SImm9),
    /// "Pre-indexed" mode: increment the register, then use it.
    PreIndexed(Writable<Reg>, SImm9),
    /// Register plus register offset.
    RegReg(Reg, Reg),
    /// Register plus register offset, scaled by the access size.
    RegScaled(Reg, Reg, Type),
    /// Register plus register offset, scaled, with the index sign- or
    /// zero-extended from 32 bits first.
    RegScaledExtended(Reg, Reg, Type, ExtendOp),
    /// Register plus a large arbitrary offset; legalized at emission.
    RegOffset(Reg, i64, Type),
    /// Unscaled signed 9-bit immediate offset from a register.
    Unscaled(Reg, SImm9),
    /// Scaled unsigned 12-bit immediate offset from a register.
    UnsignedOffset(Reg, UImm12Scaled),
    /// Offset from the stack pointer; legalized at emission.
    SPOffset(i64, Type),
    /// Offset from the frame pointer; legalized at emission.
    FPOffset(i64, Type),
    /// Offset into the incoming stack-argument area, i.e. SP plus the
    /// frame size plus the offset; the frame size is known only at
    /// emission, once the layout is frozen.
    IncomingArg(i64, Type),
}

impl AMode {
    /// Memory reference using an address in a register. Uses
    /// `UnsignedOffset` rather than `Unscaled` so emission picks `ldr`
    /// rather than `ldur`.
    pub fn reg(reg: Reg) -> AMode {
        AMode::UnsignedOffset(reg, UImm12Scaled::zero(8))
    }

    /// Memory reference using an address in a register plus an offset, if
    /// the offset is directly encodable for the given access type.
    pub fn reg_maybe_offset(reg: Reg, offset: i64, access_ty: Type) -> Option<AMode> {
        if offset == 0 {
            Some(AMode::reg(reg))
        } else if let Some(simm9) = SImm9::maybe_from_i64(offset) {
            Some(AMode::Unscaled(reg, simm9))
        } else if let Some(uimm12) =
            UImm12Scaled::maybe_from_i64(offset, access_ty.bytes() as u8)
        {
            Some(AMode::UnsignedOffset(reg, uimm12))
        } else {
            None
        }
    }

    /// Memory reference using the sum of two registers as an address.
    pub fn reg_plus_reg(reg1: Reg, reg2: Reg) -> AMode {
        AMode::RegReg(reg1, reg2)
    }
}

/// A memory argument to a load/store-pair instruction.
#[derive(Clone, Copy, Debug)]
pub enum PairAMode {
    /// Base register plus signed, scaled 7-bit offset.
    SignedOffset(Reg, SImm7Scaled),
    /// Pre-indexed (base updated before access).
    PreIndexed(Writable<Reg>, SImm7Scaled),
    /// Post-indexed (base updated after access).
    PostIndexed(Writable<Reg>, SImm7Scaled),
}

/// Condition for conditional branches and conditional selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Cond {
    Eq = 0,
    Ne = 1,
    Hs = 2,
    Lo = 3,
    Mi = 4,
    Pl = 5,
    Vs = 6,
    Vc = 7,
    Hi = 8,
    Ls = 9,
    Ge = 10,
    Lt = 11,
    Gt = 12,
    Le = 13,
    Al = 14,
    Nv = 15,
}

impl Cond {
    /// Return the inverted condition. `Al` maps to itself: "always" has
    /// no complement among the conditional encodings.
    pub fn invert(self) -> Cond {
        match self {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Hs => Cond::Lo,
            Cond::Lo => Cond::Hs,
            Cond::Mi => Cond::Pl,
            Cond::Pl => Cond::Mi,
            Cond::Vs => Cond::Vc,
            Cond::Vc => Cond::Vs,
            Cond::Hi => Cond::Ls,
            Cond::Ls => Cond::Hi,
            Cond::Ge => Cond::Lt,
            Cond::Lt => Cond::Ge,
            Cond::Gt => Cond::Le,
            Cond::Le => Cond::Gt,
            Cond::Al => Cond::Al,
            Cond::Nv => Cond::Nv,
        }
    }

    /// Return the machine encoding of this condition.
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Assembly name.
    pub fn name(self) -> &'static str {
        match self {
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::Hs => "hs",
            Cond::Lo => "lo",
            Cond::Mi => "mi",
            Cond::Pl => "pl",
            Cond::Vs => "vs",
            Cond::Vc => "vc",
            Cond::Hi => "hi",
            Cond::Ls => "ls",
            Cond::Ge => "ge",
            Cond::Lt => "lt",
            Cond::Gt => "gt",
            Cond::Le => "le",
            Cond::Al => "al",
            Cond::Nv => "nv",
        }
    }
}

/// The kind of conditional branch: the common-case-optimized "reg-is-zero"
/// / "reg-is-nonzero" variants, or the generic one that tests the machine
/// condition codes.
#[derive(Clone, Copy, Debug)]
pub enum CondBrKind {
    /// Condition: given register is zero.
    Zero(Reg),
    /// Condition: given register is nonzero.
    NotZero(Reg),
    /// Condition: the given condition-code test is true.
    Cond(Cond),
}

impl CondBrKind {
    /// Return the inverted branch condition.
    pub fn invert(self) -> CondBrKind {
        match self {
            CondBrKind::Zero(reg) => CondBrKind::NotZero(reg),
            CondBrKind::NotZero(reg) => CondBrKind::Zero(reg),
            CondBrKind::Cond(c) => CondBrKind::Cond(c.invert()),
        }
    }
}

/// A branch target. Either a label resolved by the buffer's fixup
/// machinery, or an already-resolved byte offset relative to the
/// referencing instruction (used for short fixed sequences like the
/// branch-over-trap in `TrapIf`).
#[derive(Clone, Copy, Debug)]
pub enum BranchTarget {
    /// An unresolved reference to a label.
    Label(MachLabel),
    /// A resolved offset in bytes from the branch instruction.
    ResolvedOffset(i32),
}

impl BranchTarget {
    /// The label, if this is an unresolved target.
    pub fn as_label(self) -> Option<MachLabel> {
        match self {
            BranchTarget::Label(l) => Some(l),
            BranchTarget::ResolvedOffset(..) => None,
        }
    }

    /// 19-bit word-offset field bits, or zero if unresolved (the fixup
    /// patches zero bits later).
    pub fn as_offset19_or_zero(self) -> u32 {
        let off = match self {
            BranchTarget::ResolvedOffset(off) => off >> 2,
            BranchTarget::Label(..) => 0,
        };
        debug_assert!(off <= (1 << 18) - 1);
        debug_assert!(off >= -(1 << 18));
        (off as u32) & ((1 << 19) - 1)
    }

    /// 26-bit word-offset field bits, or zero if unresolved.
    pub fn as_offset26_or_zero(self) -> u32 {
        let off = match self {
            BranchTarget::ResolvedOffset(off) => off >> 2,
            BranchTarget::Label(..) => 0,
        };
        debug_assert!(off <= (1 << 25) - 1);
        debug_assert!(off >= -(1 << 25));
        (off as u32) & ((1 << 26) - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cond_invert_involution() {
        static ALL: [Cond; 16] = [
            Cond::Eq,
            Cond::Ne,
            Cond::Hs,
            Cond::Lo,
            Cond::Mi,
            Cond::Pl,
            Cond::Vs,
            Cond::Vc,
            Cond::Hi,
            Cond::Ls,
            Cond::Ge,
            Cond::Lt,
            Cond::Gt,
            Cond::Le,
            Cond::Al,
            Cond::Nv,
        ];
        for &cond in &ALL {
            assert_eq!(cond.invert().invert(), cond);
        }
        assert_eq!(Cond::Al.invert(), Cond::Al);
        assert_eq!(Cond::Eq.invert(), Cond::Ne);
        assert_eq!(Cond::Hs.invert(), Cond::Lo);
        assert_eq!(Cond::Mi.invert(), Cond::Pl);
        assert_eq!(Cond::Vs.invert(), Cond::Vc);
        assert_eq!(Cond::Hi.invert(), Cond::Ls);
        assert_eq!(Cond::Ge.invert(), Cond::Lt);
        assert_eq!(Cond::Gt.invert(), Cond::Le);
    }

    #[test]
    fn vector_size_pairs() {
        assert_eq!(VectorSize::from_ty(crate::ir::types::I32X4).enc_size(), (1, 0b10));
        assert_eq!(VectorSize::Size8x8.enc_size(), (0, 0b00));
        assert_eq!(VectorSize::Size16x4.widen(), VectorSize::Size32x4);
        assert_eq!(VectorSize::Size32x4.halve(), VectorSize::Size32x2);
    }
}
