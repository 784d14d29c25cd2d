//! This module defines aarch64-specific machine instruction types.

use crate::ir::{ExternalName, MemFlags, TrapCode, Type, types};
use crate::machinst::{MachInst, MachLabel, Reg, RegClass, Writable};
use crate::regalloc::{RegUsageCollector, RegUsageMapper, map_def, map_mod, map_use};
use smallvec::{SmallVec, smallvec};

pub mod args;
pub use self::args::*;
pub mod imms;
pub use self::imms::*;
pub mod regs;
pub use self::regs::*;
pub mod emit;
pub use self::emit::*;

#[cfg(test)]
mod emit_tests;

//=============================================================================
// Instructions (top level): definition

/// An ALU operation. This can be paired with several instruction formats
/// below (see `Inst`) in any combination.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ALUOp {
    /// Add.
    Add,
    /// Subtract.
    Sub,
    /// Bitwise or.
    Orr,
    /// Bitwise or-not (ORN).
    OrrNot,
    /// Bitwise and.
    And,
    /// Bitwise and, setting flags.
    AndS,
    /// Bitwise and-not (BIC).
    AndNot,
    /// Bitwise exclusive or (AArch64 calls this "EOR").
    Eor,
    /// Bitwise exclusive-or-not (EON).
    EorNot,
    /// Add, setting flags.
    AddS,
    /// Subtract, setting flags.
    SubS,
    /// Signed multiply, high-word result.
    SMulH,
    /// Unsigned multiply, high-word result.
    UMulH,
    /// Signed divide.
    SDiv,
    /// Unsigned divide.
    UDiv,
    /// Rotate right.
    RotR,
    /// Logical shift right.
    Lsr,
    /// Arithmetic shift right.
    Asr,
    /// Logical shift left.
    Lsl,
}

impl ALUOp {
    /// The assembly mnemonic for this opcode in register-register form.
    pub fn op_str(&self) -> &'static str {
        match self {
            ALUOp::Add => "add",
            ALUOp::Sub => "sub",
            ALUOp::Orr => "orr",
            ALUOp::OrrNot => "orn",
            ALUOp::And => "and",
            ALUOp::AndS => "ands",
            ALUOp::AndNot => "bic",
            ALUOp::Eor => "eor",
            ALUOp::EorNot => "eon",
            ALUOp::AddS => "adds",
            ALUOp::SubS => "subs",
            ALUOp::SMulH => "smulh",
            ALUOp::UMulH => "umulh",
            ALUOp::SDiv => "sdiv",
            ALUOp::UDiv => "udiv",
            ALUOp::RotR => "ror",
            ALUOp::Lsr => "lsr",
            ALUOp::Asr => "asr",
            ALUOp::Lsl => "lsl",
        }
    }
}

/// A three-source ALU operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ALUOp3 {
    /// Multiply-add.
    MAdd,
    /// Multiply-subtract.
    MSub,
    /// Signed multiply long, adding to a 64-bit accumulator (SMADDL).
    SMAddL,
    /// Unsigned multiply long, adding to a 64-bit accumulator (UMADDL).
    UMAddL,
}

/// A move-wide operation: MOVZ or MOVN. MOVK is separate because of its
/// use-def semantics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MoveWideOp {
    /// Move with zero: other halves cleared.
    MovZ,
    /// Move with NOT: other halves set.
    MovN,
}

/// An operation on the bits of a register.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BitOp {
    /// Bit reverse.
    RBit,
    /// Count leading zeroes.
    Clz,
    /// Count leading sign bits.
    Cls,
    /// Reverse bytes within 16-bit halfwords.
    Rev16,
    /// Reverse bytes within 32-bit words.
    Rev32,
    /// Reverse all 8 bytes (64-bit only).
    Rev64,
}

impl BitOp {
    /// Get the assembly mnemonic for this opcode.
    pub fn op_str(&self) -> &'static str {
        match self {
            BitOp::RBit => "rbit",
            BitOp::Clz => "clz",
            BitOp::Cls => "cls",
            BitOp::Rev16 => "rev16",
            BitOp::Rev32 => "rev32",
            BitOp::Rev64 => "rev64",
        }
    }
}

/// A floating-point unit (FPU) operation with one arg.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FPUOp1 {
    /// Absolute value.
    Abs,
    /// Negate.
    Neg,
    /// Square root.
    Sqrt,
    /// Convert f32 to f64.
    Cvt32To64,
    /// Convert f64 to f32.
    Cvt64To32,
}

/// A floating-point unit (FPU) operation with two args.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FPUOp2 {
    /// Add.
    Add,
    /// Subtract.
    Sub,
    /// Multiply.
    Mul,
    /// Divide.
    Div,
    /// Maximum.
    Max,
    /// Minimum.
    Min,
}

/// A conversion from an FP to an integer value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum FpuToIntOp {
    F32ToU32,
    F32ToI32,
    F32ToU64,
    F32ToI64,
    F64ToU32,
    F64ToI32,
    F64ToU64,
    F64ToI64,
}

/// A conversion from an integer to an FP value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum IntToFpuOp {
    U32ToF32,
    I32ToF32,
    U32ToF64,
    I32ToF64,
    U64ToF32,
    I64ToF32,
    U64ToF64,
    I64ToF64,
}

/// Modes for FP rounding ops: round down (floor) or up (ceil), toward
/// zero (trunc), or to nearest, for 32- or 64-bit FP values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum FpuRoundMode {
    Minus32,
    Minus64,
    Plus32,
    Plus64,
    Zero32,
    Zero64,
    Nearest32,
    Nearest64,
}

/// Type of vector element extensions (SSHLL/USHLL with a zero shift).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VecExtendOp {
    /// Signed extension of 8-bit elements.
    Sxtl8,
    /// Signed extension of 16-bit elements.
    Sxtl16,
    /// Signed extension of 32-bit elements.
    Sxtl32,
    /// Unsigned extension of 8-bit elements.
    Uxtl8,
    /// Unsigned extension of 16-bit elements.
    Uxtl16,
    /// Unsigned extension of 32-bit elements.
    Uxtl32,
}

/// A vector ALU operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VecALUOp {
    /// Add.
    Add,
    /// Subtract.
    Sub,
    /// Multiply.
    Mul,
    /// Bitwise and.
    And,
    /// Bitwise bit clear.
    Bic,
    /// Bitwise inclusive or.
    Orr,
    /// Bitwise exclusive or.
    Eor,
    /// Bitwise select.
    Bsl,
    /// Zip vectors (primary).
    Zip1,
    /// Zip vectors (secondary).
    Zip2,
    /// Unzip vectors (primary).
    Uzp1,
    /// Unzip vectors (secondary).
    Uzp2,
    /// Transpose vectors (primary).
    Trn1,
    /// Transpose vectors (secondary).
    Trn2,
    /// Signed minimum.
    Smin,
    /// Signed maximum.
    Smax,
    /// Unsigned minimum.
    Umin,
    /// Unsigned maximum.
    Umax,
    /// Signed shift left (register).
    Sshl,
    /// Unsigned shift left (register).
    Ushl,
}

/// A vector miscellaneous operation with two registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VecMisc2 {
    /// Bitwise NOT.
    Not,
    /// Negate.
    Neg,
    /// Absolute value.
    Abs,
    /// Floating-point absolute value.
    Fabs,
    /// Floating-point negate.
    Fneg,
}

/// A saturating vector narrowing operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VecRRNarrowOp {
    /// Signed saturating extract narrow.
    Sqxtn,
    /// Signed saturating extract unsigned narrow.
    Sqxtun,
    /// Unsigned saturating extract narrow.
    Uqxtn,
}

/// An operation across the lanes of a vector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VecLanesOp {
    /// Sum across vector.
    Addv,
    /// Unsigned minimum across vector.
    Uminv,
    /// Unsigned maximum across vector.
    Umaxv,
}

/// A shift-by-immediate operation on vector lanes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VecShiftImmOp {
    /// Shift left.
    Shl,
    /// Signed shift right.
    Sshr,
    /// Unsigned shift right.
    Ushr,
}

/// Additional information for (direct) Call instructions, left out of line
/// to lower the size of the Inst enum.
#[derive(Clone, Debug)]
pub struct CallInfo {
    /// The destination symbol.
    pub dest: ExternalName,
    /// Registers read by the call (argument registers).
    pub uses: Vec<Reg>,
    /// Registers written by the call (return and caller-saved registers).
    pub defs: Vec<Writable<Reg>>,
}

/// Additional information for CallInd instructions.
#[derive(Clone, Debug)]
pub struct CallIndInfo {
    /// The callee address register.
    pub rn: Reg,
    /// Registers read by the call.
    pub uses: Vec<Reg>,
    /// Registers written by the call.
    pub defs: Vec<Writable<Reg>>,
}

/// Instruction formats.
#[derive(Clone, Debug)]
pub enum Inst {
    /// A no-op of zero size.
    Nop0,

    /// A no-op that is one instruction large.
    Nop4,

    /// An ALU operation with two register sources and a register
    /// destination.
    AluRRR {
        alu_op: ALUOp,
        size: OperandSize,
        rd: Writable<Reg>,
        rn: Reg,
        rm: Reg,
    },
    /// An ALU operation with three register sources and a register
    /// destination.
    AluRRRR {
        alu_op: ALUOp3,
        size: OperandSize,
        rd: Writable<Reg>,
        rn: Reg,
        rm: Reg,
        ra: Reg,
    },
    /// An ALU operation with a register source and an immediate-12 source,
    /// and a register destination.
    AluRRImm12 {
        alu_op: ALUOp,
        size: OperandSize,
        rd: Writable<Reg>,
        rn: Reg,
        imm12: Imm12,
    },
    /// An ALU operation with a register source and an immediate-logic
    /// source, and a register destination.
    AluRRImmLogic {
        alu_op: ALUOp,
        size: OperandSize,
        rd: Writable<Reg>,
        rn: Reg,
        imml: ImmLogic,
    },
    /// An ALU operation with a register source and an immediate-shiftamt
    /// source, and a register destination.
    AluRRImmShift {
        alu_op: ALUOp,
        size: OperandSize,
        rd: Writable<Reg>,
        rn: Reg,
        immshift: ImmShift,
    },
    /// An ALU operation with two register sources, one of which can be
    /// shifted, and a register destination.
    AluRRRShift {
        alu_op: ALUOp,
        size: OperandSize,
        rd: Writable<Reg>,
        rn: Reg,
        rm: Reg,
        shiftop: ShiftOpAndAmt,
    },
    /// An ALU operation with two register sources, one of which can be
    /// {zero,sign}-extended and shifted, and a register destination.
    AluRRRExtend {
        alu_op: ALUOp,
        size: OperandSize,
        rd: Writable<Reg>,
        rn: Reg,
        rm: Reg,
        extendop: ExtendOp,
    },

    /// A bit op instruction with a single register source.
    BitRR {
        op: BitOp,
        size: OperandSize,
        rd: Writable<Reg>,
        rn: Reg,
    },

    /// An unsigned (zero-extending) 8-bit load.
    ULoad8 {
        rd: Writable<Reg>,
        mem: AMode,
        flags: MemFlags,
    },
    /// A signed (sign-extending) 8-bit load.
    SLoad8 {
        rd: Writable<Reg>,
        mem: AMode,
        flags: MemFlags,
    },
    /// An unsigned (zero-extending) 16-bit load.
    ULoad16 {
        rd: Writable<Reg>,
        mem: AMode,
        flags: MemFlags,
    },
    /// A signed (sign-extending) 16-bit load.
    SLoad16 {
        rd: Writable<Reg>,
        mem: AMode,
        flags: MemFlags,
    },
    /// An unsigned (zero-extending) 32-bit load.
    ULoad32 {
        rd: Writable<Reg>,
        mem: AMode,
        flags: MemFlags,
    },
    /// A signed (sign-extending) 32-bit load.
    SLoad32 {
        rd: Writable<Reg>,
        mem: AMode,
        flags: MemFlags,
    },
    /// A 64-bit load.
    ULoad64 {
        rd: Writable<Reg>,
        mem: AMode,
        flags: MemFlags,
    },

    /// An 8-bit store.
    Store8 {
        rd: Reg,
        mem: AMode,
        flags: MemFlags,
    },
    /// A 16-bit store.
    Store16 {
        rd: Reg,
        mem: AMode,
        flags: MemFlags,
    },
    /// A 32-bit store.
    Store32 {
        rd: Reg,
        mem: AMode,
        flags: MemFlags,
    },
    /// A 64-bit store.
    Store64 {
        rd: Reg,
        mem: AMode,
        flags: MemFlags,
    },

    /// A store of a pair of X-registers.
    StoreP64 {
        rt: Reg,
        rt2: Reg,
        mem: PairAMode,
        flags: MemFlags,
    },
    /// A load of a pair of X-registers.
    LoadP64 {
        rt: Writable<Reg>,
        rt2: Writable<Reg>,
        mem: PairAMode,
        flags: MemFlags,
    },
    /// A store of a pair of D-registers (the low 64 bits of V-registers).
    FpuStoreP64 {
        rt: Reg,
        rt2: Reg,
        mem: PairAMode,
        flags: MemFlags,
    },
    /// A load of a pair of D-registers.
    FpuLoadP64 {
        rt: Writable<Reg>,
        rt2: Writable<Reg>,
        mem: PairAMode,
        flags: MemFlags,
    },
    /// A store of a pair of full Q-registers.
    FpuStoreP128 {
        rt: Reg,
        rt2: Reg,
        mem: PairAMode,
        flags: MemFlags,
    },
    /// A load of a pair of full Q-registers.
    FpuLoadP128 {
        rt: Writable<Reg>,
        rt2: Writable<Reg>,
        mem: PairAMode,
        flags: MemFlags,
    },

    /// A MOV instruction. These are encoded as ORR's (AluRRR form) but we
    /// keep them separate at the `Inst` level for better pretty-printing
    /// and faster `is_move()` logic. The 32-bit form zeroes the top 32
    /// bits of the destination and is effectively an unsigned
    /// 32-to-64-bit extension.
    Mov {
        size: OperandSize,
        rd: Writable<Reg>,
        rm: Reg,
    },

    /// A MOVZ or MOVN with a 16-bit immediate.
    MovWide {
        op: MoveWideOp,
        rd: Writable<Reg>,
        imm: MoveWideConst,
        size: OperandSize,
    },

    /// A MOVK with a 16-bit immediate. Keeps the other three 16-bit
    /// halves of the destination, so it reads the register it writes.
    MovK {
        rd: Writable<Reg>,
        imm: MoveWideConst,
        size: OperandSize,
    },

    /// A sign- or zero-extend operation.
    Extend {
        rd: Writable<Reg>,
        rn: Reg,
        signed: bool,
        from_bits: u8,
        to_bits: u8,
    },

    /// A conditional-select operation.
    CSel {
        rd: Writable<Reg>,
        cond: Cond,
        rn: Reg,
        rm: Reg,
    },

    /// A conditional-set operation: rd = 1 if cond else 0.
    CSet {
        rd: Writable<Reg>,
        cond: Cond,
    },

    /// A conditional comparison with an immediate.
    CCmpImm {
        size: OperandSize,
        rn: Reg,
        imm: UImm5,
        nzcv: NZCV,
        cond: Cond,
    },

    /// FPU move, 64 bits. Distinct from a vector-register move: moving
    /// just 64 bits is significantly faster.
    FpuMove64 {
        rd: Writable<Reg>,
        rn: Reg,
    },

    /// Vector register move, 128 bits.
    FpuMove128 {
        rd: Writable<Reg>,
        rn: Reg,
    },

    /// 1-op FPU instruction.
    FpuRR {
        fpu_op: FPUOp1,
        size: ScalarSize,
        rd: Writable<Reg>,
        rn: Reg,
    },

    /// 2-op FPU instruction.
    FpuRRR {
        fpu_op: FPUOp2,
        size: ScalarSize,
        rd: Writable<Reg>,
        rn: Reg,
        rm: Reg,
    },

    /// FPU comparison.
    FpuCmp {
        size: ScalarSize,
        rn: Reg,
        rm: Reg,
    },

    /// FPU comparison against +0.0.
    FpuCmpZero {
        size: ScalarSize,
        rn: Reg,
    },

    /// Floating-point load, single-precision (32 bit).
    FpuLoad32 {
        rd: Writable<Reg>,
        mem: AMode,
        flags: MemFlags,
    },
    /// Floating-point store, single-precision (32 bit).
    FpuStore32 {
        rd: Reg,
        mem: AMode,
        flags: MemFlags,
    },
    /// Floating-point load, double-precision (64 bit).
    FpuLoad64 {
        rd: Writable<Reg>,
        mem: AMode,
        flags: MemFlags,
    },
    /// Floating-point store, double-precision (64 bit).
    FpuStore64 {
        rd: Reg,
        mem: AMode,
        flags: MemFlags,
    },
    /// Floating-point/vector load, 128 bit.
    FpuLoad128 {
        rd: Writable<Reg>,
        mem: AMode,
        flags: MemFlags,
    },
    /// Floating-point/vector store, 128 bit.
    FpuStore128 {
        rd: Reg,
        mem: AMode,
        flags: MemFlags,
    },

    /// FMOV (scalar, immediate): load an FP-8 encodable constant.
    FpuMoveFPImm {
        rd: Writable<Reg>,
        imm: FpImm8,
        size: ScalarSize,
    },

    /// Load a 32-bit floating-point constant from the literal pool.
    LoadFpuConst32 {
        rd: Writable<Reg>,
        const_data: f32,
    },

    /// Load a 64-bit floating-point constant from the literal pool.
    LoadFpuConst64 {
        rd: Writable<Reg>,
        const_data: f64,
    },

    /// Conversion: FP -> integer.
    FpuToInt {
        op: FpuToIntOp,
        rd: Writable<Reg>,
        rn: Reg,
    },

    /// Conversion: integer -> FP.
    IntToFpu {
        op: IntToFpuOp,
        rd: Writable<Reg>,
        rn: Reg,
    },

    /// FP conditional select.
    FpuCSel {
        size: ScalarSize,
        rd: Writable<Reg>,
        rn: Reg,
        rm: Reg,
        cond: Cond,
    },

    /// Round to integer.
    FpuRound {
        op: FpuRoundMode,
        rd: Writable<Reg>,
        rn: Reg,
    },

    /// Move from a GPR to a scalar FP register.
    MovToFpu {
        rd: Writable<Reg>,
        rn: Reg,
        size: ScalarSize,
    },

    /// Move to a GPR from a vector element.
    MovFromVec {
        rd: Writable<Reg>,
        rn: Reg,
        idx: u8,
        size: VectorSize,
    },

    /// Move to a scalar FP register from a vector element (DUP scalar).
    FpuMoveFromVec {
        rd: Writable<Reg>,
        rn: Reg,
        idx: u8,
        size: VectorSize,
    },

    /// Move to a vector element from a GPR (INS Vd.Ts[idx], Xn). Keeps
    /// the other lanes, so it reads the register it writes.
    MovToVec {
        rd: Writable<Reg>,
        rn: Reg,
        idx: u8,
        size: VectorSize,
    },

    /// Move one vector element to another vector element (INS
    /// Vd.Ts[dest_idx], Vn.Ts[src_idx]). Use-def for the same reason as
    /// `MovToVec`.
    VecMovElement {
        rd: Writable<Reg>,
        rn: Reg,
        dest_idx: u8,
        src_idx: u8,
        size: VectorSize,
    },

    /// Duplicate general-purpose register to vector.
    VecDup {
        rd: Writable<Reg>,
        rn: Reg,
        size: VectorSize,
    },

    /// Duplicate scalar FP register to vector.
    VecDupFromFpu {
        rd: Writable<Reg>,
        rn: Reg,
        size: VectorSize,
    },

    /// Duplicate a vector lane to all lanes.
    VecDupLane {
        rd: Writable<Reg>,
        rn: Reg,
        size: VectorSize,
        idx: u8,
    },

    /// Vector extend: SSHLL/USHLL by zero. `high_half` selects
    /// SSHLL2/USHLL2, consuming the upper half of the input.
    VecExtend {
        t: VecExtendOp,
        rd: Writable<Reg>,
        rn: Reg,
        high_half: bool,
    },

    /// A vector ALU op.
    VecRRR {
        alu_op: VecALUOp,
        rd: Writable<Reg>,
        rn: Reg,
        rm: Reg,
        size: VectorSize,
    },

    /// Vector two-register miscellaneous instruction.
    VecMisc {
        op: VecMisc2,
        rd: Writable<Reg>,
        rn: Reg,
        size: VectorSize,
    },

    /// Saturating vector narrow. `lane_size` is the destination lane
    /// width. `high_half` selects the "2" form, which writes the upper
    /// half of the destination and preserves the lower (hence use-def).
    VecRRNarrow {
        op: VecRRNarrowOp,
        rd: Writable<Reg>,
        rn: Reg,
        lane_size: ScalarSize,
        high_half: bool,
    },

    /// FCVTL/FCVTL2: widen f32 lanes to f64.
    VecFpWiden {
        rd: Writable<Reg>,
        rn: Reg,
        high_half: bool,
    },

    /// FCVTN/FCVTN2: narrow f64 lanes to f32. The "2" form is use-def.
    VecFpNarrow {
        rd: Writable<Reg>,
        rn: Reg,
        high_half: bool,
    },

    /// Vector instruction across lanes.
    VecLanes {
        op: VecLanesOp,
        rd: Writable<Reg>,
        rn: Reg,
        size: VectorSize,
    },

    /// Vector shift by immediate.
    VecShiftImm {
        op: VecShiftImmOp,
        rd: Writable<Reg>,
        rn: Reg,
        size: VectorSize,
        imm: u8,
    },

    /// Vector extract: a rotation of consecutive bytes from a register
    /// pair (EXT Vd.16B, Vn.16B, Vm.16B, #imm4).
    VecExtract {
        rd: Writable<Reg>,
        rn: Reg,
        rm: Reg,
        imm4: u8,
    },

    /// Table lookup with a two-register table (TBL Vd.16B, {Vn.16B,
    /// Vn+1.16B}, Vm.16B). `rn` and `rn2` must be consecutively numbered
    /// at emission.
    VecTbl2 {
        rd: Writable<Reg>,
        rn: Reg,
        rn2: Reg,
        rm: Reg,
    },

    /// Load-acquire (LDAR/LDARH/LDARB, or the 32-bit form).
    LoadAcquire {
        access_ty: Type,
        rt: Writable<Reg>,
        rn: Reg,
    },

    /// Store-release (STLR/STLRH/STLRB, or the 32-bit form).
    StoreRelease {
        access_ty: Type,
        rt: Reg,
        rn: Reg,
    },

    /// A memory barrier: DMB ISH.
    Fence,

    /// A machine call instruction.
    Call {
        info: Box<CallInfo>,
    },
    /// A machine indirect-call instruction (BLR).
    CallInd {
        info: Box<CallIndInfo>,
    },

    // ---- branches (exactly one must appear at the end of a BB) ----
    /// A machine return instruction (RET, defaulting to X30).
    Ret,

    /// A placeholder instruction, generating no code, meaning that a
    /// function epilogue must be inserted there.
    EpiloguePlaceholder,

    /// An unconditional branch.
    Jump {
        dest: BranchTarget,
    },

    /// A conditional branch. Both targets are emitted: a `b.cond` to the
    /// taken target and a `b` to the not-taken target; emission elides
    /// the trailing branch when the not-taken block is the fallthrough.
    CondBr {
        taken: BranchTarget,
        not_taken: BranchTarget,
        kind: CondBrKind,
    },

    /// A conditional trap: execute a `udf` if the condition is true. In
    /// the emitted code the inverse condition branches over the trap
    /// instruction.
    TrapIf {
        kind: CondBrKind,
        trap_code: TrapCode,
    },

    /// An indirect branch through a register, augmented with the set of
    /// all possible successors.
    IndirectBr {
        rn: Reg,
        targets: Vec<MachLabel>,
    },

    /// A "break" instruction, used for debug breakpoints.
    Brk,

    /// An instruction guaranteed to always be undefined and to trigger an
    /// illegal-instruction trap at runtime.
    Udf {
        trap_code: TrapCode,
    },

    /// Compute the address (using a PC-relative offset) of a nearby
    /// location: ADR.
    Adr {
        rd: Writable<Reg>,
        /// Offset in range -2^20 .. 2^20.
        off: i32,
    },

    /// ADRP: compute the page address of a PC-relative location.
    Adrp {
        rd: Writable<Reg>,
        off: i32,
    },

    /// Load an inline 64-bit constant from the literal pool.
    LoadConst64 {
        rd: Writable<Reg>,
        const_data: u64,
    },

    /// Load the address of an external symbol, via ADRP + ADD with
    /// relocations.
    LoadExtName {
        rd: Writable<Reg>,
        name: Box<ExternalName>,
        offset: i64,
    },

    /// Load the address referenced by `mem` into `rd`.
    LoadAddr {
        rd: Writable<Reg>,
        mem: AMode,
    },
}

fn count_zero_half_words(mut value: u64) -> usize {
    let mut count = 0;
    for _ in 0..4 {
        if value & 0xffff == 0 {
            count += 1;
        }
        value >>= 16;
    }
    count
}

impl Inst {
    /// Create a move instruction for a value of the given type. The type
    /// decides the move width: virtual registers of class `Float` and
    /// `Vector` both map onto the V-register file, so the register class
    /// alone cannot.
    pub fn mov_for_ty(to_reg: Writable<Reg>, from_reg: Reg, ty: Type) -> Inst {
        debug_assert_eq!(
            to_reg.to_reg().class() == RegClass::Int,
            from_reg.class() == RegClass::Int,
        );
        if from_reg.class() == RegClass::Int {
            Inst::Mov {
                size: OperandSize::Size64,
                rd: to_reg,
                rm: from_reg,
            }
        } else if ty.bits() == 128 {
            Inst::FpuMove128 {
                rd: to_reg,
                rn: from_reg,
            }
        } else {
            Inst::FpuMove64 {
                rd: to_reg,
                rn: from_reg,
            }
        }
    }

    /// Create an instruction sequence that loads a constant, using one of
    /// several options (MOVZ, MOVN, logical immediate, or a MOVZ/MOVN
    /// with up to three MOVKs). Constants with four significant half-words
    /// are not materialized here; the lowering engine sends those to the
    /// literal pool instead.
    pub fn load_constant(rd: Writable<Reg>, value: u64) -> SmallVec<[Inst; 4]> {
        if let Some(imm) = MoveWideConst::maybe_from_u64(value) {
            // 16-bit immediate (shifted by 0, 16, 32 or 48 bits) in MOVZ.
            smallvec![Inst::MovWide {
                op: MoveWideOp::MovZ,
                rd,
                imm,
                size: OperandSize::Size64
            }]
        } else if let Some(imm) = MoveWideConst::maybe_from_u64(!value) {
            // 16-bit immediate (shifted by 0, 16, 32 or 48 bits) in MOVN.
            smallvec![Inst::MovWide {
                op: MoveWideOp::MovN,
                rd,
                imm,
                size: OperandSize::Size64
            }]
        } else if let Some(imml) = ImmLogic::maybe_from_u64(value, OperandSize::Size64) {
            // Weird logical-instruction immediate in ORR using the zero
            // register.
            smallvec![Inst::AluRRImmLogic {
                alu_op: ALUOp::Orr,
                size: OperandSize::Size64,
                rd,
                rn: zero_reg(),
                imml,
            }]
        } else {
            let mut insts = smallvec![];

            // If the number of 0xffff half-words is greater than the
            // number of 0x0000 half-words, it is more efficient to use
            // MOVN for the first instruction.
            let first_is_inverted = count_zero_half_words(!value) > count_zero_half_words(value);
            // Either 0xffff or 0x0000 half-words can be skipped, depending
            // on the first instruction used.
            let ignored_halfword = if first_is_inverted { 0xffff } else { 0 };
            let mut first_mov_emitted = false;

            for i in 0..4 {
                let imm16 = (value >> (16 * i)) & 0xffff;
                if imm16 != ignored_halfword {
                    if !first_mov_emitted {
                        first_mov_emitted = true;
                        if first_is_inverted {
                            let imm =
                                MoveWideConst::maybe_with_shift(((!imm16) & 0xffff) as u16, i * 16)
                                    .unwrap();
                            insts.push(Inst::MovWide {
                                op: MoveWideOp::MovN,
                                rd,
                                imm,
                                size: OperandSize::Size64,
                            });
                        } else {
                            let imm =
                                MoveWideConst::maybe_with_shift(imm16 as u16, i * 16).unwrap();
                            insts.push(Inst::MovWide {
                                op: MoveWideOp::MovZ,
                                rd,
                                imm,
                                size: OperandSize::Size64,
                            });
                        }
                    } else {
                        let imm = MoveWideConst::maybe_with_shift(imm16 as u16, i * 16).unwrap();
                        insts.push(Inst::MovK {
                            rd,
                            imm,
                            size: OperandSize::Size64,
                        });
                    }
                }
            }

            assert!(first_mov_emitted);
            insts
        }
    }

    /// Generic constructor for a load of `ty` bits from `mem`.
    pub fn gen_load(into_reg: Writable<Reg>, mem: AMode, ty: Type, flags: MemFlags) -> Inst {
        match ty {
            t if t == types::I8 => Inst::ULoad8 {
                rd: into_reg,
                mem,
                flags,
            },
            t if t == types::I16 => Inst::ULoad16 {
                rd: into_reg,
                mem,
                flags,
            },
            t if t == types::I32 => Inst::ULoad32 {
                rd: into_reg,
                mem,
                flags,
            },
            t if t == types::I64 || t == types::R64 => Inst::ULoad64 {
                rd: into_reg,
                mem,
                flags,
            },
            t if t == types::F32 => Inst::FpuLoad32 {
                rd: into_reg,
                mem,
                flags,
            },
            t if t == types::F64 => Inst::FpuLoad64 {
                rd: into_reg,
                mem,
                flags,
            },
            t if t.is_vector() && t.bits() == 128 => Inst::FpuLoad128 {
                rd: into_reg,
                mem,
                flags,
            },
            t if t.is_vector() && t.bits() == 64 => Inst::FpuLoad64 {
                rd: into_reg,
                mem,
                flags,
            },
            t => panic!("gen_load: unsupported type {}", t),
        }
    }

    /// Generic constructor for a store of `ty` bits to `mem`.
    pub fn gen_store(mem: AMode, from_reg: Reg, ty: Type, flags: MemFlags) -> Inst {
        match ty {
            t if t == types::I8 => Inst::Store8 {
                rd: from_reg,
                mem,
                flags,
            },
            t if t == types::I16 => Inst::Store16 {
                rd: from_reg,
                mem,
                flags,
            },
            t if t == types::I32 => Inst::Store32 {
                rd: from_reg,
                mem,
                flags,
            },
            t if t == types::I64 || t == types::R64 => Inst::Store64 {
                rd: from_reg,
                mem,
                flags,
            },
            t if t == types::F32 => Inst::FpuStore32 {
                rd: from_reg,
                mem,
                flags,
            },
            t if t == types::F64 => Inst::FpuStore64 {
                rd: from_reg,
                mem,
                flags,
            },
            t if t.is_vector() && t.bits() == 128 => Inst::FpuStore128 {
                rd: from_reg,
                mem,
                flags,
            },
            t if t.is_vector() && t.bits() == 64 => Inst::FpuStore64 {
                rd: from_reg,
                mem,
                flags,
            },
            t => panic!("gen_store: unsupported type {}", t),
        }
    }
}

//=============================================================================
// Instructions: get_regs

fn memarg_regs(memarg: &AMode, collector: &mut RegUsageCollector) {
    match memarg {
        &AMode::Unscaled(reg, ..) | &AMode::UnsignedOffset(reg, ..) => {
            collector.add_use(reg);
        }
        &AMode::RegReg(r1, r2, ..)
        | &AMode::RegScaled(r1, r2, ..)
        | &AMode::RegScaledExtended(r1, r2, ..) => {
            collector.add_use(r1);
            collector.add_use(r2);
        }
        &AMode::Label(..) => {}
        &AMode::PreIndexed(reg, ..) | &AMode::PostIndexed(reg, ..) => {
            collector.add_mod(reg);
        }
        &AMode::FPOffset(..) => {
            collector.add_use(fp_reg());
        }
        &AMode::SPOffset(..) | &AMode::IncomingArg(..) => {
            collector.add_use(stack_reg());
        }
        &AMode::RegOffset(r, ..) => {
            collector.add_use(r);
        }
    }
}

fn pairmemarg_regs(pairmemarg: &PairAMode, collector: &mut RegUsageCollector) {
    match pairmemarg {
        &PairAMode::SignedOffset(reg, ..) => {
            collector.add_use(reg);
        }
        &PairAMode::PreIndexed(reg, ..) | &PairAMode::PostIndexed(reg, ..) => {
            collector.add_mod(reg);
        }
    }
}

/// Collect the register mentions of one instruction, in source order:
/// this is the extraction half of the register-allocator bridge.
pub fn aarch64_get_regs(inst: &Inst, collector: &mut RegUsageCollector) {
    match inst {
        &Inst::AluRRR { rd, rn, rm, .. } => {
            collector.add_use(rn);
            collector.add_use(rm);
            collector.add_def(rd);
        }
        &Inst::AluRRRR { rd, rn, rm, ra, .. } => {
            collector.add_use(rn);
            collector.add_use(rm);
            collector.add_use(ra);
            collector.add_def(rd);
        }
        &Inst::AluRRImm12 { rd, rn, .. }
        | &Inst::AluRRImmLogic { rd, rn, .. }
        | &Inst::AluRRImmShift { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::AluRRRShift { rd, rn, rm, .. } | &Inst::AluRRRExtend { rd, rn, rm, .. } => {
            collector.add_use(rn);
            collector.add_use(rm);
            collector.add_def(rd);
        }
        &Inst::BitRR { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::ULoad8 { rd, ref mem, .. }
        | &Inst::SLoad8 { rd, ref mem, .. }
        | &Inst::ULoad16 { rd, ref mem, .. }
        | &Inst::SLoad16 { rd, ref mem, .. }
        | &Inst::ULoad32 { rd, ref mem, .. }
        | &Inst::SLoad32 { rd, ref mem, .. }
        | &Inst::ULoad64 { rd, ref mem, .. }
        | &Inst::FpuLoad32 { rd, ref mem, .. }
        | &Inst::FpuLoad64 { rd, ref mem, .. }
        | &Inst::FpuLoad128 { rd, ref mem, .. } => {
            memarg_regs(mem, collector);
            collector.add_def(rd);
        }
        &Inst::Store8 { rd, ref mem, .. }
        | &Inst::Store16 { rd, ref mem, .. }
        | &Inst::Store32 { rd, ref mem, .. }
        | &Inst::Store64 { rd, ref mem, .. }
        | &Inst::FpuStore32 { rd, ref mem, .. }
        | &Inst::FpuStore64 { rd, ref mem, .. }
        | &Inst::FpuStore128 { rd, ref mem, .. } => {
            collector.add_use(rd);
            memarg_regs(mem, collector);
        }
        &Inst::StoreP64 {
            rt, rt2, ref mem, ..
        }
        | &Inst::FpuStoreP64 {
            rt, rt2, ref mem, ..
        }
        | &Inst::FpuStoreP128 {
            rt, rt2, ref mem, ..
        } => {
            collector.add_use(rt);
            collector.add_use(rt2);
            pairmemarg_regs(mem, collector);
        }
        &Inst::LoadP64 {
            rt, rt2, ref mem, ..
        }
        | &Inst::FpuLoadP64 {
            rt, rt2, ref mem, ..
        }
        | &Inst::FpuLoadP128 {
            rt, rt2, ref mem, ..
        } => {
            pairmemarg_regs(mem, collector);
            collector.add_def(rt);
            collector.add_def(rt2);
        }
        &Inst::Mov { rd, rm, .. } => {
            collector.add_use(rm);
            collector.add_def(rd);
        }
        &Inst::MovWide { rd, .. } => {
            collector.add_def(rd);
        }
        &Inst::MovK { rd, .. } => {
            // MOVK reads the untouched 16-bit halves before writing.
            collector.add_mod(rd);
        }
        &Inst::CSel { rd, rn, rm, .. } => {
            collector.add_use(rn);
            collector.add_use(rm);
            collector.add_def(rd);
        }
        &Inst::CSet { rd, .. } => {
            collector.add_def(rd);
        }
        &Inst::CCmpImm { rn, .. } => {
            collector.add_use(rn);
        }
        &Inst::FpuMove64 { rd, rn } | &Inst::FpuMove128 { rd, rn } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::FpuRR { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::FpuRRR { rd, rn, rm, .. } => {
            collector.add_use(rn);
            collector.add_use(rm);
            collector.add_def(rd);
        }
        &Inst::FpuCmp { rn, rm, .. } => {
            collector.add_use(rn);
            collector.add_use(rm);
        }
        &Inst::FpuCmpZero { rn, .. } => {
            collector.add_use(rn);
        }
        &Inst::FpuMoveFPImm { rd, .. }
        | &Inst::LoadFpuConst32 { rd, .. }
        | &Inst::LoadFpuConst64 { rd, .. } => {
            collector.add_def(rd);
        }
        &Inst::FpuToInt { rd, rn, .. } | &Inst::IntToFpu { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::FpuCSel { rd, rn, rm, .. } => {
            collector.add_use(rn);
            collector.add_use(rm);
            collector.add_def(rd);
        }
        &Inst::FpuRound { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::MovToFpu { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::MovFromVec { rd, rn, .. } | &Inst::FpuMoveFromVec { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::MovToVec { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_mod(rd);
        }
        &Inst::VecMovElement { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_mod(rd);
        }
        &Inst::VecDup { rd, rn, .. }
        | &Inst::VecDupFromFpu { rd, rn, .. }
        | &Inst::VecDupLane { rd, rn, .. }
        | &Inst::VecExtend { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::VecRRR {
            alu_op, rd, rn, rm, ..
        } => {
            collector.add_use(rn);
            collector.add_use(rm);
            if alu_op == VecALUOp::Bsl {
                collector.add_mod(rd);
            } else {
                collector.add_def(rd);
            }
        }
        &Inst::VecMisc { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::VecRRNarrow {
            rd, rn, high_half, ..
        } => {
            collector.add_use(rn);
            if high_half {
                collector.add_mod(rd);
            } else {
                collector.add_def(rd);
            }
        }
        &Inst::VecFpWiden { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::VecFpNarrow {
            rd, rn, high_half, ..
        } => {
            collector.add_use(rn);
            if high_half {
                collector.add_mod(rd);
            } else {
                collector.add_def(rd);
            }
        }
        &Inst::VecLanes { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::VecShiftImm { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::VecExtract { rd, rn, rm, .. } => {
            collector.add_use(rn);
            collector.add_use(rm);
            collector.add_def(rd);
        }
        &Inst::VecTbl2 { rd, rn, rn2, rm } => {
            collector.add_use(rn);
            collector.add_use(rn2);
            collector.add_use(rm);
            collector.add_def(rd);
        }
        &Inst::LoadAcquire { rt, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rt);
        }
        &Inst::StoreRelease { rt, rn, .. } => {
            collector.add_use(rt);
            collector.add_use(rn);
        }
        &Inst::Fence => {}
        &Inst::Extend { rd, rn, .. } => {
            collector.add_use(rn);
            collector.add_def(rd);
        }
        &Inst::Jump { .. } | &Inst::Ret | &Inst::EpiloguePlaceholder => {}
        &Inst::Call { ref info, .. } => {
            collector.add_uses(&info.uses);
            collector.add_defs(&info.defs);
        }
        &Inst::CallInd { ref info, .. } => {
            collector.add_use(info.rn);
            collector.add_uses(&info.uses);
            collector.add_defs(&info.defs);
        }
        &Inst::CondBr { ref kind, .. } | &Inst::TrapIf { ref kind, .. } => match kind {
            CondBrKind::Zero(rt) | CondBrKind::NotZero(rt) => {
                collector.add_use(*rt);
            }
            CondBrKind::Cond(_) => {}
        },
        &Inst::IndirectBr { rn, .. } => {
            collector.add_use(rn);
        }
        &Inst::Nop0 | &Inst::Nop4 | &Inst::Brk | &Inst::Udf { .. } => {}
        &Inst::Adr { rd, .. } | &Inst::Adrp { rd, .. } => {
            collector.add_def(rd);
        }
        &Inst::LoadConst64 { rd, .. } | &Inst::LoadExtName { rd, .. } => {
            collector.add_def(rd);
        }
        &Inst::LoadAddr { rd, ref mem } => {
            memarg_regs(mem, collector);
            collector.add_def(rd);
        }
    }
}

//=============================================================================
// Instructions: map_regs

fn map_mem<RUM: RegUsageMapper>(m: &RUM, mem: &mut AMode) {
    // The only addressing modes that update registers (pre/post-increment)
    // both read and write them, so they are "mods" and identical in the
    // pre- and post-maps.
    match mem {
        AMode::Unscaled(reg, ..) | AMode::UnsignedOffset(reg, ..) => map_use(m, reg),
        AMode::RegReg(r1, r2)
        | AMode::RegScaled(r1, r2, ..)
        | AMode::RegScaledExtended(r1, r2, ..) => {
            map_use(m, r1);
            map_use(m, r2);
        }
        AMode::Label(..) => {}
        AMode::PreIndexed(r, ..) | AMode::PostIndexed(r, ..) => map_mod(m, r),
        AMode::FPOffset(..) | AMode::SPOffset(..) | AMode::IncomingArg(..) => {}
        AMode::RegOffset(r, ..) => map_use(m, r),
    }
}

fn map_pairmem<RUM: RegUsageMapper>(m: &RUM, mem: &mut PairAMode) {
    match mem {
        PairAMode::SignedOffset(reg, ..) => map_use(m, reg),
        PairAMode::PreIndexed(reg, ..) | PairAMode::PostIndexed(reg, ..) => map_mod(m, reg),
    }
}

fn map_br<RUM: RegUsageMapper>(m: &RUM, br: &mut CondBrKind) {
    match br {
        CondBrKind::Zero(reg) | CondBrKind::NotZero(reg) => map_use(m, reg),
        CondBrKind::Cond(..) => {}
    }
}

/// Replace every virtual register in the instruction with its physical
/// assignment: the application half of the register-allocator bridge.
/// Running this twice is a no-op, since physical registers are left
/// untouched.
pub fn aarch64_map_regs<RUM: RegUsageMapper>(inst: &mut Inst, mapper: &RUM) {
    match inst {
        Inst::AluRRR { rd, rn, rm, .. } => {
            map_use(mapper, rn);
            map_use(mapper, rm);
            map_def(mapper, rd);
        }
        Inst::AluRRRR { rd, rn, rm, ra, .. } => {
            map_use(mapper, rn);
            map_use(mapper, rm);
            map_use(mapper, ra);
            map_def(mapper, rd);
        }
        Inst::AluRRImm12 { rd, rn, .. }
        | Inst::AluRRImmLogic { rd, rn, .. }
        | Inst::AluRRImmShift { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::AluRRRShift { rd, rn, rm, .. } | Inst::AluRRRExtend { rd, rn, rm, .. } => {
            map_use(mapper, rn);
            map_use(mapper, rm);
            map_def(mapper, rd);
        }
        Inst::BitRR { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::ULoad8 { rd, mem, .. }
        | Inst::SLoad8 { rd, mem, .. }
        | Inst::ULoad16 { rd, mem, .. }
        | Inst::SLoad16 { rd, mem, .. }
        | Inst::ULoad32 { rd, mem, .. }
        | Inst::SLoad32 { rd, mem, .. }
        | Inst::ULoad64 { rd, mem, .. }
        | Inst::FpuLoad32 { rd, mem, .. }
        | Inst::FpuLoad64 { rd, mem, .. }
        | Inst::FpuLoad128 { rd, mem, .. } => {
            map_mem(mapper, mem);
            map_def(mapper, rd);
        }
        Inst::Store8 { rd, mem, .. }
        | Inst::Store16 { rd, mem, .. }
        | Inst::Store32 { rd, mem, .. }
        | Inst::Store64 { rd, mem, .. }
        | Inst::FpuStore32 { rd, mem, .. }
        | Inst::FpuStore64 { rd, mem, .. }
        | Inst::FpuStore128 { rd, mem, .. } => {
            map_use(mapper, rd);
            map_mem(mapper, mem);
        }
        Inst::StoreP64 { rt, rt2, mem, .. }
        | Inst::FpuStoreP64 { rt, rt2, mem, .. }
        | Inst::FpuStoreP128 { rt, rt2, mem, .. } => {
            map_use(mapper, rt);
            map_use(mapper, rt2);
            map_pairmem(mapper, mem);
        }
        Inst::LoadP64 { rt, rt2, mem, .. }
        | Inst::FpuLoadP64 { rt, rt2, mem, .. }
        | Inst::FpuLoadP128 { rt, rt2, mem, .. } => {
            map_pairmem(mapper, mem);
            map_def(mapper, rt);
            map_def(mapper, rt2);
        }
        Inst::Mov { rd, rm, .. } => {
            map_use(mapper, rm);
            map_def(mapper, rd);
        }
        Inst::MovWide { rd, .. } => map_def(mapper, rd),
        Inst::MovK { rd, .. } => map_mod(mapper, rd),
        Inst::CSel { rd, rn, rm, .. } => {
            map_use(mapper, rn);
            map_use(mapper, rm);
            map_def(mapper, rd);
        }
        Inst::CSet { rd, .. } => map_def(mapper, rd),
        Inst::CCmpImm { rn, .. } => map_use(mapper, rn),
        Inst::FpuMove64 { rd, rn } | Inst::FpuMove128 { rd, rn } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::FpuRR { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::FpuRRR { rd, rn, rm, .. } => {
            map_use(mapper, rn);
            map_use(mapper, rm);
            map_def(mapper, rd);
        }
        Inst::FpuCmp { rn, rm, .. } => {
            map_use(mapper, rn);
            map_use(mapper, rm);
        }
        Inst::FpuCmpZero { rn, .. } => {
            map_use(mapper, rn);
        }
        Inst::FpuMoveFPImm { rd, .. }
        | Inst::LoadFpuConst32 { rd, .. }
        | Inst::LoadFpuConst64 { rd, .. } => map_def(mapper, rd),
        Inst::FpuToInt { rd, rn, .. } | Inst::IntToFpu { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::FpuCSel { rd, rn, rm, .. } => {
            map_use(mapper, rn);
            map_use(mapper, rm);
            map_def(mapper, rd);
        }
        Inst::FpuRound { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::MovToFpu { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::MovFromVec { rd, rn, .. } | Inst::FpuMoveFromVec { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::MovToVec { rd, rn, .. } => {
            map_use(mapper, rn);
            map_mod(mapper, rd);
        }
        Inst::VecMovElement { rd, rn, .. } => {
            map_use(mapper, rn);
            map_mod(mapper, rd);
        }
        Inst::VecDup { rd, rn, .. }
        | Inst::VecDupFromFpu { rd, rn, .. }
        | Inst::VecDupLane { rd, rn, .. }
        | Inst::VecExtend { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::VecRRR {
            alu_op, rd, rn, rm, ..
        } => {
            map_use(mapper, rn);
            map_use(mapper, rm);
            if *alu_op == VecALUOp::Bsl {
                map_mod(mapper, rd);
            } else {
                map_def(mapper, rd);
            }
        }
        Inst::VecMisc { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::VecRRNarrow {
            rd, rn, high_half, ..
        } => {
            map_use(mapper, rn);
            if *high_half {
                map_mod(mapper, rd);
            } else {
                map_def(mapper, rd);
            }
        }
        Inst::VecFpWiden { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::VecFpNarrow {
            rd, rn, high_half, ..
        } => {
            map_use(mapper, rn);
            if *high_half {
                map_mod(mapper, rd);
            } else {
                map_def(mapper, rd);
            }
        }
        Inst::VecLanes { rd, rn, .. } | Inst::VecShiftImm { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::VecExtract { rd, rn, rm, .. } => {
            map_use(mapper, rn);
            map_use(mapper, rm);
            map_def(mapper, rd);
        }
        Inst::VecTbl2 { rd, rn, rn2, rm } => {
            map_use(mapper, rn);
            map_use(mapper, rn2);
            map_use(mapper, rm);
            map_def(mapper, rd);
        }
        Inst::LoadAcquire { rt, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rt);
        }
        Inst::StoreRelease { rt, rn, .. } => {
            map_use(mapper, rt);
            map_use(mapper, rn);
        }
        Inst::Fence => {}
        Inst::Extend { rd, rn, .. } => {
            map_use(mapper, rn);
            map_def(mapper, rd);
        }
        Inst::Jump { .. } | Inst::Ret | Inst::EpiloguePlaceholder => {}
        Inst::Call { info } => {
            for r in info.uses.iter_mut() {
                map_use(mapper, r);
            }
            for r in info.defs.iter_mut() {
                map_def(mapper, r);
            }
        }
        Inst::CallInd { info } => {
            map_use(mapper, &mut info.rn);
            for r in info.uses.iter_mut() {
                map_use(mapper, r);
            }
            for r in info.defs.iter_mut() {
                map_def(mapper, r);
            }
        }
        Inst::CondBr { kind, .. } | Inst::TrapIf { kind, .. } => map_br(mapper, kind),
        Inst::IndirectBr { rn, .. } => map_use(mapper, rn),
        Inst::Nop0 | Inst::Nop4 | Inst::Brk | Inst::Udf { .. } => {}
        Inst::Adr { rd, .. } | Inst::Adrp { rd, .. } => map_def(mapper, rd),
        Inst::LoadConst64 { rd, .. } | Inst::LoadExtName { rd, .. } => map_def(mapper, rd),
        Inst::LoadAddr { rd, mem } => {
            map_mem(mapper, mem);
            map_def(mapper, rd);
        }
    }
}

//=============================================================================
// Instructions: misc functions and external interface

impl MachInst for Inst {
    fn gen_move(dst: Writable<Reg>, src: Reg, ty: Type) -> Inst {
        Inst::mov_for_ty(dst, src, ty)
    }

    fn rc_for_type(ty: Type) -> RegClass {
        if ty.is_float() {
            RegClass::Float
        } else if ty.is_vector() {
            RegClass::Vector
        } else {
            RegClass::Int
        }
    }

    fn is_term(&self) -> bool {
        matches!(
            self,
            Inst::Ret
                | Inst::EpiloguePlaceholder
                | Inst::Jump { .. }
                | Inst::CondBr { .. }
                | Inst::IndirectBr { .. }
                | Inst::Udf { .. }
        )
    }
}

//=============================================================================
// Pretty-printing.

fn mem_show(mem: &AMode) -> String {
    match mem {
        &AMode::Unscaled(reg, simm9) => {
            if simm9.value != 0 {
                format!("[{}, {}]", reg, simm9)
            } else {
                format!("[{}]", reg)
            }
        }
        &AMode::UnsignedOffset(reg, uimm12) => {
            if uimm12.value != 0 {
                format!("[{}, {}]", reg, uimm12)
            } else {
                format!("[{}]", reg)
            }
        }
        &AMode::RegReg(r1, r2) => format!("[{}, {}]", r1, r2),
        &AMode::RegScaled(r1, r2, ty) => {
            format!("[{}, {}, LSL #{}]", r1, r2, shift_for_type(ty))
        }
        &AMode::RegScaledExtended(r1, r2, ty, op) => {
            let size = match op {
                ExtendOp::SXTW | ExtendOp::UXTW => OperandSize::Size32,
                _ => OperandSize::Size64,
            };
            format!(
                "[{}, {}, {:?} #{}]",
                r1,
                show_ireg_sized(r2, size),
                op,
                shift_for_type(ty)
            )
        }
        &AMode::Label(MemLabel::PCRel(off)) => format!("pc+{}", off),
        &AMode::Label(MemLabel::Mach(label)) => format!("label{}", label.as_u32()),
        &AMode::PreIndexed(r, simm9) => format!("[{}, {}]!", r.to_reg(), simm9),
        &AMode::PostIndexed(r, simm9) => format!("[{}], {}", r.to_reg(), simm9),
        &AMode::RegOffset(r, off, ..) => format!("[{}, #{}]", r, off),
        &AMode::SPOffset(off, ..) => format!("[sp, #{}]", off),
        &AMode::FPOffset(off, ..) => format!("[fp, #{}]", off),
        &AMode::IncomingArg(off, ..) => format!("[incoming_arg, #{}]", off),
    }
}

fn pairmem_show(mem: &PairAMode) -> String {
    match mem {
        &PairAMode::SignedOffset(reg, simm7) => {
            if simm7.value != 0 {
                format!("[{}, {}]", reg, simm7)
            } else {
                format!("[{}]", reg)
            }
        }
        &PairAMode::PreIndexed(reg, simm7) => format!("[{}, {}]!", reg.to_reg(), simm7),
        &PairAMode::PostIndexed(reg, simm7) => format!("[{}], {}", reg.to_reg(), simm7),
    }
}

fn shift_for_type(ty: Type) -> usize {
    match ty.bytes() {
        1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        16 => 4,
        _ => panic!("unknown type: {}", ty),
    }
}

fn cond_br_show(kind: &CondBrKind, target: String) -> String {
    match kind {
        CondBrKind::Zero(reg) => format!("cbz {}, {}", reg, target),
        CondBrKind::NotZero(reg) => format!("cbnz {}, {}", reg, target),
        CondBrKind::Cond(c) => format!("b.{} {}", c.name(), target),
    }
}

fn branch_target_show(target: &BranchTarget) -> String {
    match target {
        BranchTarget::Label(l) => format!("label{}", l.as_u32()),
        BranchTarget::ResolvedOffset(off) => format!("{}", off),
    }
}

impl Inst {
    /// Produce a canonical assembly-like rendition of this instruction,
    /// used by tests and diagnostics only.
    pub fn show(&self) -> String {
        fn op_name_size(alu_op: ALUOp) -> &'static str {
            alu_op.op_str()
        }

        match self {
            &Inst::Nop0 => "nop-zero-len".to_string(),
            &Inst::Nop4 => "nop".to_string(),
            &Inst::AluRRR {
                alu_op,
                size,
                rd,
                rn,
                rm,
            } => {
                let (rd, rn, rm) = (
                    show_ireg_sized(rd.to_reg(), size),
                    show_ireg_sized(rn, size),
                    show_ireg_sized(rm, size),
                );
                format!("{} {}, {}, {}", op_name_size(alu_op), rd, rn, rm)
            }
            &Inst::AluRRRR {
                alu_op,
                size,
                rd,
                rn,
                rm,
                ra,
            } => {
                let op = match alu_op {
                    ALUOp3::MAdd => "madd",
                    ALUOp3::MSub => "msub",
                    ALUOp3::SMAddL => "smaddl",
                    ALUOp3::UMAddL => "umaddl",
                };
                let src_size = if matches!(alu_op, ALUOp3::SMAddL | ALUOp3::UMAddL) {
                    OperandSize::Size32
                } else {
                    size
                };
                format!(
                    "{} {}, {}, {}, {}",
                    op,
                    show_ireg_sized(rd.to_reg(), size),
                    show_ireg_sized(rn, src_size),
                    show_ireg_sized(rm, src_size),
                    show_ireg_sized(ra, size)
                )
            }
            &Inst::AluRRImm12 {
                alu_op,
                size,
                rd,
                rn,
                ref imm12,
            } => {
                if alu_op == ALUOp::Add && imm12.bits == 0 && rn == stack_reg() {
                    // special-case MOV (used for moving SP).
                    format!("mov {}, {}", show_ireg_sized(rd.to_reg(), size), rn)
                } else {
                    format!(
                        "{} {}, {}, {}",
                        op_name_size(alu_op),
                        show_ireg_sized(rd.to_reg(), size),
                        show_ireg_sized(rn, size),
                        imm12
                    )
                }
            }
            &Inst::AluRRImmLogic {
                alu_op,
                size,
                rd,
                rn,
                ref imml,
            } => {
                format!(
                    "{} {}, {}, {}",
                    op_name_size(alu_op),
                    show_ireg_sized(rd.to_reg(), size),
                    show_ireg_sized(rn, size),
                    imml
                )
            }
            &Inst::AluRRImmShift {
                alu_op,
                size,
                rd,
                rn,
                ref immshift,
            } => {
                format!(
                    "{} {}, {}, {}",
                    op_name_size(alu_op),
                    show_ireg_sized(rd.to_reg(), size),
                    show_ireg_sized(rn, size),
                    immshift
                )
            }
            &Inst::AluRRRShift {
                alu_op,
                size,
                rd,
                rn,
                rm,
                ref shiftop,
            } => {
                format!(
                    "{} {}, {}, {}, {:?} {}",
                    op_name_size(alu_op),
                    show_ireg_sized(rd.to_reg(), size),
                    show_ireg_sized(rn, size),
                    show_ireg_sized(rm, size),
                    shiftop.op(),
                    shiftop.amt().value()
                )
            }
            &Inst::AluRRRExtend {
                alu_op,
                size,
                rd,
                rn,
                rm,
                extendop,
            } => {
                format!(
                    "{} {}, {}, {}, {:?}",
                    op_name_size(alu_op),
                    show_ireg_sized(rd.to_reg(), size),
                    show_ireg_sized(rn, size),
                    show_ireg_sized(rm, size),
                    extendop
                )
            }
            &Inst::BitRR { op, size, rd, rn } => {
                format!(
                    "{} {}, {}",
                    op.op_str(),
                    show_ireg_sized(rd.to_reg(), size),
                    show_ireg_sized(rn, size)
                )
            }
            &Inst::ULoad8 { rd, ref mem, .. } => {
                format!(
                    "ldrb {}, {}",
                    show_ireg_sized(rd.to_reg(), OperandSize::Size32),
                    mem_show(mem)
                )
            }
            &Inst::SLoad8 { rd, ref mem, .. } => {
                format!("ldrsb {}, {}", rd.to_reg(), mem_show(mem))
            }
            &Inst::ULoad16 { rd, ref mem, .. } => {
                format!(
                    "ldrh {}, {}",
                    show_ireg_sized(rd.to_reg(), OperandSize::Size32),
                    mem_show(mem)
                )
            }
            &Inst::SLoad16 { rd, ref mem, .. } => {
                format!("ldrsh {}, {}", rd.to_reg(), mem_show(mem))
            }
            &Inst::ULoad32 { rd, ref mem, .. } => {
                format!(
                    "ldr {}, {}",
                    show_ireg_sized(rd.to_reg(), OperandSize::Size32),
                    mem_show(mem)
                )
            }
            &Inst::SLoad32 { rd, ref mem, .. } => {
                format!("ldrsw {}, {}", rd.to_reg(), mem_show(mem))
            }
            &Inst::ULoad64 { rd, ref mem, .. } => {
                format!("ldr {}, {}", rd.to_reg(), mem_show(mem))
            }
            &Inst::Store8 { rd, ref mem, .. } => {
                format!(
                    "strb {}, {}",
                    show_ireg_sized(rd, OperandSize::Size32),
                    mem_show(mem)
                )
            }
            &Inst::Store16 { rd, ref mem, .. } => {
                format!(
                    "strh {}, {}",
                    show_ireg_sized(rd, OperandSize::Size32),
                    mem_show(mem)
                )
            }
            &Inst::Store32 { rd, ref mem, .. } => {
                format!(
                    "str {}, {}",
                    show_ireg_sized(rd, OperandSize::Size32),
                    mem_show(mem)
                )
            }
            &Inst::Store64 { rd, ref mem, .. } => {
                format!("str {}, {}", rd, mem_show(mem))
            }
            &Inst::StoreP64 {
                rt, rt2, ref mem, ..
            } => {
                format!("stp {}, {}, {}", rt, rt2, pairmem_show(mem))
            }
            &Inst::LoadP64 {
                rt, rt2, ref mem, ..
            } => {
                format!("ldp {}, {}, {}", rt.to_reg(), rt2.to_reg(), pairmem_show(mem))
            }
            &Inst::FpuStoreP64 {
                rt, rt2, ref mem, ..
            } => {
                format!(
                    "stp {}, {}, {}",
                    show_vreg_scalar(rt, ScalarSize::Size64),
                    show_vreg_scalar(rt2, ScalarSize::Size64),
                    pairmem_show(mem)
                )
            }
            &Inst::FpuLoadP64 {
                rt, rt2, ref mem, ..
            } => {
                format!(
                    "ldp {}, {}, {}",
                    show_vreg_scalar(rt.to_reg(), ScalarSize::Size64),
                    show_vreg_scalar(rt2.to_reg(), ScalarSize::Size64),
                    pairmem_show(mem)
                )
            }
            &Inst::FpuStoreP128 {
                rt, rt2, ref mem, ..
            } => {
                format!(
                    "stp {}, {}, {}",
                    show_vreg_scalar(rt, ScalarSize::Size128),
                    show_vreg_scalar(rt2, ScalarSize::Size128),
                    pairmem_show(mem)
                )
            }
            &Inst::FpuLoadP128 {
                rt, rt2, ref mem, ..
            } => {
                format!(
                    "ldp {}, {}, {}",
                    show_vreg_scalar(rt.to_reg(), ScalarSize::Size128),
                    show_vreg_scalar(rt2.to_reg(), ScalarSize::Size128),
                    pairmem_show(mem)
                )
            }
            &Inst::Mov { size, rd, rm } => {
                format!(
                    "mov {}, {}",
                    show_ireg_sized(rd.to_reg(), size),
                    show_ireg_sized(rm, size)
                )
            }
            &Inst::MovWide {
                op,
                rd,
                ref imm,
                size,
            } => {
                let op = match op {
                    MoveWideOp::MovZ => "movz",
                    MoveWideOp::MovN => "movn",
                };
                format!("{} {}, {}", op, show_ireg_sized(rd.to_reg(), size), imm)
            }
            &Inst::MovK { rd, ref imm, size } => {
                format!("movk {}, {}", show_ireg_sized(rd.to_reg(), size), imm)
            }
            &Inst::Extend {
                rd,
                rn,
                signed,
                from_bits,
                to_bits,
            } => {
                let op = match (signed, from_bits) {
                    (false, 8) => "uxtb",
                    (true, 8) => "sxtb",
                    (false, 16) => "uxth",
                    (true, 16) => "sxth",
                    (false, 32) => "uxtw",
                    (true, 32) => "sxtw",
                    _ => "extend",
                };
                let dest_size = OperandSize::from_bits(u32::from(to_bits));
                format!(
                    "{} {}, {}",
                    op,
                    show_ireg_sized(rd.to_reg(), dest_size),
                    show_ireg_sized(rn, OperandSize::Size32)
                )
            }
            &Inst::CSel { rd, cond, rn, rm } => {
                format!(
                    "csel {}, {}, {}, {}",
                    rd.to_reg(),
                    rn,
                    rm,
                    cond.name()
                )
            }
            &Inst::CSet { rd, cond } => {
                format!("cset {}, {}", rd.to_reg(), cond.name())
            }
            &Inst::CCmpImm {
                size,
                rn,
                ref imm,
                ref nzcv,
                cond,
            } => {
                format!(
                    "ccmp {}, {}, {}, {}",
                    show_ireg_sized(rn, size),
                    imm,
                    nzcv,
                    cond.name()
                )
            }
            &Inst::FpuMove64 { rd, rn } => {
                format!(
                    "fmov {}, {}",
                    show_vreg_scalar(rd.to_reg(), ScalarSize::Size64),
                    show_vreg_scalar(rn, ScalarSize::Size64)
                )
            }
            &Inst::FpuMove128 { rd, rn } => {
                format!(
                    "mov {}, {}",
                    show_vreg_vector(rd.to_reg(), VectorSize::Size8x16),
                    show_vreg_vector(rn, VectorSize::Size8x16)
                )
            }
            &Inst::FpuRR {
                fpu_op,
                size,
                rd,
                rn,
            } => {
                let op = match fpu_op {
                    FPUOp1::Abs => "fabs",
                    FPUOp1::Neg => "fneg",
                    FPUOp1::Sqrt => "fsqrt",
                    FPUOp1::Cvt32To64 | FPUOp1::Cvt64To32 => "fcvt",
                    };
                let (dst_size, src_size) = match fpu_op {
                    FPUOp1::Cvt32To64 => (ScalarSize::Size64, ScalarSize::Size32),
                    FPUOp1::Cvt64To32 => (ScalarSize::Size32, ScalarSize::Size64),
                    _ => (size, size),
                };
                format!(
                    "{} {}, {}",
                    op,
                    show_vreg_scalar(rd.to_reg(), dst_size),
                    show_vreg_scalar(rn, src_size)
                )
            }
            &Inst::FpuRRR {
                fpu_op,
                size,
                rd,
                rn,
                rm,
            } => {
                let op = match fpu_op {
                    FPUOp2::Add => "fadd",
                    FPUOp2::Sub => "fsub",
                    FPUOp2::Mul => "fmul",
                    FPUOp2::Div => "fdiv",
                    FPUOp2::Max => "fmax",
                    FPUOp2::Min => "fmin",
                };
                format!(
                    "{} {}, {}, {}",
                    op,
                    show_vreg_scalar(rd.to_reg(), size),
                    show_vreg_scalar(rn, size),
                    show_vreg_scalar(rm, size)
                )
            }
            &Inst::FpuCmp { size, rn, rm } => {
                format!(
                    "fcmp {}, {}",
                    show_vreg_scalar(rn, size),
                    show_vreg_scalar(rm, size)
                )
            }
            &Inst::FpuCmpZero { size, rn } => {
                format!("fcmp {}, #0.0", show_vreg_scalar(rn, size))
            }
            &Inst::FpuLoad32 { rd, ref mem, .. } => {
                format!(
                    "ldr {}, {}",
                    show_vreg_scalar(rd.to_reg(), ScalarSize::Size32),
                    mem_show(mem)
                )
            }
            &Inst::FpuStore32 { rd, ref mem, .. } => {
                format!(
                    "str {}, {}",
                    show_vreg_scalar(rd, ScalarSize::Size32),
                    mem_show(mem)
                )
            }
            &Inst::FpuLoad64 { rd, ref mem, .. } => {
                format!(
                    "ldr {}, {}",
                    show_vreg_scalar(rd.to_reg(), ScalarSize::Size64),
                    mem_show(mem)
                )
            }
            &Inst::FpuStore64 { rd, ref mem, .. } => {
                format!(
                    "str {}, {}",
                    show_vreg_scalar(rd, ScalarSize::Size64),
                    mem_show(mem)
                )
            }
            &Inst::FpuLoad128 { rd, ref mem, .. } => {
                format!(
                    "ldr {}, {}",
                    show_vreg_scalar(rd.to_reg(), ScalarSize::Size128),
                    mem_show(mem)
                )
            }
            &Inst::FpuStore128 { rd, ref mem, .. } => {
                format!(
                    "str {}, {}",
                    show_vreg_scalar(rd, ScalarSize::Size128),
                    mem_show(mem)
                )
            }
            &Inst::FpuMoveFPImm { rd, ref imm, size } => {
                format!("fmov {}, {}", show_vreg_scalar(rd.to_reg(), size), imm)
            }
            &Inst::LoadFpuConst32 { rd, const_data } => {
                format!(
                    "ldr {}, pcrel_lit ; ={}",
                    show_vreg_scalar(rd.to_reg(), ScalarSize::Size32),
                    const_data
                )
            }
            &Inst::LoadFpuConst64 { rd, const_data } => {
                format!(
                    "ldr {}, pcrel_lit ; ={}",
                    show_vreg_scalar(rd.to_reg(), ScalarSize::Size64),
                    const_data
                )
            }
            &Inst::FpuToInt { op, rd, rn } => {
                let (op_str, dst_size, src_size) = match op {
                    FpuToIntOp::F32ToU32 => ("fcvtzu", OperandSize::Size32, ScalarSize::Size32),
                    FpuToIntOp::F32ToI32 => ("fcvtzs", OperandSize::Size32, ScalarSize::Size32),
                    FpuToIntOp::F32ToU64 => ("fcvtzu", OperandSize::Size64, ScalarSize::Size32),
                    FpuToIntOp::F32ToI64 => ("fcvtzs", OperandSize::Size64, ScalarSize::Size32),
                    FpuToIntOp::F64ToU32 => ("fcvtzu", OperandSize::Size32, ScalarSize::Size64),
                    FpuToIntOp::F64ToI32 => ("fcvtzs", OperandSize::Size32, ScalarSize::Size64),
                    FpuToIntOp::F64ToU64 => ("fcvtzu", OperandSize::Size64, ScalarSize::Size64),
                    FpuToIntOp::F64ToI64 => ("fcvtzs", OperandSize::Size64, ScalarSize::Size64),
                };
                format!(
                    "{} {}, {}",
                    op_str,
                    show_ireg_sized(rd.to_reg(), dst_size),
                    show_vreg_scalar(rn, src_size)
                )
            }
            &Inst::IntToFpu { op, rd, rn } => {
                let (op_str, dst_size, src_size) = match op {
                    IntToFpuOp::U32ToF32 => ("ucvtf", ScalarSize::Size32, OperandSize::Size32),
                    IntToFpuOp::I32ToF32 => ("scvtf", ScalarSize::Size32, OperandSize::Size32),
                    IntToFpuOp::U32ToF64 => ("ucvtf", ScalarSize::Size64, OperandSize::Size32),
                    IntToFpuOp::I32ToF64 => ("scvtf", ScalarSize::Size64, OperandSize::Size32),
                    IntToFpuOp::U64ToF32 => ("ucvtf", ScalarSize::Size32, OperandSize::Size64),
                    IntToFpuOp::I64ToF32 => ("scvtf", ScalarSize::Size32, OperandSize::Size64),
                    IntToFpuOp::U64ToF64 => ("ucvtf", ScalarSize::Size64, OperandSize::Size64),
                    IntToFpuOp::I64ToF64 => ("scvtf", ScalarSize::Size64, OperandSize::Size64),
                };
                format!(
                    "{} {}, {}",
                    op_str,
                    show_vreg_scalar(rd.to_reg(), dst_size),
                    show_ireg_sized(rn, src_size)
                )
            }
            &Inst::FpuCSel {
                size,
                rd,
                rn,
                rm,
                cond,
            } => {
                format!(
                    "fcsel {}, {}, {}, {}",
                    show_vreg_scalar(rd.to_reg(), size),
                    show_vreg_scalar(rn, size),
                    show_vreg_scalar(rm, size),
                    cond.name()
                )
            }
            &Inst::FpuRound { op, rd, rn } => {
                let (op_str, size) = match op {
                    FpuRoundMode::Minus32 => ("frintm", ScalarSize::Size32),
                    FpuRoundMode::Minus64 => ("frintm", ScalarSize::Size64),
                    FpuRoundMode::Plus32 => ("frintp", ScalarSize::Size32),
                    FpuRoundMode::Plus64 => ("frintp", ScalarSize::Size64),
                    FpuRoundMode::Zero32 => ("frintz", ScalarSize::Size32),
                    FpuRoundMode::Zero64 => ("frintz", ScalarSize::Size64),
                    FpuRoundMode::Nearest32 => ("frintn", ScalarSize::Size32),
                    FpuRoundMode::Nearest64 => ("frintn", ScalarSize::Size64),
                };
                format!(
                    "{} {}, {}",
                    op_str,
                    show_vreg_scalar(rd.to_reg(), size),
                    show_vreg_scalar(rn, size)
                )
            }
            &Inst::MovToFpu { rd, rn, size } => {
                let op_size = match size {
                    ScalarSize::Size32 => OperandSize::Size32,
                    _ => OperandSize::Size64,
                };
                format!(
                    "fmov {}, {}",
                    show_vreg_scalar(rd.to_reg(), size),
                    show_ireg_sized(rn, op_size)
                )
            }
            &Inst::MovFromVec { rd, rn, idx, size } => {
                let op = if size.lane_bits() == 64 { "mov" } else { "umov" };
                let dst_size = OperandSize::from_bits(size.lane_bits());
                format!(
                    "{} {}, {}.{}[{}]",
                    op,
                    show_ireg_sized(rd.to_reg(), dst_size),
                    rn,
                    lane_suffix(size),
                    idx
                )
            }
            &Inst::FpuMoveFromVec { rd, rn, idx, size } => {
                format!(
                    "mov {}, {}.{}[{}]",
                    show_vreg_scalar(rd.to_reg(), ScalarSize::from_bits(size.lane_bits())),
                    rn,
                    lane_suffix(size),
                    idx
                )
            }
            &Inst::MovToVec { rd, rn, idx, size } => {
                let src_size = OperandSize::from_bits(size.lane_bits());
                format!(
                    "mov {}.{}[{}], {}",
                    rd.to_reg(),
                    lane_suffix(size),
                    idx,
                    show_ireg_sized(rn, src_size)
                )
            }
            &Inst::VecMovElement {
                rd,
                rn,
                dest_idx,
                src_idx,
                size,
            } => {
                format!(
                    "mov {}.{}[{}], {}.{}[{}]",
                    rd.to_reg(),
                    lane_suffix(size),
                    dest_idx,
                    rn,
                    lane_suffix(size),
                    src_idx
                )
            }
            &Inst::VecDup { rd, rn, size } => {
                let src_size = OperandSize::from_bits(size.lane_bits());
                format!(
                    "dup {}, {}",
                    show_vreg_vector(rd.to_reg(), size),
                    show_ireg_sized(rn, src_size)
                )
            }
            &Inst::VecDupFromFpu { rd, rn, size } => {
                format!(
                    "dup {}, {}",
                    show_vreg_vector(rd.to_reg(), size),
                    show_vreg_scalar(rn, ScalarSize::from_bits(size.lane_bits()))
                )
            }
            &Inst::VecDupLane { rd, rn, size, idx } => {
                format!(
                    "dup {}, {}.{}[{}]",
                    show_vreg_vector(rd.to_reg(), size),
                    rn,
                    lane_suffix(size),
                    idx
                )
            }
            &Inst::VecExtend {
                t,
                rd,
                rn,
                high_half,
            } => {
                let (op, dest_size, src_size) = match t {
                    VecExtendOp::Sxtl8 => ("sshll", VectorSize::Size16x8, VectorSize::Size8x8),
                    VecExtendOp::Sxtl16 => ("sshll", VectorSize::Size32x4, VectorSize::Size16x4),
                    VecExtendOp::Sxtl32 => ("sshll", VectorSize::Size64x2, VectorSize::Size32x2),
                    VecExtendOp::Uxtl8 => ("ushll", VectorSize::Size16x8, VectorSize::Size8x8),
                    VecExtendOp::Uxtl16 => ("ushll", VectorSize::Size32x4, VectorSize::Size16x4),
                    VecExtendOp::Uxtl32 => ("ushll", VectorSize::Size64x2, VectorSize::Size32x2),
                };
                let src_size = if high_half {
                    match src_size {
                        VectorSize::Size8x8 => VectorSize::Size8x16,
                        VectorSize::Size16x4 => VectorSize::Size16x8,
                        VectorSize::Size32x2 => VectorSize::Size32x4,
                        _ => unreachable!(),
                    }
                } else {
                    src_size
                };
                format!(
                    "{}{} {}, {}, #0",
                    op,
                    if high_half { "2" } else { "" },
                    show_vreg_vector(rd.to_reg(), dest_size),
                    show_vreg_vector(rn, src_size)
                )
            }
            &Inst::VecRRR {
                alu_op,
                rd,
                rn,
                rm,
                size,
            } => {
                let op = match alu_op {
                    VecALUOp::Add => "add",
                    VecALUOp::Sub => "sub",
                    VecALUOp::Mul => "mul",
                    VecALUOp::And => "and",
                    VecALUOp::Bic => "bic",
                    VecALUOp::Orr => "orr",
                    VecALUOp::Eor => "eor",
                    VecALUOp::Bsl => "bsl",
                    VecALUOp::Zip1 => "zip1",
                    VecALUOp::Zip2 => "zip2",
                    VecALUOp::Uzp1 => "uzp1",
                    VecALUOp::Uzp2 => "uzp2",
                    VecALUOp::Trn1 => "trn1",
                    VecALUOp::Trn2 => "trn2",
                    VecALUOp::Smin => "smin",
                    VecALUOp::Smax => "smax",
                    VecALUOp::Umin => "umin",
                    VecALUOp::Umax => "umax",
                    VecALUOp::Sshl => "sshl",
                    VecALUOp::Ushl => "ushl",
                };
                format!(
                    "{} {}, {}, {}",
                    op,
                    show_vreg_vector(rd.to_reg(), size),
                    show_vreg_vector(rn, size),
                    show_vreg_vector(rm, size)
                )
            }
            &Inst::VecMisc { op, rd, rn, size } => {
                let op = match op {
                    VecMisc2::Not => "mvn",
                    VecMisc2::Neg => "neg",
                    VecMisc2::Abs => "abs",
                    VecMisc2::Fabs => "fabs",
                    VecMisc2::Fneg => "fneg",
                };
                format!(
                    "{} {}, {}",
                    op,
                    show_vreg_vector(rd.to_reg(), size),
                    show_vreg_vector(rn, size)
                )
            }
            &Inst::VecRRNarrow {
                op,
                rd,
                rn,
                lane_size,
                high_half,
            } => {
                let op = match op {
                    VecRRNarrowOp::Sqxtn => "sqxtn",
                    VecRRNarrowOp::Sqxtun => "sqxtun",
                    VecRRNarrowOp::Uqxtn => "uqxtn",
                };
                let dest = VectorSize::from_lane_size(u32::from(lane_size.bytes()) * 8, high_half);
                let src = VectorSize::from_lane_size(u32::from(lane_size.bytes()) * 16, true);
                format!(
                    "{}{} {}, {}",
                    op,
                    if high_half { "2" } else { "" },
                    show_vreg_vector(rd.to_reg(), dest),
                    show_vreg_vector(rn, src)
                )
            }
            &Inst::VecFpWiden { rd, rn, high_half } => {
                format!(
                    "fcvtl{} {}, {}",
                    if high_half { "2" } else { "" },
                    show_vreg_vector(rd.to_reg(), VectorSize::Size64x2),
                    show_vreg_vector(rn, if high_half { VectorSize::Size32x4 } else { VectorSize::Size32x2 })
                )
            }
            &Inst::VecFpNarrow { rd, rn, high_half } => {
                format!(
                    "fcvtn{} {}, {}",
                    if high_half { "2" } else { "" },
                    show_vreg_vector(rd.to_reg(), if high_half { VectorSize::Size32x4 } else { VectorSize::Size32x2 }),
                    show_vreg_vector(rn, VectorSize::Size64x2)
                )
            }
            &Inst::VecLanes { op, rd, rn, size } => {
                let op = match op {
                    VecLanesOp::Addv => "addv",
                    VecLanesOp::Uminv => "uminv",
                    VecLanesOp::Umaxv => "umaxv",
                };
                format!(
                    "{} {}, {}",
                    op,
                    show_vreg_scalar(rd.to_reg(), ScalarSize::from_bits(size.lane_bits())),
                    show_vreg_vector(rn, size)
                )
            }
            &Inst::VecShiftImm {
                op,
                rd,
                rn,
                size,
                imm,
            } => {
                let op = match op {
                    VecShiftImmOp::Shl => "shl",
                    VecShiftImmOp::Sshr => "sshr",
                    VecShiftImmOp::Ushr => "ushr",
                };
                format!(
                    "{} {}, {}, #{}",
                    op,
                    show_vreg_vector(rd.to_reg(), size),
                    show_vreg_vector(rn, size),
                    imm
                )
            }
            &Inst::VecExtract { rd, rn, rm, imm4 } => {
                format!(
                    "ext {}, {}, {}, #{}",
                    show_vreg_vector(rd.to_reg(), VectorSize::Size8x16),
                    show_vreg_vector(rn, VectorSize::Size8x16),
                    show_vreg_vector(rm, VectorSize::Size8x16),
                    imm4
                )
            }
            &Inst::VecTbl2 { rd, rn, rn2, rm } => {
                format!(
                    "tbl {}, {{ {}, {} }}, {}",
                    show_vreg_vector(rd.to_reg(), VectorSize::Size8x16),
                    show_vreg_vector(rn, VectorSize::Size8x16),
                    show_vreg_vector(rn2, VectorSize::Size8x16),
                    show_vreg_vector(rm, VectorSize::Size8x16)
                )
            }
            &Inst::LoadAcquire { access_ty, rt, rn } => {
                let (op, size) = ldar_name(access_ty);
                format!("{} {}, [{}]", op, show_ireg_sized(rt.to_reg(), size), rn)
            }
            &Inst::StoreRelease { access_ty, rt, rn } => {
                let (op, size) = stlr_name(access_ty);
                format!("{} {}, [{}]", op, show_ireg_sized(rt, size), rn)
            }
            &Inst::Fence => "dmb ish".to_string(),
            &Inst::Call { ref info } => format!("bl {}", info.dest),
            &Inst::CallInd { ref info } => format!("blr {}", info.rn),
            &Inst::Ret => "ret".to_string(),
            &Inst::EpiloguePlaceholder => "epilogue placeholder".to_string(),
            &Inst::Jump { ref dest } => format!("b {}", branch_target_show(dest)),
            &Inst::CondBr {
                ref taken,
                ref not_taken,
                ref kind,
            } => {
                format!(
                    "{} ; b {}",
                    cond_br_show(kind, branch_target_show(taken)),
                    branch_target_show(not_taken)
                )
            }
            &Inst::TrapIf { ref kind, trap_code } => {
                format!(
                    "{} ; udf ; trap={}",
                    cond_br_show(&kind.invert(), "8".to_string()),
                    trap_code
                )
            }
            &Inst::IndirectBr { rn, .. } => format!("br {}", rn),
            &Inst::Brk => "brk #0".to_string(),
            &Inst::Udf { .. } => "udf".to_string(),
            &Inst::Adr { rd, off } => format!("adr {}, pc+{}", rd.to_reg(), off),
            &Inst::Adrp { rd, off } => format!("adrp {}, pc+{}", rd.to_reg(), off),
            &Inst::LoadConst64 { rd, const_data } => {
                format!("ldr {}, pcrel_lit ; ={:#x}", rd.to_reg(), const_data)
            }
            &Inst::LoadExtName {
                rd,
                ref name,
                offset,
            } => {
                format!("adrp {}, {} ; add +{}", rd.to_reg(), name, offset)
            }
            &Inst::LoadAddr { rd, ref mem } => {
                format!("loadaddr {}, {}", rd.to_reg(), mem_show(mem))
            }
        }
    }
}

fn lane_suffix(size: VectorSize) -> &'static str {
    match size.lane_bits() {
        8 => "b",
        16 => "h",
        32 => "s",
        64 => "d",
        _ => unreachable!(),
    }
}

fn ldar_name(ty: Type) -> (&'static str, OperandSize) {
    match ty.bits() {
        8 => ("ldarb", OperandSize::Size32),
        16 => ("ldarh", OperandSize::Size32),
        32 => ("ldar", OperandSize::Size32),
        64 => ("ldar", OperandSize::Size64),
        _ => panic!("bad acquire type"),
    }
}

fn stlr_name(ty: Type) -> (&'static str, OperandSize) {
    match ty.bits() {
        8 => ("stlrb", OperandSize::Size32),
        16 => ("stlrh", OperandSize::Size32),
        32 => ("stlr", OperandSize::Size32),
        64 => ("stlr", OperandSize::Size64),
        _ => panic!("bad release type"),
    }
}
