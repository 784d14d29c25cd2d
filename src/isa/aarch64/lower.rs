//! Lowering rules for AArch64: the rule engine, extractors, and shared
//! helpers.
//!
//! A lowering rule pairs an IR pattern with a constructor that builds the
//! machine-instruction sequence; each rule carries a numeric priority.
//! For each IR instruction, the engine enumerates the applicable rules in
//! descending priority order and fires the first whose extractors all
//! succeed. Extractors are pure queries over the data flow graph that
//! return either a structured match or nothing.

use crate::ir::{FloatCC, IntCC};
use crate::ir::{self, Opcode, Value};
use crate::isa::aarch64::abi::AArch64ABICallee;
use crate::isa::aarch64::inst::*;
use crate::isa::aarch64::pcc::FactFlowState;
use crate::machinst::{ty_bits, Lower, Reg, RegClass, Writable};

pub(crate) mod lower_inst;

/// The state a rule body operates on: the generic lowering context plus
/// the ABI frame descriptor and the provenance facts for this function.
pub(crate) struct AArch64LowerCtx<'a, 'f> {
    pub lower: &'a mut Lower<'f, Inst>,
    pub abi: &'a AArch64ABICallee,
    pub facts: &'a FactFlowState,
}

/// One lowering rule: a name (for the coverage tracker), a priority, and
/// the matcher/constructor body. The body returns `None` when one of its
/// extractors fails; the engine then tries the next rule.
pub(crate) struct Rule {
    pub name: &'static str,
    pub prio: u32,
    pub apply: for<'a, 'f> fn(&mut AArch64LowerCtx<'a, 'f>, ir::Inst) -> Option<()>,
}

//============================================================================
// Condition-code mappings.

/// Map an integer condition code to an AArch64 condition.
pub(crate) fn lower_condcode(cc: IntCC) -> Cond {
    match cc {
        IntCC::Equal => Cond::Eq,
        IntCC::NotEqual => Cond::Ne,
        IntCC::SignedGreaterThanOrEqual => Cond::Ge,
        IntCC::SignedGreaterThan => Cond::Gt,
        IntCC::SignedLessThanOrEqual => Cond::Le,
        IntCC::SignedLessThan => Cond::Lt,
        IntCC::UnsignedGreaterThanOrEqual => Cond::Hs,
        IntCC::UnsignedGreaterThan => Cond::Hi,
        IntCC::UnsignedLessThanOrEqual => Cond::Ls,
        IntCC::UnsignedLessThan => Cond::Lo,
    }
}

/// How a float condition code is realized after an `FCMP`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FloatCCMapping {
    /// A single condition test suffices.
    Single(Cond),
    /// The result is the OR of two condition tests on the same flags.
    OrPair(Cond, Cond),
}

/// Map a float condition code per the FCMP NZCV assignments:
/// UN -> 0011, EQ -> 0110, LT -> 1000, GT -> 0010.
pub(crate) fn expand_float_cc(cc: FloatCC) -> FloatCCMapping {
    use FloatCCMapping::*;
    match cc {
        // EQ | LT | GT: V clear.
        FloatCC::Ordered => Single(Cond::Vc),
        // UN: V set.
        FloatCC::Unordered => Single(Cond::Vs),
        FloatCC::Equal => Single(Cond::Eq),
        // UN | LT | GT: Z clear.
        FloatCC::NotEqual => Single(Cond::Ne),
        FloatCC::LessThan => Single(Cond::Mi),
        FloatCC::LessThanOrEqual => Single(Cond::Ls),
        FloatCC::GreaterThan => Single(Cond::Gt),
        FloatCC::GreaterThanOrEqual => Single(Cond::Ge),
        // The unordered compounds need two tests over one comparison.
        FloatCC::OrderedNotEqual => OrPair(Cond::Mi, Cond::Gt),
        FloatCC::UnorderedOrEqual => OrPair(Cond::Eq, Cond::Vs),
        FloatCC::UnorderedOrLessThan => OrPair(Cond::Mi, Cond::Vs),
        FloatCC::UnorderedOrLessThanOrEqual => OrPair(Cond::Ls, Cond::Vs),
        FloatCC::UnorderedOrGreaterThan => OrPair(Cond::Gt, Cond::Vs),
        FloatCC::UnorderedOrGreaterThanOrEqual => OrPair(Cond::Ge, Cond::Vs),
    }
}

//============================================================================
// Extractors: pure queries over the DFG, returning a typed match or
// nothing.

/// Value fits the Imm12 domain.
pub(crate) fn imm12_from_u64(v: u64) -> Option<Imm12> {
    Imm12::maybe_from_u64(v)
}

/// `val` is an integer constant whose negation fits in Imm12; the caller
/// rewrites the operation to its additive inverse.
pub(crate) fn imm12_from_negated_value(
    ctx: &Lower<Inst>,
    val: Value,
) -> Option<Imm12> {
    let c = ctx.get_value_constant(val)?;
    Imm12::maybe_from_u64((c as i64).wrapping_neg() as u64)
}

/// Value is a legal shift amount.
pub(crate) fn imm_shift_from_u64(v: u64) -> Option<ImmShift> {
    ImmShift::maybe_from_u64(v)
}

/// Value is a legal logical bitmask for the type.
pub(crate) fn imm_logic_from_u64(ty: ir::Type, v: u64) -> Option<ImmLogic> {
    let size = OperandSize::from_ty(ty);
    let v = if size.is32() { v & 0xffff_ffff } else { v };
    ImmLogic::maybe_from_u64(v, size)
}

/// Value is at most 4095.
pub(crate) fn uimm12(v: u64) -> Option<u64> {
    if v <= 4095 { Some(v) } else { None }
}

/// Value is at most 65535.
pub(crate) fn uimm16(v: u64) -> Option<u64> {
    if v <= 65535 { Some(v) } else { None }
}

/// Value is a legal register-shift amount.
pub(crate) fn valid_shift_imm(v: u64) -> Option<u8> {
    if v <= 63 { Some(v as u8) } else { None }
}

/// A left-rotate amount `k` for a `width`-bit value, rewritten to the
/// equivalent right-rotate amount `width - k`.
pub(crate) fn valid_rotl_imm(width: u64, k: u64) -> Option<u64> {
    if k < width && width <= 64 {
        Some(width - k)
    } else {
        None
    }
}

/// A load/store offset valid for a scaled unsigned 12-bit form at the
/// given access type.
pub(crate) fn valid_ldr_imm_offset(ty: ir::Type, off: i64) -> Option<i64> {
    let size = i64::from(ty.bytes());
    if off >= 0 && off <= 4095 * size && off % size == 0 && off <= 32760 {
        Some(off)
    } else {
        None
    }
}

/// A value that is a sign- or zero-extension (either an explicit
/// `uextend`/`sextend`, or an extending load), usable as the
/// extended-register operand of an ALU instruction. Returns the
/// pre-extension value (or the load result) and the extend operator.
pub(crate) fn extended_value_from_value(
    ctx: &Lower<Inst>,
    val: Value,
) -> Option<(Value, ExtendOp)> {
    let def_inst = match ctx.dfg().value_def(val) {
        ir::ValueDef::Result(inst, 0) => inst,
        _ => return None,
    };
    let op = ctx.data(def_inst).opcode();
    let out_bits = ty_bits(ctx.value_ty(val));

    match op {
        Opcode::Uextend | Opcode::Sextend => {
            let inner = ctx.input_as_value(def_inst, 0);
            let inner_bits = ty_bits(ctx.value_ty(inner));
            debug_assert!(inner_bits < out_bits);
            let signed = op == Opcode::Sextend;
            let extendop = match (signed, inner_bits) {
                (true, 8) => ExtendOp::SXTB,
                (false, 8) => ExtendOp::UXTB,
                (true, 16) => ExtendOp::SXTH,
                (false, 16) => ExtendOp::UXTH,
                (true, 32) => ExtendOp::SXTW,
                (false, 32) => ExtendOp::UXTW,
                _ => return None,
            };
            Some((inner, extendop))
        }
        // An extending load has already produced an extended value in its
        // register; the matching extend op re-describes those bits.
        Opcode::Sload8 => Some((val, ExtendOp::SXTB)),
        Opcode::Uload8 => Some((val, ExtendOp::UXTB)),
        Opcode::Sload16 => Some((val, ExtendOp::SXTH)),
        Opcode::Uload16 => Some((val, ExtendOp::UXTH)),
        Opcode::Sload32 => Some((val, ExtendOp::SXTW)),
        Opcode::Uload32 => Some((val, ExtendOp::UXTW)),
        _ => None,
    }
}

/// The type is a vector the machine can hold in one register: lane size
/// in {8, 16, 32, 64} and total width 64 or 128 bits. Returns (lane
/// bits, lane count). Anything else falls through to the scalarization
/// fallback rules.
pub(crate) fn multi_lane(ty: ir::Type) -> Option<(u32, u32)> {
    if !ty.is_vector() {
        return None;
    }
    let lane_bits = ty.lane_bits();
    let total = ty.bits();
    if !matches!(lane_bits, 8 | 16 | 32 | 64) || !matches!(total, 64 | 128) {
        return None;
    }
    Some((lane_bits, ty.lane_count()))
}

/// The type fits in 64 bits.
pub(crate) fn fits_in_64(ty: ir::Type) -> Option<ir::Type> {
    if ty.bits() <= 64 { Some(ty) } else { None }
}

/// The lane type fits in 32 bits.
pub(crate) fn lane_fits_in_32(ty: ir::Type) -> Option<ir::Type> {
    if ty.lane_bits() <= 32 { Some(ty) } else { None }
}

fn shuffle_mask_bytes(mask: u128) -> [u8; 16] {
    mask.to_le_bytes()
}

/// The shuffle mask broadcasts one 8-bit lane; returns the lane index.
pub(crate) fn shuffle_dup8_from_imm(mask: u128) -> Option<u8> {
    let bytes = shuffle_mask_bytes(mask);
    let lane = bytes[0];
    if lane < 16 && bytes.iter().all(|&b| b == lane) {
        Some(lane)
    } else {
        None
    }
}

/// The shuffle mask broadcasts one 16-bit lane; returns the lane index.
pub(crate) fn shuffle_dup16_from_imm(mask: u128) -> Option<u8> {
    let bytes = shuffle_mask_bytes(mask);
    let lane = bytes[0] / 2;
    if bytes[0] % 2 != 0 || lane >= 8 {
        return None;
    }
    for i in 0..8 {
        if bytes[2 * i] != lane * 2 || bytes[2 * i + 1] != lane * 2 + 1 {
            return None;
        }
    }
    Some(lane)
}

/// The shuffle mask broadcasts one 32-bit lane; returns the lane index.
pub(crate) fn shuffle_dup32_from_imm(mask: u128) -> Option<u8> {
    let bytes = shuffle_mask_bytes(mask);
    let lane = bytes[0] / 4;
    if bytes[0] % 4 != 0 || lane >= 4 {
        return None;
    }
    for i in 0..4 {
        for j in 0..4 {
            if bytes[4 * i + j] != lane * 4 + j as u8 {
                return None;
            }
        }
    }
    Some(lane)
}

/// The shuffle mask broadcasts one 64-bit lane; returns the lane index.
pub(crate) fn shuffle_dup64_from_imm(mask: u128) -> Option<u8> {
    let bytes = shuffle_mask_bytes(mask);
    let lane = bytes[0] / 8;
    if bytes[0] % 8 != 0 || lane >= 2 {
        return None;
    }
    for i in 0..2 {
        for j in 0..8 {
            if bytes[8 * i + j] != lane * 8 + j as u8 {
                return None;
            }
        }
    }
    Some(lane)
}

/// The shuffle mask selects 16 consecutive bytes starting at `start < 16`
/// from the concatenation of the two inputs: an `EXT` byte rotation.
pub(crate) fn vec_extract_imm4_from_immediate(mask: u128) -> Option<u8> {
    let bytes = shuffle_mask_bytes(mask);
    let start = bytes[0];
    if start >= 16 {
        return None;
    }
    for (i, &b) in bytes.iter().enumerate() {
        if b != (start + i as u8) % 32 {
            return None;
        }
    }
    Some(start)
}

//============================================================================
// Helpers shared by the rule bodies.

/// How to treat a narrow (< 64 bit) input value when putting it in a
/// register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NarrowValueMode {
    /// The high bits don't matter.
    None,
    /// Zero-extend to 32 bits.
    ZeroExtend32,
    /// Sign-extend to 32 bits.
    SignExtend32,
    /// Zero-extend to 64 bits.
    ZeroExtend64,
    /// Sign-extend to 64 bits.
    SignExtend64,
}

/// Put an input value into a register, inserting an extend when the
/// narrow-value mode requires one.
pub(crate) fn put_input_in_reg(
    ctx: &mut Lower<Inst>,
    val: Value,
    narrow_mode: NarrowValueMode,
) -> Reg {
    let ty = ctx.value_ty(val);
    let from_bits = ty.bits().min(64) as u8;
    let reg = ctx.put_value_in_reg(val);
    match (narrow_mode, from_bits) {
        (NarrowValueMode::None, _) => reg,
        (NarrowValueMode::ZeroExtend32, n) | (NarrowValueMode::SignExtend32, n) if n >= 32 => reg,
        (NarrowValueMode::ZeroExtend64, 64) | (NarrowValueMode::SignExtend64, 64) => reg,
        (mode, from_bits) => {
            let tmp = ctx.alloc_tmp(RegClass::Int);
            let signed = matches!(
                mode,
                NarrowValueMode::SignExtend32 | NarrowValueMode::SignExtend64
            );
            let to_bits = match mode {
                NarrowValueMode::ZeroExtend32 | NarrowValueMode::SignExtend32 => 32,
                _ => 64,
            };
            ctx.emit(Inst::Extend {
                rd: tmp,
                rn: reg,
                signed,
                from_bits,
                to_bits,
            });
            tmp.to_reg()
        }
    }
}

/// The result of trying to fit an input as the second operand of an
/// arithmetic instruction.
pub(crate) enum ResultRSEImm12 {
    /// A register.
    Reg(Reg),
    /// A register with an extend operator.
    RegExtend(Reg, ExtendOp),
    /// An immediate.
    Imm12(Imm12),
}

/// Fit an input into register/extended-register/imm12 form for an
/// add/sub-family operation. If the constant only fits negated, the
/// second return value is true and the caller must invert the operation:
/// the arithmetic-immediate legalization ladder's "negate" step.
pub(crate) fn put_input_in_rse_imm12_maybe_negated(
    ctx: &mut Lower<Inst>,
    val: Value,
) -> (ResultRSEImm12, bool) {
    if let Some(c) = ctx.get_value_constant(val) {
        if let Some(imm12) = imm12_from_u64(c) {
            return (ResultRSEImm12::Imm12(imm12), false);
        }
    }
    if let Some(imm12) = imm12_from_negated_value(ctx, val) {
        return (ResultRSEImm12::Imm12(imm12), true);
    }
    if let Some((inner, extendop)) = extended_value_from_value(ctx, val) {
        let reg = ctx.put_value_in_reg(inner);
        return (ResultRSEImm12::RegExtend(reg, extendop), false);
    }
    (
        ResultRSEImm12::Reg(put_input_in_reg(ctx, val, NarrowValueMode::None)),
        false,
    )
}

/// Build an add/sub-family instruction from a fitted second operand.
pub(crate) fn alu_inst_imm12(
    alu_op: ALUOp,
    size: OperandSize,
    rd: Writable<Reg>,
    rn: Reg,
    rm: ResultRSEImm12,
) -> Inst {
    match rm {
        ResultRSEImm12::Imm12(imm12) => Inst::AluRRImm12 {
            alu_op,
            size,
            rd,
            rn,
            imm12,
        },
        ResultRSEImm12::RegExtend(rm, extendop) => Inst::AluRRRExtend {
            alu_op,
            size,
            rd,
            rn,
            rm,
            extendop,
        },
        ResultRSEImm12::Reg(rm) => Inst::AluRRR {
            alu_op,
            size,
            rd,
            rn,
            rm,
        },
    }
}

/// Materialize a 64-bit constant into `rd`. Small and bitmask constants
/// use the MOVZ/MOVN/ORR-immediate forms; values with at most three
/// significant half-words synthesize via MOVZ/MOVN plus MOVKs; anything
/// denser comes from the literal pool.
pub(crate) fn lower_constant_u64(ctx: &mut Lower<Inst>, rd: Writable<Reg>, value: u64) {
    if let Some(value) = uimm16(value) {
        // A single unshifted 16-bit chunk: one MOVZ.
        ctx.emit(Inst::MovWide {
            op: MoveWideOp::MovZ,
            rd,
            imm: MoveWideConst::maybe_from_u64(value).unwrap(),
            size: OperandSize::Size64,
        });
    } else if MoveWideConst::maybe_from_u64(value).is_some()
        || MoveWideConst::maybe_from_u64(!value).is_some()
        || ImmLogic::maybe_from_u64(value, OperandSize::Size64).is_some()
        || significant_half_words(value) <= 3
    {
        for inst in Inst::load_constant(rd, value) {
            ctx.emit(inst);
        }
    } else {
        ctx.emit(Inst::LoadConst64 {
            rd,
            const_data: value,
        });
    }
}

fn significant_half_words(value: u64) -> usize {
    let zeros = (0..4).filter(|i| (value >> (16 * i)) & 0xffff == 0).count();
    let ones = (0..4)
        .filter(|i| (value >> (16 * i)) & 0xffff == 0xffff)
        .count();
    4 - zeros.max(ones)
}

/// Materialize a 32-bit float constant.
pub(crate) fn lower_constant_f32(ctx: &mut Lower<Inst>, rd: Writable<Reg>, value: f32) {
    if let Some(imm) = FpImm8::maybe_from_f32(value) {
        ctx.emit(Inst::FpuMoveFPImm {
            rd,
            imm,
            size: ScalarSize::Size32,
        });
    } else {
        ctx.emit(Inst::LoadFpuConst32 {
            rd,
            const_data: value,
        });
    }
}

/// Materialize a 64-bit float constant.
pub(crate) fn lower_constant_f64(ctx: &mut Lower<Inst>, rd: Writable<Reg>, value: f64) {
    if let Some(imm) = FpImm8::maybe_from_f64(value) {
        ctx.emit(Inst::FpuMoveFPImm {
            rd,
            imm,
            size: ScalarSize::Size64,
        });
    } else {
        ctx.emit(Inst::LoadFpuConst64 {
            rd,
            const_data: value,
        });
    }
}

/// Choose between a 32- and 64-bit form by type width.
pub(crate) fn choose_32_64<T>(ty: ir::Type, op32: T, op64: T) -> T {
    if ty.bits() <= 32 { op32 } else { op64 }
}

/// Compute an addressing mode for a base value plus constant offset.
pub(crate) fn lower_address(
    ctx: &mut Lower<Inst>,
    base: Value,
    offset: i32,
    access_ty: ir::Type,
) -> AMode {
    let base_reg = put_input_in_reg(ctx, base, NarrowValueMode::None);
    if offset == 0 {
        AMode::reg(base_reg)
    } else if let Some(off) = valid_ldr_imm_offset(access_ty, i64::from(offset)) {
        AMode::UnsignedOffset(
            base_reg,
            UImm12Scaled::maybe_from_i64(off, access_ty.bytes() as u8).unwrap(),
        )
    } else if let Some(simm9) = SImm9::maybe_from_i64(i64::from(offset)) {
        AMode::Unscaled(base_reg, simm9)
    } else {
        // Oversized offset: re-express as base + large offset; emission
        // materializes the offset into the spill temporary.
        AMode::RegOffset(base_reg, i64::from(offset), access_ty)
    }
}

/// Emit a comparison that leaves its result in the flags, choosing the
/// immediate form when it fits.
pub(crate) fn lower_icmp_to_flags(
    ctx: &mut Lower<Inst>,
    lhs: Value,
    rhs: Value,
    is_signed: bool,
) {
    let ty = ctx.value_ty(lhs);
    let size = OperandSize::from_ty(ty);
    let narrow_mode = match (ty.bits(), is_signed) {
        (n, _) if n >= 32 => NarrowValueMode::None,
        (_, true) => NarrowValueMode::SignExtend32,
        (_, false) => NarrowValueMode::ZeroExtend32,
    };
    let rn = put_input_in_reg(ctx, lhs, narrow_mode);
    if let Some(c) = ctx.get_value_constant(rhs) {
        if let Some(imm12) = imm12_from_u64(c) {
            ctx.emit(Inst::AluRRImm12 {
                alu_op: ALUOp::SubS,
                size,
                rd: writable_zero_reg(),
                rn,
                imm12,
            });
            return;
        }
        // cmn: compare with the negated constant.
        if let Some(imm12) = Imm12::maybe_from_u64((c as i64).wrapping_neg() as u64) {
            ctx.emit(Inst::AluRRImm12 {
                alu_op: ALUOp::AddS,
                size,
                rd: writable_zero_reg(),
                rn,
                imm12,
            });
            return;
        }
    }
    let rm = put_input_in_reg(ctx, rhs, narrow_mode);
    ctx.emit(Inst::AluRRR {
        alu_op: ALUOp::SubS,
        size,
        rd: writable_zero_reg(),
        rn,
        rm,
    });
}

/// Materialize the boolean result of a float condition into `rd`,
/// assuming an `FpuCmp` has just set the flags.
pub(crate) fn materialize_float_cc(ctx: &mut Lower<Inst>, rd: Writable<Reg>, cc: FloatCC) {
    match expand_float_cc(cc) {
        FloatCCMapping::Single(cond) => {
            ctx.emit(Inst::CSet { rd, cond });
        }
        FloatCCMapping::OrPair(c1, c2) => {
            let t1 = ctx.alloc_tmp(RegClass::Int);
            let t2 = ctx.alloc_tmp(RegClass::Int);
            ctx.emit(Inst::CSet { rd: t1, cond: c1 });
            ctx.emit(Inst::CSet { rd: t2, cond: c2 });
            ctx.emit(Inst::AluRRR {
                alu_op: ALUOp::Orr,
                size: OperandSize::Size64,
                rd,
                rn: t1.to_reg(),
                rm: t2.to_reg(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condcode_table() {
        assert_eq!(lower_condcode(IntCC::Equal), Cond::Eq);
        assert_eq!(lower_condcode(IntCC::NotEqual), Cond::Ne);
        assert_eq!(lower_condcode(IntCC::SignedLessThan), Cond::Lt);
        assert_eq!(lower_condcode(IntCC::SignedGreaterThanOrEqual), Cond::Ge);
        assert_eq!(lower_condcode(IntCC::SignedGreaterThan), Cond::Gt);
        assert_eq!(lower_condcode(IntCC::SignedLessThanOrEqual), Cond::Le);
        assert_eq!(lower_condcode(IntCC::UnsignedLessThan), Cond::Lo);
        assert_eq!(lower_condcode(IntCC::UnsignedGreaterThanOrEqual), Cond::Hs);
        assert_eq!(lower_condcode(IntCC::UnsignedGreaterThan), Cond::Hi);
        assert_eq!(lower_condcode(IntCC::UnsignedLessThanOrEqual), Cond::Ls);
    }

    #[test]
    fn float_cc_table() {
        use FloatCCMapping::*;
        assert_eq!(expand_float_cc(FloatCC::Equal), Single(Cond::Eq));
        assert_eq!(expand_float_cc(FloatCC::NotEqual), Single(Cond::Ne));
        assert_eq!(expand_float_cc(FloatCC::LessThan), Single(Cond::Mi));
        assert_eq!(expand_float_cc(FloatCC::LessThanOrEqual), Single(Cond::Ls));
        assert_eq!(expand_float_cc(FloatCC::GreaterThan), Single(Cond::Gt));
        assert_eq!(
            expand_float_cc(FloatCC::GreaterThanOrEqual),
            Single(Cond::Ge)
        );
        assert_eq!(expand_float_cc(FloatCC::Unordered), Single(Cond::Vs));
        assert_eq!(expand_float_cc(FloatCC::Ordered), Single(Cond::Vc));
        assert_eq!(
            expand_float_cc(FloatCC::UnorderedOrEqual),
            OrPair(Cond::Eq, Cond::Vs)
        );
        assert_eq!(
            expand_float_cc(FloatCC::OrderedNotEqual),
            OrPair(Cond::Mi, Cond::Gt)
        );
    }

    #[test]
    fn rotl_extractor() {
        assert_eq!(valid_rotl_imm(64, 1), Some(63));
        assert_eq!(valid_rotl_imm(32, 8), Some(24));
        assert_eq!(valid_rotl_imm(32, 32), None);
        assert_eq!(valid_rotl_imm(128, 1), None);
    }

    #[test]
    fn shuffle_extractors() {
        // Broadcast of byte lane 3.
        let mask = u128::from_le_bytes([3; 16]);
        assert_eq!(shuffle_dup8_from_imm(mask), Some(3));
        assert_eq!(shuffle_dup16_from_imm(mask), None);

        // Broadcast of 32-bit lane 1: bytes 4,5,6,7 repeated.
        let mask = u128::from_le_bytes([4, 5, 6, 7, 4, 5, 6, 7, 4, 5, 6, 7, 4, 5, 6, 7]);
        assert_eq!(shuffle_dup32_from_imm(mask), Some(1));
        assert_eq!(shuffle_dup8_from_imm(mask), None);

        // Consecutive rotation starting at 3.
        let mut bytes = [0u8; 16];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = ((3 + i) % 32) as u8;
        }
        assert_eq!(vec_extract_imm4_from_immediate(u128::from_le_bytes(bytes)), Some(3));
        // Not consecutive.
        bytes[5] = 0;
        assert_eq!(vec_extract_imm4_from_immediate(u128::from_le_bytes(bytes)), None);
    }

    #[test]
    fn ldr_offset_extractor() {
        assert_eq!(valid_ldr_imm_offset(crate::ir::types::I64, 32760), Some(32760));
        assert_eq!(valid_ldr_imm_offset(crate::ir::types::I64, 32768), None);
        assert_eq!(valid_ldr_imm_offset(crate::ir::types::I64, 12), None);
        assert_eq!(valid_ldr_imm_offset(crate::ir::types::I32, 12), Some(12));
        assert_eq!(valid_ldr_imm_offset(crate::ir::types::I64, -8), None);
    }
}
