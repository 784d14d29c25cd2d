//! Per-opcode lowering rules: the rule tables and their bodies.
//!
//! Each rule body is a matcher-plus-constructor: it applies its
//! extractors, returning `None` on the first failure, and otherwise emits
//! the machine instructions and returns `Some(())`. Tables are ordered by
//! descending priority; the engine fires the first matching rule and
//! records its name in the coverage tracker.

use super::*;
use crate::ir::{self, AtomicOrdering, InstructionData, Opcode, TrapCode, Value};
use crate::isa::aarch64::abi::{self, ABIArg, ABIArgSlot};
use crate::isa::aarch64::inst::*;
use crate::machinst::{BlockIndex, Reg, RegClass, Writable};
use crate::result::{CodegenError, CodegenResult};
use smallvec::SmallVec;

type Ctx<'a, 'f> = AArch64LowerCtx<'a, 'f>;

fn output_reg(ctx: &mut Ctx, insn: ir::Inst) -> Writable<Reg> {
    let val = ctx.lower.dfg().first_result(insn);
    Writable::from_reg(ctx.lower.put_value_in_reg(val))
}

fn input_value(ctx: &Ctx, insn: ir::Inst, idx: usize) -> Value {
    ctx.lower.input_as_value(insn, idx)
}

fn input_reg(ctx: &mut Ctx, insn: ir::Inst, idx: usize) -> Reg {
    let val = input_value(ctx, insn, idx);
    put_input_in_reg(ctx.lower, val, NarrowValueMode::None)
}

fn output_ty(ctx: &Ctx, insn: ir::Inst) -> ir::Type {
    ctx.lower.output_ty(insn, 0)
}

//============================================================================
// Rule bodies: constants.

fn iconst(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let value = match ctx.lower.data(insn) {
        &InstructionData::UnaryImm { imm, .. } => imm as u64,
        _ => return None,
    };
    // Sign-extend narrow constants so the full register is canonical.
    let value = match output_ty(ctx, insn).bits() {
        8 => ((value as i64) << 56 >> 56) as u64,
        16 => ((value as i64) << 48 >> 48) as u64,
        32 => ((value as i64) << 32 >> 32) as u64,
        _ => value,
    };
    let rd = output_reg(ctx, insn);
    lower_constant_u64(ctx.lower, rd, value);
    Some(())
}

fn f32const(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let bits = match ctx.lower.data(insn) {
        &InstructionData::UnaryIeee32 { imm, .. } => imm,
        _ => return None,
    };
    let rd = output_reg(ctx, insn);
    lower_constant_f32(ctx.lower, rd, f32::from_bits(bits));
    Some(())
}

fn f64const(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let bits = match ctx.lower.data(insn) {
        &InstructionData::UnaryIeee64 { imm, .. } => imm,
        _ => return None,
    };
    let rd = output_reg(ctx, insn);
    lower_constant_f64(ctx.lower, rd, f64::from_bits(bits));
    Some(())
}

fn vconst(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let imm = match ctx.lower.data(insn) {
        &InstructionData::UnaryConst { imm, .. } => imm,
        _ => return None,
    };
    let rd = output_reg(ctx, insn);
    let lo = imm as u64;
    let hi = (imm >> 64) as u64;
    if hi == 0 && lo == 0 {
        // eor vd, vd, vd: cheap zero.
        ctx.lower.emit(Inst::VecRRR {
            alu_op: VecALUOp::Eor,
            rd,
            rn: rd.to_reg(),
            rm: rd.to_reg(),
            size: VectorSize::Size8x16,
        });
        return Some(());
    }
    // Low half from the literal pool; high half inserted via a GPR.
    ctx.lower.emit(Inst::LoadFpuConst64 {
        rd,
        const_data: f64::from_bits(lo),
    });
    if hi != 0 || output_ty(ctx, insn).bits() == 128 {
        let tmp = ctx.lower.alloc_tmp(RegClass::Int);
        lower_constant_u64(ctx.lower, tmp, hi);
        ctx.lower.emit(Inst::MovToVec {
            rd,
            rn: tmp.to_reg(),
            idx: 1,
            size: VectorSize::Size64x2,
        });
    }
    Some(())
}

//============================================================================
// Rule bodies: integer arithmetic.

fn iadd_madd(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let (a, b) = (input_value(ctx, insn, 0), input_value(ctx, insn, 1));
    // Fuse a multiply feeding either addend into a single madd.
    let (mul, addend) = if let Some(m) = ctx.lower.maybe_input_insn(b, Opcode::Imul) {
        (m, a)
    } else if let Some(m) = ctx.lower.maybe_input_insn(a, Opcode::Imul) {
        (m, b)
    } else {
        return None;
    };
    if ctx.lower.value_ty(input_value(ctx, mul, 0)).is_vector() {
        return None;
    }
    let size = OperandSize::from_ty(ty);
    let rn = input_reg(ctx, mul, 0);
    let rm = input_reg(ctx, mul, 1);
    let ra = put_input_in_reg(ctx.lower, addend, NarrowValueMode::None);
    let rd = output_reg(ctx, insn);
    ctx.lower.emit(Inst::AluRRRR {
        alu_op: ALUOp3::MAdd,
        size,
        rd,
        rn,
        rm,
        ra,
    });
    Some(())
}

fn iadd_imm12(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let size = OperandSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let (rm, negated) = put_input_in_rse_imm12_maybe_negated(ctx.lower, input_value(ctx, insn, 1));
    let alu_op = if negated { ALUOp::Sub } else { ALUOp::Add };
    ctx.lower.emit(alu_inst_imm12(alu_op, size, rd, rn, rm));
    Some(())
}

fn iadd_vec(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (_, _) = multi_lane(output_ty(ctx, insn))?;
    let size = VectorSize::from_ty(output_ty(ctx, insn));
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let rm = input_reg(ctx, insn, 1);
    ctx.lower.emit(Inst::VecRRR {
        alu_op: VecALUOp::Add,
        rd,
        rn,
        rm,
        size,
    });
    Some(())
}

fn isub_imm12(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let size = OperandSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let (rm, negated) = put_input_in_rse_imm12_maybe_negated(ctx.lower, input_value(ctx, insn, 1));
    let alu_op = if negated { ALUOp::Add } else { ALUOp::Sub };
    ctx.lower.emit(alu_inst_imm12(alu_op, size, rd, rn, rm));
    Some(())
}

fn isub_vec(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    multi_lane(output_ty(ctx, insn))?;
    let size = VectorSize::from_ty(output_ty(ctx, insn));
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let rm = input_reg(ctx, insn, 1);
    ctx.lower.emit(Inst::VecRRR {
        alu_op: VecALUOp::Sub,
        rd,
        rn,
        rm,
        size,
    });
    Some(())
}

fn ineg_scalar(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let size = OperandSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rm = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::AluRRR {
        alu_op: ALUOp::Sub,
        size,
        rd,
        rn: zero_reg(),
        rm,
    });
    Some(())
}

fn ineg_vec(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    multi_lane(output_ty(ctx, insn))?;
    let size = VectorSize::from_ty(output_ty(ctx, insn));
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::VecMisc {
        op: VecMisc2::Neg,
        rd,
        rn,
        size,
    });
    Some(())
}

fn imul_scalar(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let size = OperandSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let rm = input_reg(ctx, insn, 1);
    // mul rd, rn, rm == madd rd, rn, rm, xzr
    ctx.lower.emit(Inst::AluRRRR {
        alu_op: ALUOp3::MAdd,
        size,
        rd,
        rn,
        rm,
        ra: zero_reg(),
    });
    Some(())
}

fn imul_vec(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    multi_lane(output_ty(ctx, insn))?;
    let size = VectorSize::from_ty(output_ty(ctx, insn));
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let rm = input_reg(ctx, insn, 1);
    ctx.lower.emit(Inst::VecRRR {
        alu_op: VecALUOp::Mul,
        rd,
        rn,
        rm,
        size,
    });
    Some(())
}

fn mulhi_64(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = output_ty(ctx, insn);
    if ty.bits() != 64 {
        return None;
    }
    let is_signed = ctx.lower.data(insn).opcode() == Opcode::Smulhi;
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let rm = input_reg(ctx, insn, 1);
    ctx.lower.emit(Inst::AluRRR {
        alu_op: if is_signed { ALUOp::SMulH } else { ALUOp::UMulH },
        size: OperandSize::Size64,
        rd,
        rn,
        rm,
    });
    Some(())
}

fn mulhi_narrow(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = output_ty(ctx, insn);
    if ty.bits() > 32 {
        return None;
    }
    let is_signed = ctx.lower.data(insn).opcode() == Opcode::Smulhi;
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let rm = input_reg(ctx, insn, 1);
    // smull/umull into the full 64 bits, then shift the high word down.
    ctx.lower.emit(Inst::AluRRRR {
        alu_op: if is_signed {
            ALUOp3::SMAddL
        } else {
            ALUOp3::UMAddL
        },
        size: OperandSize::Size64,
        rd,
        rn,
        rm,
        ra: zero_reg(),
    });
    ctx.lower.emit(Inst::AluRRImmShift {
        alu_op: if is_signed { ALUOp::Asr } else { ALUOp::Lsr },
        size: OperandSize::Size64,
        rd,
        rn: rd.to_reg(),
        immshift: ImmShift::maybe_from_u64(u64::from(ty.bits())).unwrap(),
    });
    Some(())
}

fn div(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let is_signed = ctx.lower.data(insn).opcode() == Opcode::Sdiv;
    let narrow_mode = if is_signed {
        NarrowValueMode::SignExtend64
    } else {
        NarrowValueMode::ZeroExtend64
    };
    let rd = output_reg(ctx, insn);
    let rn = put_input_in_reg(ctx.lower, input_value(ctx, insn, 0), narrow_mode);
    let rm = put_input_in_reg(ctx.lower, input_value(ctx, insn, 1), narrow_mode);
    // The div instruction does not trap on divide by zero or signed
    // overflow, so checks are inserted explicitly.
    ctx.lower.emit(Inst::TrapIf {
        kind: CondBrKind::Zero(rm),
        trap_code: TrapCode::IntegerDivisionByZero,
    });
    if is_signed {
        // Signed overflow: the only case is int_min / -1.
        let size = OperandSize::from_ty(ty);
        ctx.lower.emit(Inst::AluRRImm12 {
            alu_op: ALUOp::AddS,
            size,
            rd: writable_zero_reg(),
            rn: rm,
            imm12: Imm12::maybe_from_u64(1).unwrap(),
        });
        ctx.lower.emit(Inst::CCmpImm {
            size,
            rn,
            imm: UImm5::maybe_from_u8(1).unwrap(),
            nzcv: NZCV::new(false, false, false, false),
            cond: Cond::Eq,
        });
        ctx.lower.emit(Inst::TrapIf {
            kind: CondBrKind::Cond(Cond::Vs),
            trap_code: TrapCode::IntegerOverflow,
        });
    }
    ctx.lower.emit(Inst::AluRRR {
        alu_op: if is_signed { ALUOp::SDiv } else { ALUOp::UDiv },
        size: OperandSize::Size64,
        rd,
        rn,
        rm,
    });
    Some(())
}

//============================================================================
// Rule bodies: bitwise operations.

fn logical_op_for(op: Opcode) -> ALUOp {
    match op {
        Opcode::Band => ALUOp::And,
        Opcode::Bor => ALUOp::Orr,
        Opcode::Bxor => ALUOp::Eor,
        Opcode::BandNot => ALUOp::AndNot,
        Opcode::BorNot => ALUOp::OrrNot,
        Opcode::BxorNot => ALUOp::EorNot,
        _ => unreachable!(),
    }
}

/// The complement operation, used when only the inverted constant is a
/// legal logical immediate (AND <-> BIC, ORR <-> ORN, EOR <-> EON).
fn complement_logical_op(op: ALUOp) -> ALUOp {
    match op {
        ALUOp::And => ALUOp::AndNot,
        ALUOp::Orr => ALUOp::OrrNot,
        ALUOp::Eor => ALUOp::EorNot,
        ALUOp::AndNot => ALUOp::And,
        ALUOp::OrrNot => ALUOp::Orr,
        ALUOp::EorNot => ALUOp::Eor,
        _ => unreachable!(),
    }
}

fn logical_imm(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let op = logical_op_for(ctx.lower.data(insn).opcode());
    // The not-variants fold the inversion into the immediate instead.
    let (base_op, invert_const) = match op {
        ALUOp::AndNot | ALUOp::OrrNot | ALUOp::EorNot => (complement_logical_op(op), true),
        op => (op, false),
    };
    let c = ctx.lower.get_value_constant(input_value(ctx, insn, 1))?;
    let c = if invert_const { !c } else { c };
    let size = OperandSize::from_ty(ty);
    let imml = match imm_logic_from_u64(ty, c) {
        Some(imml) => imml,
        None => {
            // Complement ladder: try the inverted value with the
            // complemented operation. EON/ORN/BIC have no immediate form,
            // so this only helps for the base three.
            let inv = imm_logic_from_u64(ty, !c)?;
            let rd = output_reg(ctx, insn);
            let rn = input_reg(ctx, insn, 0);
            // and rd, rn, #~c is bic; realize as register form with the
            // inverted immediate materialized.
            let tmp = ctx.lower.alloc_tmp(RegClass::Int);
            ctx.lower.emit(Inst::AluRRImmLogic {
                alu_op: ALUOp::Orr,
                size,
                rd: tmp,
                rn: zero_reg(),
                imml: inv,
            });
            ctx.lower.emit(Inst::AluRRR {
                alu_op: complement_logical_op(base_op),
                size,
                rd,
                rn,
                rm: tmp.to_reg(),
            });
            return Some(());
        }
    };
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::AluRRImmLogic {
        alu_op: base_op,
        size,
        rd,
        rn,
        imml,
    });
    Some(())
}

fn logical_rr(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = output_ty(ctx, insn);
    let op = logical_op_for(ctx.lower.data(insn).opcode());
    if ty.is_vector() {
        let alu_op = match op {
            ALUOp::And => VecALUOp::And,
            ALUOp::Orr => VecALUOp::Orr,
            ALUOp::Eor => VecALUOp::Eor,
            ALUOp::AndNot => VecALUOp::Bic,
            _ => return None,
        };
        let rd = output_reg(ctx, insn);
        let rn = input_reg(ctx, insn, 0);
        let rm = input_reg(ctx, insn, 1);
        ctx.lower.emit(Inst::VecRRR {
            alu_op,
            rd,
            rn,
            rm,
            size: VectorSize::from_ty(ty),
        });
        return Some(());
    }
    let size = OperandSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let rm = input_reg(ctx, insn, 1);
    ctx.lower.emit(Inst::AluRRR {
        alu_op: op,
        size,
        rd,
        rn,
        rm,
    });
    Some(())
}

fn bnot(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = output_ty(ctx, insn);
    let rd = output_reg(ctx, insn);
    let rm = input_reg(ctx, insn, 0);
    if ty.is_vector() {
        ctx.lower.emit(Inst::VecMisc {
            op: VecMisc2::Not,
            rd,
            rn: rm,
            size: VectorSize::from_ty(ty),
        });
    } else {
        // orn rd, xzr, rm
        ctx.lower.emit(Inst::AluRRR {
            alu_op: ALUOp::OrrNot,
            size: OperandSize::from_ty(ty),
            rd,
            rn: zero_reg(),
            rm,
        });
    }
    Some(())
}

fn shift_imm(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let c = ctx.lower.get_value_constant(input_value(ctx, insn, 1))?;
    let amt = c & u64::from(ty.bits() - 1);
    let immshift = imm_shift_from_u64(amt)?;
    let alu_op = match ctx.lower.data(insn).opcode() {
        Opcode::Ishl => ALUOp::Lsl,
        Opcode::Ushr => ALUOp::Lsr,
        Opcode::Sshr => ALUOp::Asr,
        _ => return None,
    };
    let narrow_mode = match (alu_op, ty.bits()) {
        (ALUOp::Lsr, n) if n < 32 => NarrowValueMode::ZeroExtend32,
        (ALUOp::Asr, n) if n < 32 => NarrowValueMode::SignExtend32,
        _ => NarrowValueMode::None,
    };
    let rd = output_reg(ctx, insn);
    let rn = put_input_in_reg(ctx.lower, input_value(ctx, insn, 0), narrow_mode);
    let size = OperandSize::from_ty(ty);
    ctx.lower.emit(Inst::AluRRImmShift {
        alu_op,
        size,
        rd,
        rn,
        immshift,
    });
    Some(())
}

fn shift_reg(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let alu_op = match ctx.lower.data(insn).opcode() {
        Opcode::Ishl => ALUOp::Lsl,
        Opcode::Ushr => ALUOp::Lsr,
        Opcode::Sshr => ALUOp::Asr,
        _ => return None,
    };
    let narrow_mode = match (alu_op, ty.bits()) {
        (ALUOp::Lsr, n) if n < 32 => NarrowValueMode::ZeroExtend32,
        (ALUOp::Asr, n) if n < 32 => NarrowValueMode::SignExtend32,
        _ => NarrowValueMode::None,
    };
    let size = OperandSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rn = put_input_in_reg(ctx.lower, input_value(ctx, insn, 0), narrow_mode);
    let rm = input_reg(ctx, insn, 1);
    ctx.lower.emit(Inst::AluRRR {
        alu_op,
        size,
        rd,
        rn,
        rm,
    });
    Some(())
}

fn rotr_insn(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let size = OperandSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    if let Some(c) = ctx.lower.get_value_constant(input_value(ctx, insn, 1)) {
        let amt = u64::from(valid_shift_imm(c & u64::from(ty.bits() - 1))?);
        ctx.lower.emit(Inst::AluRRImmShift {
            alu_op: ALUOp::RotR,
            size,
            rd,
            rn,
            immshift: ImmShift::maybe_from_u64(amt).unwrap(),
        });
        return Some(());
    }
    let rm = input_reg(ctx, insn, 1);
    ctx.lower.emit(Inst::AluRRR {
        alu_op: ALUOp::RotR,
        size,
        rd,
        rn,
        rm,
    });
    Some(())
}

fn rotl_imm(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let c = ctx.lower.get_value_constant(input_value(ctx, insn, 1))?;
    let k = c & u64::from(ty.bits() - 1);
    // rotl(x, k) == rotr(x, width - k).
    let amt = valid_rotl_imm(u64::from(ty.bits()), k)? & u64::from(ty.bits() - 1);
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::AluRRImmShift {
        alu_op: ALUOp::RotR,
        size: OperandSize::from_ty(ty),
        rd,
        rn,
        immshift: ImmShift::maybe_from_u64(amt).unwrap(),
    });
    Some(())
}

fn rotl_reg(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let size = OperandSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let shift = input_reg(ctx, insn, 1);
    // Negate the shift amount, then rotate right.
    let neg = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::AluRRR {
        alu_op: ALUOp::Sub,
        size,
        rd: neg,
        rn: zero_reg(),
        rm: shift,
    });
    ctx.lower.emit(Inst::AluRRR {
        alu_op: ALUOp::RotR,
        size,
        rd,
        rn,
        rm: neg.to_reg(),
    });
    Some(())
}

fn clz(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::BitRR {
        op: BitOp::Clz,
        size: OperandSize::from_ty(ty),
        rd,
        rn,
    });
    Some(())
}

fn ctz(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    // ctz(x) == clz(rbit(x)): two instructions.
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let size = OperandSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let tmp = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::BitRR {
        op: BitOp::RBit,
        size,
        rd: tmp,
        rn,
    });
    ctx.lower.emit(Inst::BitRR {
        op: BitOp::Clz,
        size,
        rd,
        rn: tmp.to_reg(),
    });
    Some(())
}

fn bitrev(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::BitRR {
        op: BitOp::RBit,
        size: OperandSize::from_ty(ty),
        rd,
        rn,
    });
    Some(())
}

fn bswap(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let (op, size) = match ty.bits() {
        16 => (BitOp::Rev16, OperandSize::Size32),
        32 => (BitOp::Rev32, OperandSize::Size32),
        64 => (BitOp::Rev64, OperandSize::Size64),
        _ => return None,
    };
    // In the 32-bit register width, "rev32" is the plain byte reverse.
    let op = if ty.bits() == 32 { BitOp::Rev32 } else { op };
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::BitRR { op, size, rd, rn });
    Some(())
}

fn iabs_scalar(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let size = OperandSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    // cmp x, #0 ; neg t, x ; csel d, x, t, ge
    ctx.lower.emit(Inst::AluRRImm12 {
        alu_op: ALUOp::SubS,
        size,
        rd: writable_zero_reg(),
        rn,
        imm12: Imm12::zero(),
    });
    let tmp = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::AluRRR {
        alu_op: ALUOp::Sub,
        size,
        rd: tmp,
        rn: zero_reg(),
        rm: rn,
    });
    ctx.lower.emit(Inst::CSel {
        rd,
        cond: Cond::Ge,
        rn,
        rm: tmp.to_reg(),
    });
    Some(())
}

fn iabs_vec(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    multi_lane(output_ty(ctx, insn))?;
    let size = VectorSize::from_ty(output_ty(ctx, insn));
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::VecMisc {
        op: VecMisc2::Abs,
        rd,
        rn,
        size,
    });
    Some(())
}

//============================================================================
// Rule bodies: min/max and selection.

fn minmax_scalar(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    // smin/umin/smax/umax expand to cmp + csel with LT/LO/GT/HI.
    let (cond, signed) = match ctx.lower.data(insn).opcode() {
        Opcode::Smin => (Cond::Lt, true),
        Opcode::Umin => (Cond::Lo, false),
        Opcode::Smax => (Cond::Gt, true),
        Opcode::Umax => (Cond::Hi, false),
        _ => return None,
    };
    let narrow_mode = match (ty.bits(), signed) {
        (n, _) if n >= 32 => NarrowValueMode::None,
        (_, true) => NarrowValueMode::SignExtend32,
        (_, false) => NarrowValueMode::ZeroExtend32,
    };
    let size = OperandSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rn = put_input_in_reg(ctx.lower, input_value(ctx, insn, 0), narrow_mode);
    let rm = put_input_in_reg(ctx.lower, input_value(ctx, insn, 1), narrow_mode);
    ctx.lower.emit(Inst::AluRRR {
        alu_op: ALUOp::SubS,
        size,
        rd: writable_zero_reg(),
        rn,
        rm,
    });
    ctx.lower.emit(Inst::CSel { rd, cond, rn, rm });
    Some(())
}

fn minmax_vec(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    multi_lane(output_ty(ctx, insn))?;
    let alu_op = match ctx.lower.data(insn).opcode() {
        Opcode::Smin => VecALUOp::Smin,
        Opcode::Umin => VecALUOp::Umin,
        Opcode::Smax => VecALUOp::Smax,
        Opcode::Umax => VecALUOp::Umax,
        _ => return None,
    };
    let size = VectorSize::from_ty(output_ty(ctx, insn));
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let rm = input_reg(ctx, insn, 1);
    ctx.lower.emit(Inst::VecRRR {
        alu_op,
        rd,
        rn,
        rm,
        size,
    });
    Some(())
}

fn bitselect_scalar(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = fits_in_64(output_ty(ctx, insn))?;
    let size = OperandSize::from_ty(ty);
    // bitselect(c, x, y) = (x AND c) OR (y AND-NOT c): three
    // instructions.
    let rcond = input_reg(ctx, insn, 0);
    let rx = input_reg(ctx, insn, 1);
    let ry = input_reg(ctx, insn, 2);
    let rd = output_reg(ctx, insn);
    let t1 = ctx.lower.alloc_tmp(RegClass::Int);
    let t2 = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::AluRRR {
        alu_op: ALUOp::And,
        size,
        rd: t1,
        rn: rx,
        rm: rcond,
    });
    ctx.lower.emit(Inst::AluRRR {
        alu_op: ALUOp::AndNot,
        size,
        rd: t2,
        rn: ry,
        rm: rcond,
    });
    ctx.lower.emit(Inst::AluRRR {
        alu_op: ALUOp::Orr,
        size,
        rd,
        rn: t1.to_reg(),
        rm: t2.to_reg(),
    });
    Some(())
}

fn bitselect_vec(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    multi_lane(output_ty(ctx, insn))?;
    let rcond = input_reg(ctx, insn, 0);
    let rx = input_reg(ctx, insn, 1);
    let ry = input_reg(ctx, insn, 2);
    let rd = output_reg(ctx, insn);
    // bsl overwrites the mask operand, so copy it into the destination
    // first.
    ctx.lower.emit(Inst::FpuMove128 { rd, rn: rcond });
    ctx.lower.emit(Inst::VecRRR {
        alu_op: VecALUOp::Bsl,
        rd,
        rn: rx,
        rm: ry,
        size: VectorSize::Size8x16,
    });
    Some(())
}

fn select_insn(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = output_ty(ctx, insn);
    let cond_val = input_value(ctx, insn, 0);
    let rx = input_reg(ctx, insn, 1);
    let ry = input_reg(ctx, insn, 2);
    let rd = output_reg(ctx, insn);

    // Fuse a comparison producer when possible; otherwise test the
    // boolean against zero.
    let cond = if let Some(cmp) = ctx.lower.maybe_input_insn(cond_val, Opcode::Icmp) {
        let (cc, a, b) = match ctx.lower.data(cmp) {
            &InstructionData::IntCompare { cond, args, .. } => (cond, args[0], args[1]),
            _ => unreachable!(),
        };
        lower_icmp_to_flags(ctx.lower, a, b, !cc.is_unsigned());
        lower_condcode(cc)
    } else {
        let rcond = put_input_in_reg(ctx.lower, cond_val, NarrowValueMode::ZeroExtend32);
        ctx.lower.emit(Inst::AluRRImm12 {
            alu_op: ALUOp::SubS,
            size: OperandSize::Size32,
            rd: writable_zero_reg(),
            rn: rcond,
            imm12: Imm12::zero(),
        });
        Cond::Ne
    };

    if ty.is_float() {
        ctx.lower.emit(Inst::FpuCSel {
            size: ScalarSize::from_ty(ty),
            rd,
            rn: rx,
            rm: ry,
            cond,
        });
    } else if ty.is_vector() {
        // No vector csel; build a mask and bit-select. Conservative but
        // correct: dup the all-ones/all-zero scalar.
        let mask = ctx.lower.alloc_tmp(RegClass::Int);
        ctx.lower.emit(Inst::CSet { rd: mask, cond });
        let neg = ctx.lower.alloc_tmp(RegClass::Int);
        ctx.lower.emit(Inst::AluRRR {
            alu_op: ALUOp::Sub,
            size: OperandSize::Size64,
            rd: neg,
            rn: zero_reg(),
            rm: mask.to_reg(),
        });
        let vmask = ctx.lower.alloc_tmp(RegClass::Vector);
        ctx.lower.emit(Inst::VecDup {
            rd: vmask,
            rn: neg.to_reg(),
            size: VectorSize::Size64x2,
        });
        ctx.lower.emit(Inst::FpuMove128 {
            rd,
            rn: vmask.to_reg(),
        });
        ctx.lower.emit(Inst::VecRRR {
            alu_op: VecALUOp::Bsl,
            rd,
            rn: rx,
            rm: ry,
            size: VectorSize::Size8x16,
        });
    } else {
        ctx.lower.emit(Inst::CSel {
            rd,
            cond,
            rn: rx,
            rm: ry,
        });
    }
    Some(())
}

//============================================================================
// Rule bodies: comparisons.

fn icmp_zero_sub(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    // icmp(v, 0) where v = isub(a, b): when either subtraction operand
    // carries pointer (or unknown) provenance, the flags must come from
    // a real `cmp a, b` rather than from testing the subtraction result
    // (`subs v, #0` fixes Carry and breaks the unsigned conditions).
    // Plain-integer operands keep the cheaper subtract-and-test path
    // below.
    let (cc, a, b) = match ctx.lower.data(insn) {
        &InstructionData::IntCompare { cond, args, .. } => (cond, args[0], args[1]),
        _ => return None,
    };
    let zero = ctx.lower.get_value_constant(b)?;
    if zero != 0 {
        return None;
    }
    let sub = ctx.lower.maybe_input_insn(a, Opcode::Isub)?;
    let (sa, sb) = (input_value(ctx, sub, 0), input_value(ctx, sub, 1));
    if !ctx.facts.comparison_requires_cmp(sa, sb) {
        return None;
    }
    if ctx.lower.value_ty(sa).is_vector() {
        return None;
    }
    lower_icmp_to_flags(ctx.lower, sa, sb, !cc.is_unsigned());
    let rd = output_reg(ctx, insn);
    ctx.lower.emit(Inst::CSet {
        rd,
        cond: lower_condcode(cc),
    });
    Some(())
}

fn icmp_scalar(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (cc, a, b) = match ctx.lower.data(insn) {
        &InstructionData::IntCompare { cond, args, .. } => (cond, args[0], args[1]),
        _ => return None,
    };
    if ctx.lower.value_ty(a).is_vector() {
        return None;
    }
    lower_icmp_to_flags(ctx.lower, a, b, !cc.is_unsigned());
    let rd = output_reg(ctx, insn);
    ctx.lower.emit(Inst::CSet {
        rd,
        cond: lower_condcode(cc),
    });
    Some(())
}

fn fcmp_scalar(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (cc, a, b) = match ctx.lower.data(insn) {
        &InstructionData::FloatCompare { cond, args, .. } => (cond, args[0], args[1]),
        _ => return None,
    };
    let ty = ctx.lower.value_ty(a);
    if ty.is_vector() {
        return None;
    }
    let rn = put_input_in_reg(ctx.lower, a, NarrowValueMode::None);
    let rm = put_input_in_reg(ctx.lower, b, NarrowValueMode::None);
    ctx.lower.emit(Inst::FpuCmp {
        size: ScalarSize::from_ty(ty),
        rn,
        rm,
    });
    let rd = output_reg(ctx, insn);
    materialize_float_cc(ctx.lower, rd, cc);
    Some(())
}

//============================================================================
// Rule bodies: conversions and extensions.

fn uextend_sextend(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let signed = ctx.lower.data(insn).opcode() == Opcode::Sextend;
    let input = input_value(ctx, insn, 0);
    let from_bits = ctx.lower.value_ty(input).bits() as u8;
    let to_bits = output_ty(ctx, insn).bits().min(64) as u8;
    let rd = output_reg(ctx, insn);
    let rn = put_input_in_reg(ctx.lower, input, NarrowValueMode::None);
    ctx.lower.emit(Inst::Extend {
        rd,
        rn,
        signed,
        from_bits,
        to_bits,
    });
    Some(())
}

fn ireduce(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    // A value truncation is a no-op at the register level; move so the
    // new value has its own register.
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::Mov {
        size: OperandSize::Size64,
        rd,
        rm: rn,
    });
    Some(())
}

fn fpromote_fdemote(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let fpu_op = match ctx.lower.data(insn).opcode() {
        Opcode::Fpromote => FPUOp1::Cvt32To64,
        Opcode::Fdemote => FPUOp1::Cvt64To32,
        _ => return None,
    };
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::FpuRR {
        fpu_op,
        size: ScalarSize::Size32,
        rd,
        rn,
    });
    Some(())
}

fn fcvt_to_int(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let signed = ctx.lower.data(insn).opcode() == Opcode::FcvtToSint;
    let in_bits = ctx.lower.value_ty(input_value(ctx, insn, 0)).bits();
    let out_bits = output_ty(ctx, insn).bits();
    let op = match (in_bits, out_bits.min(64), signed) {
        (32, 32, true) => FpuToIntOp::F32ToI32,
        (32, 32, false) => FpuToIntOp::F32ToU32,
        (32, 64, true) => FpuToIntOp::F32ToI64,
        (32, 64, false) => FpuToIntOp::F32ToU64,
        (64, 32, true) => FpuToIntOp::F64ToI32,
        (64, 32, false) => FpuToIntOp::F64ToU32,
        (64, 64, true) => FpuToIntOp::F64ToI64,
        (64, 64, false) => FpuToIntOp::F64ToU64,
        _ => return None,
    };
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::FpuToInt { op, rd, rn });
    Some(())
}

fn fcvt_from_int(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let signed = ctx.lower.data(insn).opcode() == Opcode::FcvtFromSint;
    let in_bits = ctx.lower.value_ty(input_value(ctx, insn, 0)).bits();
    let out_bits = output_ty(ctx, insn).bits();
    let op = match (in_bits.min(64), out_bits, signed) {
        (32, 32, true) => IntToFpuOp::I32ToF32,
        (32, 32, false) => IntToFpuOp::U32ToF32,
        (32, 64, true) => IntToFpuOp::I32ToF64,
        (32, 64, false) => IntToFpuOp::U32ToF64,
        (64, 32, true) => IntToFpuOp::I64ToF32,
        (64, 32, false) => IntToFpuOp::U64ToF32,
        (64, 64, true) => IntToFpuOp::I64ToF64,
        (64, 64, false) => IntToFpuOp::U64ToF64,
        _ => return None,
    };
    let narrow_mode = if in_bits < 32 {
        if signed {
            NarrowValueMode::SignExtend32
        } else {
            NarrowValueMode::ZeroExtend32
        }
    } else {
        NarrowValueMode::None
    };
    let rd = output_reg(ctx, insn);
    let rn = put_input_in_reg(ctx.lower, input_value(ctx, insn, 0), narrow_mode);
    ctx.lower.emit(Inst::IntToFpu { op, rd, rn });
    Some(())
}

//============================================================================
// Rule bodies: float arithmetic.

fn fpu_rrr(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = output_ty(ctx, insn);
    if ty.is_vector() {
        return None;
    }
    let fpu_op = match ctx.lower.data(insn).opcode() {
        Opcode::Fadd => FPUOp2::Add,
        Opcode::Fsub => FPUOp2::Sub,
        Opcode::Fmul => FPUOp2::Mul,
        Opcode::Fdiv => FPUOp2::Div,
        Opcode::Fmin => FPUOp2::Min,
        Opcode::Fmax => FPUOp2::Max,
        _ => return None,
    };
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let rm = input_reg(ctx, insn, 1);
    ctx.lower.emit(Inst::FpuRRR {
        fpu_op,
        size: ScalarSize::from_ty(ty),
        rd,
        rn,
        rm,
    });
    Some(())
}

fn fpu_rr(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = output_ty(ctx, insn);
    if ty.is_vector() {
        let op = match ctx.lower.data(insn).opcode() {
            Opcode::Fabs => VecMisc2::Fabs,
            Opcode::Fneg => VecMisc2::Fneg,
            _ => return None,
        };
        let rd = output_reg(ctx, insn);
        let rn = input_reg(ctx, insn, 0);
        ctx.lower.emit(Inst::VecMisc {
            op,
            rd,
            rn,
            size: VectorSize::from_ty(ty),
        });
        return Some(());
    }
    let fpu_op = match ctx.lower.data(insn).opcode() {
        Opcode::Fabs => FPUOp1::Abs,
        Opcode::Fneg => FPUOp1::Neg,
        Opcode::Sqrt => FPUOp1::Sqrt,
        _ => return None,
    };
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::FpuRR {
        fpu_op,
        size: ScalarSize::from_ty(ty),
        rd,
        rn,
    });
    Some(())
}

fn fpu_round(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = output_ty(ctx, insn);
    if ty.is_vector() {
        return None;
    }
    let op = match ctx.lower.data(insn).opcode() {
        Opcode::Floor => choose_32_64(ty, FpuRoundMode::Minus32, FpuRoundMode::Minus64),
        Opcode::Ceil => choose_32_64(ty, FpuRoundMode::Plus32, FpuRoundMode::Plus64),
        Opcode::Trunc => choose_32_64(ty, FpuRoundMode::Zero32, FpuRoundMode::Zero64),
        Opcode::Nearest => choose_32_64(ty, FpuRoundMode::Nearest32, FpuRoundMode::Nearest64),
        _ => return None,
    };
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::FpuRound { op, rd, rn });
    Some(())
}

fn fcopysign(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    // fcopysign(x, y) = fcsel(-|x|, |x|, fcmp(y, 0.0), LT): four
    // instructions.
    let ty = output_ty(ctx, insn);
    if ty.is_vector() {
        return None;
    }
    let size = ScalarSize::from_ty(ty);
    let rx = input_reg(ctx, insn, 0);
    let ry = input_reg(ctx, insn, 1);
    let rd = output_reg(ctx, insn);
    let abs = ctx.lower.alloc_tmp(RegClass::Float);
    let nabs = ctx.lower.alloc_tmp(RegClass::Float);
    ctx.lower.emit(Inst::FpuRR {
        fpu_op: FPUOp1::Abs,
        size,
        rd: abs,
        rn: rx,
    });
    ctx.lower.emit(Inst::FpuRR {
        fpu_op: FPUOp1::Neg,
        size,
        rd: nabs,
        rn: abs.to_reg(),
    });
    ctx.lower.emit(Inst::FpuCmpZero { size, rn: ry });
    ctx.lower.emit(Inst::FpuCSel {
        size,
        rd,
        rn: nabs.to_reg(),
        rm: abs.to_reg(),
        cond: Cond::Mi,
    });
    Some(())
}

//============================================================================
// Rule bodies: memory.

fn load_insn(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (opcode, base, offset, flags) = match ctx.lower.data(insn) {
        &InstructionData::Load {
            opcode,
            arg,
            offset,
            flags,
        } => (opcode, arg, offset, flags),
        _ => return None,
    };
    let out_ty = output_ty(ctx, insn);
    let access_ty = match opcode {
        Opcode::Uload8 | Opcode::Sload8 => ir::types::I8,
        Opcode::Uload16 | Opcode::Sload16 => ir::types::I16,
        Opcode::Uload32 | Opcode::Sload32 => ir::types::I32,
        Opcode::Load => out_ty,
        _ => return None,
    };
    let mem = lower_address(ctx.lower, base, offset, access_ty);
    let rd = output_reg(ctx, insn);
    let inst = match opcode {
        Opcode::Uload8 => Inst::ULoad8 { rd, mem, flags },
        Opcode::Sload8 => Inst::SLoad8 { rd, mem, flags },
        Opcode::Uload16 => Inst::ULoad16 { rd, mem, flags },
        Opcode::Sload16 => Inst::SLoad16 { rd, mem, flags },
        Opcode::Uload32 => Inst::ULoad32 { rd, mem, flags },
        Opcode::Sload32 => Inst::SLoad32 { rd, mem, flags },
        Opcode::Load => Inst::gen_load(rd, mem, out_ty, flags),
        _ => unreachable!(),
    };
    ctx.lower.emit(inst);
    Some(())
}

fn store_insn(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (opcode, args, offset, flags) = match ctx.lower.data(insn) {
        &InstructionData::Store {
            opcode,
            args,
            offset,
            flags,
        } => (opcode, args, offset, flags),
        _ => return None,
    };
    let data = args[0];
    let base = args[1];
    let data_ty = ctx.lower.value_ty(data);
    let access_ty = match opcode {
        Opcode::Istore8 => ir::types::I8,
        Opcode::Istore16 => ir::types::I16,
        Opcode::Istore32 => ir::types::I32,
        Opcode::Store => data_ty,
        _ => return None,
    };
    let mem = lower_address(ctx.lower, base, offset, access_ty);
    let rd = put_input_in_reg(ctx.lower, data, NarrowValueMode::None);
    let inst = match opcode {
        Opcode::Istore8 => Inst::Store8 { rd, mem, flags },
        Opcode::Istore16 => Inst::Store16 { rd, mem, flags },
        Opcode::Istore32 => Inst::Store32 { rd, mem, flags },
        Opcode::Store => Inst::gen_store(mem, rd, data_ty, flags),
        _ => unreachable!(),
    };
    ctx.lower.emit(inst);
    Some(())
}

fn atomic_load(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (arg, ordering) = match ctx.lower.data(insn) {
        &InstructionData::AtomicLoad { arg, ordering, .. } => (arg, ordering),
        _ => return None,
    };
    let ty = output_ty(ctx, insn);
    let rn = put_input_in_reg(ctx.lower, arg, NarrowValueMode::None);
    let rd = output_reg(ctx, insn);
    match ordering {
        AtomicOrdering::Relaxed => {
            ctx.lower
                .emit(Inst::gen_load(rd, AMode::reg(rn), ty, crate::ir::MemFlags::new()));
        }
        AtomicOrdering::Acquire | AtomicOrdering::SeqCst => {
            ctx.lower.emit(Inst::LoadAcquire {
                access_ty: ty,
                rt: rd,
                rn,
            });
        }
        // Release has no load realization.
        AtomicOrdering::Release => return None,
    }
    Some(())
}

fn atomic_store(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (args, ordering) = match ctx.lower.data(insn) {
        &InstructionData::AtomicStore { args, ordering, .. } => (args, ordering),
        _ => return None,
    };
    let data = args[0];
    let addr = args[1];
    let ty = ctx.lower.value_ty(data);
    let rt = put_input_in_reg(ctx.lower, data, NarrowValueMode::None);
    let rn = put_input_in_reg(ctx.lower, addr, NarrowValueMode::None);
    match ordering {
        AtomicOrdering::Relaxed => {
            ctx.lower
                .emit(Inst::gen_store(AMode::reg(rn), rt, ty, crate::ir::MemFlags::new()));
        }
        AtomicOrdering::Release | AtomicOrdering::SeqCst => {
            ctx.lower.emit(Inst::StoreRelease {
                access_ty: ty,
                rt,
                rn,
            });
        }
        // Acquire has no store realization.
        AtomicOrdering::Acquire => return None,
    }
    Some(())
}

fn fence(ctx: &mut Ctx, _insn: ir::Inst) -> Option<()> {
    ctx.lower.emit(Inst::Fence);
    Some(())
}

fn stack_addr(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (slot, offset) = match ctx.lower.data(insn) {
        &InstructionData::StackAddr {
            stack_slot, offset, ..
        } => (stack_slot, offset),
        _ => return None,
    };
    // Stack slots are laid out in declaration order, 8-byte aligned.
    let mut slot_base = 0u32;
    for (i, &size) in ctx.lower.func().stack_slots.iter().enumerate() {
        if i == slot.index() {
            break;
        }
        slot_base += (size + 7) & !7;
    }
    let rd = output_reg(ctx, insn);
    let mem = ctx
        .abi
        .stackslot_amode(slot_base.wrapping_add(offset as u32), ir::types::I8);
    ctx.lower.emit(Inst::LoadAddr { rd, mem });
    Some(())
}

fn symbol_value(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (name, offset) = match ctx.lower.data(insn) {
        InstructionData::UnaryGlobalValue { name, offset, .. } => (name.clone(), *offset),
        _ => return None,
    };
    let rd = output_reg(ctx, insn);
    ctx.lower.emit(Inst::LoadExtName {
        rd,
        name: Box::new(name),
        offset,
    });
    Some(())
}

//============================================================================
// Rule bodies: vectors.

fn splat(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = output_ty(ctx, insn);
    let size = VectorSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let input = input_value(ctx, insn, 0);
    let rn = put_input_in_reg(ctx.lower, input, NarrowValueMode::None);
    if ctx.lower.value_ty(input).is_float() {
        ctx.lower.emit(Inst::VecDupFromFpu { rd, rn, size });
    } else {
        ctx.lower.emit(Inst::VecDup { rd, rn, size });
    }
    Some(())
}

fn shuffle_dup(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (mask, a, _b) = match ctx.lower.data(insn) {
        &InstructionData::Shuffle { mask, args, .. } => (mask, args[0], args[1]),
        _ => return None,
    };
    let (size, idx) = if let Some(lane) = shuffle_dup8_from_imm(mask) {
        (VectorSize::Size8x16, lane)
    } else if let Some(lane) = shuffle_dup16_from_imm(mask) {
        (VectorSize::Size16x8, lane)
    } else if let Some(lane) = shuffle_dup32_from_imm(mask) {
        (VectorSize::Size32x4, lane)
    } else if let Some(lane) = shuffle_dup64_from_imm(mask) {
        (VectorSize::Size64x2, lane)
    } else {
        return None;
    };
    let rd = output_reg(ctx, insn);
    let rn = put_input_in_reg(ctx.lower, a, NarrowValueMode::None);
    ctx.lower.emit(Inst::VecDupLane { rd, rn, size, idx });
    Some(())
}

fn shuffle_ext(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (mask, a, b) = match ctx.lower.data(insn) {
        &InstructionData::Shuffle { mask, args, .. } => (mask, args[0], args[1]),
        _ => return None,
    };
    let start = vec_extract_imm4_from_immediate(mask)?;
    let rd = output_reg(ctx, insn);
    let rn = put_input_in_reg(ctx.lower, a, NarrowValueMode::None);
    let rm = put_input_in_reg(ctx.lower, b, NarrowValueMode::None);
    ctx.lower.emit(Inst::VecExtract {
        rd,
        rn,
        rm,
        imm4: start,
    });
    Some(())
}

fn shuffle_tbl(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (mask, a, b) = match ctx.lower.data(insn) {
        &InstructionData::Shuffle { mask, args, .. } => (mask, args[0], args[1]),
        _ => return None,
    };
    let ra = put_input_in_reg(ctx.lower, a, NarrowValueMode::None);
    let rb = put_input_in_reg(ctx.lower, b, NarrowValueMode::None);
    let rd = output_reg(ctx, insn);
    // TBL needs consecutively-numbered table registers; pin the two
    // inputs into v30/v31.
    let t30 = writable_vreg(30);
    let t31 = writable_vreg(31);
    ctx.lower.emit(Inst::FpuMove128 { rd: t30, rn: ra });
    ctx.lower.emit(Inst::FpuMove128 { rd: t31, rn: rb });
    // Materialize the mask constant.
    let lo = mask as u64;
    let hi = (mask >> 64) as u64;
    let mreg = ctx.lower.alloc_tmp(RegClass::Vector);
    ctx.lower.emit(Inst::LoadFpuConst64 {
        rd: mreg,
        const_data: f64::from_bits(lo),
    });
    let tmp = ctx.lower.alloc_tmp(RegClass::Int);
    lower_constant_u64(ctx.lower, tmp, hi);
    ctx.lower.emit(Inst::MovToVec {
        rd: mreg,
        rn: tmp.to_reg(),
        idx: 1,
        size: VectorSize::Size64x2,
    });
    ctx.lower.emit(Inst::VecTbl2 {
        rd,
        rn: vreg(30),
        rn2: vreg(31),
        rm: mreg.to_reg(),
    });
    Some(())
}

fn extractlane(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (arg, idx) = match ctx.lower.data(insn) {
        &InstructionData::BinaryImm8 { arg, imm, .. } => (arg, imm),
        _ => return None,
    };
    let in_ty = ctx.lower.value_ty(arg);
    let size = VectorSize::from_ty(in_ty);
    let rd = output_reg(ctx, insn);
    let rn = put_input_in_reg(ctx.lower, arg, NarrowValueMode::None);
    if output_ty(ctx, insn).is_float() {
        ctx.lower.emit(Inst::FpuMoveFromVec { rd, rn, idx, size });
    } else {
        ctx.lower.emit(Inst::MovFromVec { rd, rn, idx, size });
    }
    Some(())
}

fn insertlane(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (args, idx) = match ctx.lower.data(insn) {
        &InstructionData::TernaryImm8 { args, imm, .. } => (args, imm),
        _ => return None,
    };
    let vec = args[0];
    let lane = args[1];
    let ty = output_ty(ctx, insn);
    let size = VectorSize::from_ty(ty);
    let rd = output_reg(ctx, insn);
    let rvec = put_input_in_reg(ctx.lower, vec, NarrowValueMode::None);
    let rlane = put_input_in_reg(ctx.lower, lane, NarrowValueMode::None);
    ctx.lower.emit(Inst::FpuMove128 { rd, rn: rvec });
    if ctx.lower.value_ty(lane).is_float() {
        ctx.lower.emit(Inst::VecMovElement {
            rd,
            rn: rlane,
            dest_idx: idx,
            src_idx: 0,
            size,
        });
    } else {
        ctx.lower.emit(Inst::MovToVec {
            rd,
            rn: rlane,
            idx,
            size,
        });
    }
    Some(())
}

fn narrow(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    // Narrowing saturating converts: a low-half narrow of the first
    // input, then the "2" form filling the upper half from the second.
    let op = match ctx.lower.data(insn).opcode() {
        Opcode::Snarrow => VecRRNarrowOp::Sqxtn,
        Opcode::Unarrow => VecRRNarrowOp::Sqxtun,
        Opcode::Uunarrow => VecRRNarrowOp::Uqxtn,
        _ => return None,
    };
    let out_ty = output_ty(ctx, insn);
    let lane_size = ScalarSize::from_bits(out_ty.lane_bits());
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let rm = input_reg(ctx, insn, 1);
    ctx.lower.emit(Inst::VecRRNarrow {
        op,
        rd,
        rn,
        lane_size,
        high_half: false,
    });
    ctx.lower.emit(Inst::VecRRNarrow {
        op,
        rd,
        rn: rm,
        lane_size,
        high_half: true,
    });
    Some(())
}

fn widen(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (signed, high_half) = match ctx.lower.data(insn).opcode() {
        Opcode::SwidenLow => (true, false),
        Opcode::SwidenHigh => (true, true),
        Opcode::UwidenLow => (false, false),
        Opcode::UwidenHigh => (false, true),
        _ => return None,
    };
    let in_ty = ctx.lower.value_ty(input_value(ctx, insn, 0));
    let t = match (signed, in_ty.lane_bits()) {
        (true, 8) => VecExtendOp::Sxtl8,
        (true, 16) => VecExtendOp::Sxtl16,
        (true, 32) => VecExtendOp::Sxtl32,
        (false, 8) => VecExtendOp::Uxtl8,
        (false, 16) => VecExtendOp::Uxtl16,
        (false, 32) => VecExtendOp::Uxtl32,
        _ => return None,
    };
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::VecExtend {
        t,
        rd,
        rn,
        high_half,
    });
    Some(())
}

fn fvpromote_low(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::VecFpWiden {
        rd,
        rn,
        high_half: false,
    });
    Some(())
}

fn fvdemote(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::VecFpNarrow {
        rd,
        rn,
        high_half: false,
    });
    Some(())
}

fn vany_vall_true(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let is_any = ctx.lower.data(insn).opcode() == Opcode::VanyTrue;
    let input = input_value(ctx, insn, 0);
    // umaxv/uminv exist only for lanes up to 32 bits.
    let in_ty = lane_fits_in_32(ctx.lower.value_ty(input))?;
    let size = VectorSize::from_ty(in_ty);
    let rn = put_input_in_reg(ctx.lower, input, NarrowValueMode::None);
    let tmp_v = ctx.lower.alloc_tmp(RegClass::Vector);
    ctx.lower.emit(Inst::VecLanes {
        op: if is_any {
            VecLanesOp::Umaxv
        } else {
            VecLanesOp::Uminv
        },
        rd: tmp_v,
        rn,
        size,
    });
    let tmp_i = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::MovFromVec {
        rd: tmp_i,
        rn: tmp_v.to_reg(),
        idx: 0,
        size: VectorSize::from_lane_size(size.lane_bits(), true),
    });
    ctx.lower.emit(Inst::AluRRImm12 {
        alu_op: ALUOp::SubS,
        size: OperandSize::Size32,
        rd: writable_zero_reg(),
        rn: tmp_i.to_reg(),
        imm12: Imm12::zero(),
    });
    let rd = output_reg(ctx, insn);
    ctx.lower.emit(Inst::CSet { rd, cond: Cond::Ne });
    Some(())
}

fn vec_shift_imm(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = output_ty(ctx, insn);
    multi_lane(ty)?;
    let c = ctx.lower.get_value_constant(input_value(ctx, insn, 1))?;
    let amt = (c & u64::from(ty.lane_bits() - 1)) as u8;
    let op = match ctx.lower.data(insn).opcode() {
        Opcode::Ishl => VecShiftImmOp::Shl,
        Opcode::Ushr => VecShiftImmOp::Ushr,
        Opcode::Sshr => VecShiftImmOp::Sshr,
        _ => return None,
    };
    if matches!(op, VecShiftImmOp::Sshr | VecShiftImmOp::Ushr) && amt == 0 {
        // A right shift of zero is just a move.
        let rd = output_reg(ctx, insn);
        let rn = input_reg(ctx, insn, 0);
        ctx.lower.emit(Inst::FpuMove128 { rd, rn });
        return Some(());
    }
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    ctx.lower.emit(Inst::VecShiftImm {
        op,
        rd,
        rn,
        size: VectorSize::from_ty(ty),
        imm: amt,
    });
    Some(())
}

fn vec_shift_reg(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ty = output_ty(ctx, insn);
    multi_lane(ty)?;
    let size = VectorSize::from_ty(ty);
    let (alu_op, negate) = match ctx.lower.data(insn).opcode() {
        Opcode::Ishl => (VecALUOp::Sshl, false),
        Opcode::Ushr => (VecALUOp::Ushl, true),
        Opcode::Sshr => (VecALUOp::Sshl, true),
        _ => return None,
    };
    let rd = output_reg(ctx, insn);
    let rn = input_reg(ctx, insn, 0);
    let shift = input_reg(ctx, insn, 1);
    // Shift amounts are per-lane and negative means shift right.
    let amt = if negate {
        let neg = ctx.lower.alloc_tmp(RegClass::Int);
        ctx.lower.emit(Inst::AluRRR {
            alu_op: ALUOp::Sub,
            size: OperandSize::Size64,
            rd: neg,
            rn: zero_reg(),
            rm: shift,
        });
        neg.to_reg()
    } else {
        shift
    };
    let dup = ctx.lower.alloc_tmp(RegClass::Vector);
    ctx.lower.emit(Inst::VecDup {
        rd: dup,
        rn: amt,
        size,
    });
    ctx.lower.emit(Inst::VecRRR {
        alu_op,
        rd,
        rn,
        rm: dup.to_reg(),
        size,
    });
    Some(())
}

//============================================================================
// Rule bodies: calls and varargs.

fn call_insn(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let (name, sig, args, indirect) = match ctx.lower.data(insn) {
        InstructionData::Call {
            name, sig, args, ..
        } => (Some(name.clone()), sig.clone(), args.clone(), false),
        InstructionData::CallIndirect { sig, args, .. } => (None, sig.clone(), args.clone(), true),
        _ => return None,
    };
    let (arg_locs, stack_space, _) =
        abi::compute_arg_locs(&sig, abi::ArgsOrRets::Args).ok()?;
    let (ret_locs, _, _) = abi::compute_arg_locs(&sig, abi::ArgsOrRets::Rets).ok()?;

    let callee_reg = if indirect {
        Some(put_input_in_reg(
            ctx.lower,
            args[0],
            NarrowValueMode::None,
        ))
    } else {
        None
    };
    let value_args = if indirect { &args[1..] } else { &args[..] };

    // Allocate outgoing stack-arg space around the call. The arg area is
    // bounded well below the single-SUB range.
    let stack_adj = uimm12(u64::from(stack_space))?;
    if stack_adj > 0 {
        ctx.lower.emit(Inst::AluRRImm12 {
            alu_op: ALUOp::Sub,
            size: OperandSize::Size64,
            rd: writable_stack_reg(),
            rn: stack_reg(),
            imm12: Imm12::maybe_from_u64(stack_adj).unwrap(),
        });
    }

    let mut uses: Vec<Reg> = Vec::new();
    for (arg, loc) in value_args.iter().zip(arg_locs.iter()) {
        let src = put_input_in_reg(ctx.lower, *arg, NarrowValueMode::None);
        match loc {
            ABIArg::Slots { slots } => {
                // Scalar values occupy one slot.
                match slots[0] {
                    ABIArgSlot::Reg { reg, ty } => {
                        let dst = Writable::from_reg(reg.to_reg());
                        ctx.lower.emit(Inst::mov_for_ty(dst, src, ty));
                        uses.push(reg.to_reg());
                    }
                    ABIArgSlot::Stack { offset, ty } => {
                        ctx.lower.emit(Inst::gen_store(
                            AMode::SPOffset(offset, ty),
                            src,
                            ty,
                            crate::ir::MemFlags::trusted(),
                        ));
                    }
                }
            }
            ABIArg::Indirect { .. } => {
                // The IR passes aggregate addresses as plain pointer
                // values; classification-level indirection does not
                // occur for register-typed IR arguments.
                return None;
            }
        }
    }

    let platform = ctx.abi.platform();
    let defs = abi::get_regs_clobbered_by_call(sig.call_conv, platform);

    match (indirect, name) {
        (false, Some(name)) => {
            ctx.lower.emit(Inst::Call {
                info: Box::new(CallInfo {
                    dest: name,
                    uses,
                    defs,
                }),
            });
        }
        (true, _) => {
            ctx.lower.emit(Inst::CallInd {
                info: Box::new(CallIndInfo {
                    rn: callee_reg.unwrap(),
                    uses,
                    defs,
                }),
            });
        }
        _ => unreachable!(),
    }

    if stack_adj > 0 {
        ctx.lower.emit(Inst::AluRRImm12 {
            alu_op: ALUOp::Add,
            size: OperandSize::Size64,
            rd: writable_stack_reg(),
            rn: stack_reg(),
            imm12: Imm12::maybe_from_u64(stack_adj).unwrap(),
        });
    }

    // Copy return values out of their fixed registers.
    let results: Vec<Value> = ctx.lower.dfg().inst_results(insn).to_vec();
    for (val, loc) in results.iter().zip(ret_locs.iter()) {
        if let ABIArg::Slots { slots } = loc {
            if let ABIArgSlot::Reg { reg, ty } = slots[0] {
                let dst = Writable::from_reg(ctx.lower.put_value_in_reg(*val));
                ctx.lower.emit(Inst::mov_for_ty(dst, reg.to_reg(), ty));
            }
        }
    }
    Some(())
}

fn va_start(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    let ap = input_reg(ctx, insn, 0);
    for inst in ctx.abi.gen_va_start(ap) {
        ctx.lower.emit(inst);
    }
    Some(())
}

fn va_arg(ctx: &mut Ctx, insn: ir::Inst) -> Option<()> {
    // Branch-free va_arg: compute both the register-save-area address and
    // the stack address, select with the sign of the offset field, and
    // update the consumed side.
    let ty = output_ty(ctx, insn);
    let ap = input_reg(ctx, insn, 0);
    let flags = crate::ir::MemFlags::new();
    let is_fp = ty.is_float() || ty.is_vector();
    let (offs_field, top_field, slot) = if is_fp {
        (abi::VA_LIST_VR_OFFS, abi::VA_LIST_VR_TOP, 16i64)
    } else {
        (abi::VA_LIST_GR_OFFS, abi::VA_LIST_GR_TOP, 8i64)
    };

    let off = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::SLoad32 {
        rd: off,
        mem: AMode::RegOffset(ap, offs_field, ir::types::I32),
        flags,
    });
    let top = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::ULoad64 {
        rd: top,
        mem: AMode::RegOffset(ap, top_field, ir::types::I64),
        flags,
    });
    let reg_addr = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::AluRRR {
        alu_op: ALUOp::Add,
        size: OperandSize::Size64,
        rd: reg_addr,
        rn: top.to_reg(),
        rm: off.to_reg(),
    });
    let stack = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::ULoad64 {
        rd: stack,
        mem: AMode::RegOffset(ap, abi::VA_LIST_STACK, ir::types::I64),
        flags,
    });

    // in_reg = offs < 0. Flags from the comparison steer all selects
    // below.
    ctx.lower.emit(Inst::AluRRImm12 {
        alu_op: ALUOp::SubS,
        size: OperandSize::Size32,
        rd: writable_zero_reg(),
        rn: off.to_reg(),
        imm12: Imm12::zero(),
    });

    // The address the value comes from.
    let addr = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::CSel {
        rd: addr,
        cond: Cond::Lt,
        rn: reg_addr.to_reg(),
        rm: stack.to_reg(),
    });

    // offs' = in_reg ? offs + slot : offs.
    let noff = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::AluRRImm12 {
        alu_op: ALUOp::Add,
        size: OperandSize::Size32,
        rd: noff,
        rn: off.to_reg(),
        imm12: Imm12::maybe_from_u64(slot as u64).unwrap(),
    });
    let offsel = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::CSel {
        rd: offsel,
        cond: Cond::Lt,
        rn: noff.to_reg(),
        rm: off.to_reg(),
    });
    ctx.lower.emit(Inst::Store32 {
        rd: offsel.to_reg(),
        mem: AMode::RegOffset(ap, offs_field, ir::types::I32),
        flags,
    });

    // stack' = in_reg ? stack : stack + align_up(size, 8).
    let adv = i64::from((ty.bytes() + 7) & !7);
    let nstack = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::AluRRImm12 {
        alu_op: ALUOp::Add,
        size: OperandSize::Size64,
        rd: nstack,
        rn: stack.to_reg(),
        imm12: Imm12::maybe_from_u64(adv as u64).unwrap(),
    });
    let stacksel = ctx.lower.alloc_tmp(RegClass::Int);
    ctx.lower.emit(Inst::CSel {
        rd: stacksel,
        cond: Cond::Lt,
        rn: stack.to_reg(),
        rm: nstack.to_reg(),
    });
    ctx.lower.emit(Inst::Store64 {
        rd: stacksel.to_reg(),
        mem: AMode::RegOffset(ap, abi::VA_LIST_STACK, ir::types::I64),
        flags,
    });

    // Load the value itself.
    let rd = output_reg(ctx, insn);
    ctx.lower
        .emit(Inst::gen_load(rd, AMode::reg(addr.to_reg()), ty, flags));
    Some(())
}

fn debugtrap(ctx: &mut Ctx, _insn: ir::Inst) -> Option<()> {
    ctx.lower.emit(Inst::Brk);
    Some(())
}

//============================================================================
// Rule tables, ordered by descending priority.

macro_rules! rules {
    ($($name:literal @ $prio:literal => $f:ident),* $(,)?) => {
        &[$(Rule { name: $name, prio: $prio, apply: $f }),*]
    };
}

fn rules_for(op: Opcode) -> &'static [Rule] {
    match op {
        Opcode::Iconst => rules![ "iconst" @ 1 => iconst ],
        Opcode::F32const => rules![ "f32const" @ 1 => f32const ],
        Opcode::F64const => rules![ "f64const" @ 1 => f64const ],
        Opcode::Vconst => rules![ "vconst" @ 1 => vconst ],
        Opcode::Iadd => rules![
            "iadd_madd" @ 3 => iadd_madd,
            "iadd_vec" @ 2 => iadd_vec,
            "iadd_imm12" @ 1 => iadd_imm12,
        ],
        Opcode::Isub => rules![
            "isub_vec" @ 2 => isub_vec,
            "isub_imm12" @ 1 => isub_imm12,
        ],
        Opcode::Ineg => rules![
            "ineg_vec" @ 2 => ineg_vec,
            "ineg" @ 1 => ineg_scalar,
        ],
        Opcode::Iabs => rules![
            "iabs_vec" @ 2 => iabs_vec,
            "iabs" @ 1 => iabs_scalar,
        ],
        Opcode::Imul => rules![
            "imul_vec" @ 2 => imul_vec,
            "imul_madd" @ 1 => imul_scalar,
        ],
        Opcode::Smulhi | Opcode::Umulhi => rules![
            "mulhi_64" @ 2 => mulhi_64,
            "mulhi_narrow" @ 1 => mulhi_narrow,
        ],
        Opcode::Udiv | Opcode::Sdiv => rules![ "div" @ 1 => div ],
        Opcode::Band
        | Opcode::Bor
        | Opcode::Bxor
        | Opcode::BandNot
        | Opcode::BorNot
        | Opcode::BxorNot => rules![
            "logical_imm" @ 2 => logical_imm,
            "logical_rr" @ 1 => logical_rr,
        ],
        Opcode::Bnot => rules![ "bnot" @ 1 => bnot ],
        Opcode::Ishl | Opcode::Ushr | Opcode::Sshr => rules![
            "vec_shift_imm" @ 4 => vec_shift_imm,
            "vec_shift_reg" @ 3 => vec_shift_reg,
            "shift_imm" @ 2 => shift_imm,
            "shift_reg" @ 1 => shift_reg,
        ],
        Opcode::Rotr => rules![ "rotr" @ 1 => rotr_insn ],
        Opcode::Rotl => rules![
            "rotl_imm" @ 2 => rotl_imm,
            "rotl_reg" @ 1 => rotl_reg,
        ],
        Opcode::Clz => rules![ "clz" @ 1 => clz ],
        Opcode::Ctz => rules![ "ctz" @ 1 => ctz ],
        Opcode::Bitrev => rules![ "bitrev" @ 1 => bitrev ],
        Opcode::Bswap => rules![ "bswap" @ 1 => bswap ],
        Opcode::Smin | Opcode::Umin | Opcode::Smax | Opcode::Umax => rules![
            "minmax_vec" @ 2 => minmax_vec,
            "minmax" @ 1 => minmax_scalar,
        ],
        Opcode::Bitselect => rules![
            "bitselect_vec" @ 2 => bitselect_vec,
            "bitselect" @ 1 => bitselect_scalar,
        ],
        Opcode::Select => rules![ "select" @ 1 => select_insn ],
        Opcode::Icmp => rules![
            "icmp_zero_sub" @ 2 => icmp_zero_sub,
            "icmp" @ 1 => icmp_scalar,
        ],
        Opcode::Fcmp => rules![ "fcmp" @ 1 => fcmp_scalar ],
        Opcode::Uextend | Opcode::Sextend => rules![ "extend" @ 1 => uextend_sextend ],
        Opcode::Ireduce => rules![ "ireduce" @ 1 => ireduce ],
        Opcode::Fpromote | Opcode::Fdemote => rules![ "fcvt" @ 1 => fpromote_fdemote ],
        Opcode::FcvtToSint | Opcode::FcvtToUint => rules![ "fcvt_to_int" @ 1 => fcvt_to_int ],
        Opcode::FcvtFromSint | Opcode::FcvtFromUint => {
            rules![ "fcvt_from_int" @ 1 => fcvt_from_int ]
        }
        Opcode::Fadd
        | Opcode::Fsub
        | Opcode::Fmul
        | Opcode::Fdiv
        | Opcode::Fmin
        | Opcode::Fmax => rules![ "fpu_rrr" @ 1 => fpu_rrr ],
        Opcode::Fabs | Opcode::Fneg | Opcode::Sqrt => rules![ "fpu_rr" @ 1 => fpu_rr ],
        Opcode::Ceil | Opcode::Floor | Opcode::Trunc | Opcode::Nearest => {
            rules![ "fpu_round" @ 1 => fpu_round ]
        }
        Opcode::Fcopysign => rules![ "fcopysign" @ 1 => fcopysign ],
        Opcode::Load
        | Opcode::Uload8
        | Opcode::Sload8
        | Opcode::Uload16
        | Opcode::Sload16
        | Opcode::Uload32
        | Opcode::Sload32 => rules![ "load" @ 1 => load_insn ],
        Opcode::Store | Opcode::Istore8 | Opcode::Istore16 | Opcode::Istore32 => {
            rules![ "store" @ 1 => store_insn ]
        }
        Opcode::AtomicLoad => rules![ "atomic_load" @ 1 => atomic_load ],
        Opcode::AtomicStore => rules![ "atomic_store" @ 1 => atomic_store ],
        Opcode::Fence => rules![ "fence" @ 1 => fence ],
        Opcode::StackAddr => rules![ "stack_addr" @ 1 => stack_addr ],
        Opcode::SymbolValue => rules![ "symbol_value" @ 1 => symbol_value ],
        Opcode::Splat => rules![ "splat" @ 1 => splat ],
        Opcode::Shuffle => rules![
            "shuffle_dup" @ 3 => shuffle_dup,
            "shuffle_ext" @ 2 => shuffle_ext,
            "shuffle_tbl" @ 1 => shuffle_tbl,
        ],
        Opcode::Extractlane => rules![ "extractlane" @ 1 => extractlane ],
        Opcode::Insertlane => rules![ "insertlane" @ 1 => insertlane ],
        Opcode::Snarrow | Opcode::Unarrow | Opcode::Uunarrow => rules![ "narrow" @ 1 => narrow ],
        Opcode::SwidenLow | Opcode::SwidenHigh | Opcode::UwidenLow | Opcode::UwidenHigh => {
            rules![ "widen" @ 1 => widen ]
        }
        Opcode::FvpromoteLow => rules![ "fvpromote_low" @ 1 => fvpromote_low ],
        Opcode::Fvdemote => rules![ "fvdemote" @ 1 => fvdemote ],
        Opcode::VanyTrue | Opcode::VallTrue => rules![ "v_true" @ 1 => vany_vall_true ],
        Opcode::Call | Opcode::CallIndirect => rules![ "call" @ 1 => call_insn ],
        Opcode::VaStart => rules![ "va_start" @ 1 => va_start ],
        Opcode::VaArg => rules![ "va_arg" @ 1 => va_arg ],
        Opcode::Debugtrap => rules![ "debugtrap" @ 1 => debugtrap ],
        // Terminators are lowered by `lower_terminator`.
        Opcode::Jump | Opcode::Brif | Opcode::Ret | Opcode::Trap => &[],
    }
}

/// Lower one non-terminator IR instruction: try its rules in descending
/// priority order and fire the first that matches.
pub(crate) fn lower_insn(ctx: &mut Ctx, insn: ir::Inst) -> CodegenResult<()> {
    let op = ctx.lower.data(insn).opcode();
    let rules = rules_for(op);
    debug_assert!(
        rules.windows(2).all(|w| w[0].prio >= w[1].prio),
        "rule table for {:?} not sorted by priority",
        op
    );
    for rule in rules {
        if (rule.apply)(ctx, insn).is_some() {
            ctx.lower.rule_fired(rule.name);
            return Ok(());
        }
    }
    match op {
        Opcode::AtomicLoad | Opcode::AtomicStore => Err(CodegenError::UnsupportedAtomicOrdering),
        _ => panic!("no lowering rule matched {:?} ({:?})", op, insn),
    }
}

//============================================================================
// Terminators.

fn emit_edge_moves(ctx: &mut Ctx, target: ir::Block, args: &[Value]) {
    let params: Vec<Value> = ctx.lower.dfg().block_params(target).to_vec();
    debug_assert_eq!(params.len(), args.len());
    for (arg, param) in args.iter().zip(params.iter()) {
        let ty = ctx.lower.value_ty(*arg);
        let src = put_input_in_reg(ctx.lower, *arg, NarrowValueMode::None);
        let dst = Writable::from_reg(ctx.lower.put_value_in_reg(*param));
        if dst.to_reg() != src {
            ctx.lower.emit(Inst::mov_for_ty(dst, src, ty));
        }
    }
}

/// Lower the terminator of a block. Returns the successor block indices
/// for the vcode block edge list.
pub(crate) fn lower_terminator(
    ctx: &mut Ctx,
    insn: ir::Inst,
    block_index_of: &dyn Fn(ir::Block) -> BlockIndex,
) -> CodegenResult<SmallVec<[BlockIndex; 2]>> {
    use crate::machinst::MachLabel;
    let mut succs = SmallVec::new();
    match ctx.lower.data(insn).clone() {
        InstructionData::Jump {
            destination, args, ..
        } => {
            emit_edge_moves(ctx, destination, &args);
            let target = block_index_of(destination);
            ctx.lower.emit(Inst::Jump {
                dest: BranchTarget::Label(MachLabel::from_block(target)),
            });
            succs.push(target);
        }
        InstructionData::Brif {
            arg,
            then_dest,
            then_args,
            else_dest,
            else_args,
            ..
        } => {
            // Edge moves for both targets; correct as long as block
            // params are fresh vregs (the jump threading of conflicting
            // moves is the IR producer's concern).
            emit_edge_moves(ctx, then_dest, &then_args);
            emit_edge_moves(ctx, else_dest, &else_args);
            let taken = block_index_of(then_dest);
            let not_taken = block_index_of(else_dest);

            // Fuse a comparison producer into the branch condition when
            // possible: `icmp` + `brif` becomes `cmp` + `b.<cond>`.
            let kind = if let Some(cmp) = ctx.lower.maybe_input_insn(arg, Opcode::Icmp) {
                let (cc, a, b) = match ctx.lower.data(cmp) {
                    &InstructionData::IntCompare { cond, args, .. } => (cond, args[0], args[1]),
                    _ => unreachable!(),
                };
                lower_icmp_to_flags(ctx.lower, a, b, !cc.is_unsigned());
                ctx.lower.rule_fired("brif_icmp");
                CondBrKind::Cond(lower_condcode(cc))
            } else if let Some(cmp) = ctx.lower.maybe_input_insn(arg, Opcode::Fcmp) {
                let (cc, a, b) = match ctx.lower.data(cmp) {
                    &InstructionData::FloatCompare { cond, args, .. } => (cond, args[0], args[1]),
                    _ => unreachable!(),
                };
                match expand_float_cc(cc) {
                    FloatCCMapping::Single(cond) => {
                        let ty = ctx.lower.value_ty(a);
                        let rn = put_input_in_reg(ctx.lower, a, NarrowValueMode::None);
                        let rm = put_input_in_reg(ctx.lower, b, NarrowValueMode::None);
                        ctx.lower.emit(Inst::FpuCmp {
                            size: ScalarSize::from_ty(ty),
                            rn,
                            rm,
                        });
                        ctx.lower.rule_fired("brif_fcmp");
                        CondBrKind::Cond(cond)
                    }
                    FloatCCMapping::OrPair(..) => {
                        // Compound condition: materialize the boolean.
                        let rcond = put_input_in_reg(ctx.lower, arg, NarrowValueMode::None);
                        ctx.lower.rule_fired("brif_bool");
                        CondBrKind::NotZero(rcond)
                    }
                }
            } else {
                let rcond = put_input_in_reg(ctx.lower, arg, NarrowValueMode::None);
                ctx.lower.rule_fired("brif_bool");
                CondBrKind::NotZero(rcond)
            };

            ctx.lower.emit(Inst::CondBr {
                taken: BranchTarget::Label(MachLabel::from_block(taken)),
                not_taken: BranchTarget::Label(MachLabel::from_block(not_taken)),
                kind,
            });
            succs.push(taken);
            succs.push(not_taken);
        }
        InstructionData::MultiAry { args, .. } => {
            // Return: move values into their return locations, then leave
            // a placeholder the emission driver replaces with the
            // epilogue.
            let ret_locs = ctx.abi.ret_locs().to_vec();
            for (val, loc) in args.iter().zip(ret_locs.iter()) {
                if let ABIArg::Slots { slots } = loc {
                    if let ABIArgSlot::Reg { reg, ty } = slots[0] {
                        let src = put_input_in_reg(ctx.lower, *val, NarrowValueMode::None);
                        let dst = Writable::from_reg(reg.to_reg());
                        ctx.lower.emit(Inst::mov_for_ty(dst, src, ty));
                    }
                }
            }
            ctx.lower.emit(Inst::EpiloguePlaceholder);
        }
        InstructionData::Trap { code, .. } => {
            ctx.lower.emit(Inst::Udf { trap_code: code });
        }
        data => panic!("unexpected terminator {:?}", data),
    }
    Ok(succs)
}
