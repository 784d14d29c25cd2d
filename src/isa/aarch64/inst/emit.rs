//! AArch64 ISA: binary code emission.
//!
//! Every instruction is encoded into one or more fixed 4-byte little-endian
//! words, driven by static opcode-bit tables per variant combined with the
//! operand bit-fields (sf, Rd, Rn, Rm, imm, shift, cond).

use crate::ir::types;
use crate::ir::Type;
use crate::isa::aarch64::inst::*;
use crate::machinst::{LabelUse, LitPool, MachBuffer, MachLabel, Reg, RegClass, Reloc, Writable};
use log::trace;
use smallvec::{smallvec, SmallVec};

/// The encoding of a `nop`, also used as alignment fill.
pub const NOP4: u32 = 0xd503201f;

/// Memory addressing mode finalization: convert "special" modes (e.g.
/// arbitrary stack offsets) into real addressing modes, possibly by
/// returning some helper instructions that must be emitted immediately
/// before the use of this amode.
pub fn mem_finalize(
    mem: &AMode,
    access_ty: Type,
    state: &EmitState,
) -> (SmallVec<[Inst; 4]>, AMode) {
    match mem {
        &AMode::RegOffset(_, off, _)
        | &AMode::SPOffset(off, _)
        | &AMode::FPOffset(off, _)
        | &AMode::IncomingArg(off, _) => {
            let basereg = match mem {
                &AMode::RegOffset(reg, ..) => reg,
                &AMode::SPOffset(..) | &AMode::IncomingArg(..) => stack_reg(),
                &AMode::FPOffset(..) => fp_reg(),
                _ => unreachable!(),
            };
            let off = match mem {
                // Incoming args sit above the whole frame.
                &AMode::IncomingArg(..) => off + i64::from(state.frame_size),
                _ => off,
            };
            if let Some(simm9) = SImm9::maybe_from_i64(off) {
                (smallvec![], AMode::Unscaled(basereg, simm9))
            } else if let Some(uimm12) =
                UImm12Scaled::maybe_from_i64(off, access_ty.bytes() as u8)
            {
                (smallvec![], AMode::UnsignedOffset(basereg, uimm12))
            } else {
                // Out-of-range offset: materialize it into the spill
                // temporary, then use a register-register mode.
                let tmp = writable_spilltmp_reg();
                let const_insts = Inst::load_constant(tmp, off as u64);
                (const_insts, AMode::RegReg(basereg, tmp.to_reg()))
            }
        }
        _ => (smallvec![], *mem),
    }
}

//=============================================================================
// Instructions and subcomponents: emission

pub(crate) fn machreg_to_gpr(m: Reg) -> u32 {
    assert_eq!(m.class(), RegClass::Int);
    u32::from(m.to_real_reg().expect("virtual register at emission").hw_enc())
}

pub(crate) fn machreg_to_vec(m: Reg) -> u32 {
    assert_ne!(m.class(), RegClass::Int);
    u32::from(m.to_real_reg().expect("virtual register at emission").hw_enc())
}

fn machreg_to_gpr_or_vec(m: Reg) -> u32 {
    u32::from(m.to_real_reg().expect("virtual register at emission").hw_enc())
}

fn enc_arith_rrr(bits_31_21: u32, bits_15_10: u32, rd: Writable<Reg>, rn: Reg, rm: Reg) -> u32 {
    (bits_31_21 << 21)
        | (bits_15_10 << 10)
        | machreg_to_gpr(rd.to_reg())
        | (machreg_to_gpr(rn) << 5)
        | (machreg_to_gpr(rm) << 16)
}

fn enc_arith_rr_imm12(
    bits_31_24: u32,
    immshift: u32,
    imm12: u32,
    rn: Reg,
    rd: Writable<Reg>,
) -> u32 {
    (bits_31_24 << 24)
        | (immshift << 22)
        | (imm12 << 10)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr(rd.to_reg())
}

fn enc_arith_rr_imml(bits_31_23: u32, imm_bits: u32, rn: Reg, rd: Writable<Reg>) -> u32 {
    (bits_31_23 << 23) | (imm_bits << 10) | (machreg_to_gpr(rn) << 5) | machreg_to_gpr(rd.to_reg())
}

fn enc_arith_rrrr(top11: u32, rm: Reg, bit15: u32, ra: Reg, rn: Reg, rd: Writable<Reg>) -> u32 {
    (top11 << 21)
        | (machreg_to_gpr(rm) << 16)
        | (bit15 << 15)
        | (machreg_to_gpr(ra) << 10)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr(rd.to_reg())
}

fn enc_jump26(op_31_26: u32, off_26_0: u32) -> u32 {
    assert!(off_26_0 < (1 << 26));
    (op_31_26 << 26) | off_26_0
}

fn enc_cmpbr(op_31_24: u32, off_18_0: u32, reg: Reg) -> u32 {
    assert!(off_18_0 < (1 << 19));
    (op_31_24 << 24) | (off_18_0 << 5) | machreg_to_gpr(reg)
}

fn enc_cbr(op_31_24: u32, off_18_0: u32, op_4: u32, cond: u32) -> u32 {
    assert!(off_18_0 < (1 << 19));
    assert!(cond < (1 << 4));
    (op_31_24 << 24) | (off_18_0 << 5) | (op_4 << 4) | cond
}

fn enc_conditional_br(taken: BranchTarget, kind: CondBrKind) -> u32 {
    match kind {
        CondBrKind::Zero(reg) => enc_cmpbr(0b1_011010_0, taken.as_offset19_or_zero(), reg),
        CondBrKind::NotZero(reg) => enc_cmpbr(0b1_011010_1, taken.as_offset19_or_zero(), reg),
        CondBrKind::Cond(c) => enc_cbr(0b01010100, taken.as_offset19_or_zero(), 0b0, c.bits()),
    }
}

fn enc_move_wide(op: MoveWideOp, rd: Writable<Reg>, imm: MoveWideConst, size: OperandSize) -> u32 {
    assert!(imm.shift <= 0b11);
    let op = match op {
        MoveWideOp::MovN => 0b00,
        MoveWideOp::MovZ => 0b10,
    };
    0x12800000
        | size.sf_bit() << 31
        | op << 29
        | u32::from(imm.shift) << 21
        | u32::from(imm.bits) << 5
        | machreg_to_gpr(rd.to_reg())
}

fn enc_movk(rd: Writable<Reg>, imm: MoveWideConst, size: OperandSize) -> u32 {
    assert!(imm.shift <= 0b11);
    0x72800000
        | size.sf_bit() << 31
        | u32::from(imm.shift) << 21
        | u32::from(imm.bits) << 5
        | machreg_to_gpr(rd.to_reg())
}

fn enc_ldst_pair(op_31_22: u32, simm7: SImm7Scaled, rn: Reg, rt: Reg, rt2: Reg) -> u32 {
    (op_31_22 << 22)
        | (simm7.bits() << 15)
        | (machreg_to_gpr(rt2) << 10)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr(rt)
}

fn enc_ldst_vec_pair(
    opc: u32,
    amode: u32,
    is_load: bool,
    simm7: SImm7Scaled,
    rn: Reg,
    rt: Reg,
    rt2: Reg,
) -> u32 {
    debug_assert_eq!(opc & 0b11, opc);
    debug_assert_eq!(amode & 0b11, amode);
    0b00_10110_00_0_0000000_00000_00000_00000
        | opc << 30
        | amode << 23
        | (is_load as u32) << 22
        | simm7.bits() << 15
        | machreg_to_vec(rt2) << 10
        | machreg_to_gpr(rn) << 5
        | machreg_to_vec(rt)
}

fn enc_ldst_simm9(op_31_22: u32, simm9: SImm9, op_11_10: u32, rn: Reg, rd: Reg) -> u32 {
    (op_31_22 << 22)
        | (simm9.bits() << 12)
        | (op_11_10 << 10)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr_or_vec(rd)
}

fn enc_ldst_uimm12(op_31_22: u32, uimm12: UImm12Scaled, rn: Reg, rd: Reg) -> u32 {
    (op_31_22 << 22)
        | (0b1 << 24)
        | (uimm12.bits() << 10)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr_or_vec(rd)
}

fn enc_ldst_reg(
    op_31_22: u32,
    rn: Reg,
    rm: Reg,
    s_bit: bool,
    extendop: Option<ExtendOp>,
    rd: Reg,
) -> u32 {
    let s_bit = if s_bit { 1 } else { 0 };
    let extend_bits = match extendop {
        Some(ExtendOp::UXTW) => 0b010,
        Some(ExtendOp::SXTW) => 0b110,
        Some(ExtendOp::SXTX) => 0b111,
        // LSL (no extend).
        None => 0b011,
        _ => panic!("bad extend mode for ld/st AMode"),
    };
    (op_31_22 << 22)
        | (1 << 21)
        | (machreg_to_gpr(rm) << 16)
        | (extend_bits << 13)
        | (s_bit << 12)
        | (0b10 << 10)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr_or_vec(rd)
}

fn enc_ldst_imm19(op_31_24: u32, imm19: u32, rd: Reg) -> u32 {
    (op_31_24 << 24) | (imm19 << 5) | machreg_to_gpr_or_vec(rd)
}

fn enc_bfm(opc: u32, size: OperandSize, rd: Writable<Reg>, rn: Reg, immr: u8, imms: u8) -> u32 {
    match size {
        OperandSize::Size64 => {
            debug_assert!(immr <= 63);
            debug_assert!(imms <= 63);
        }
        OperandSize::Size32 => {
            debug_assert!(immr <= 31);
            debug_assert!(imms <= 31);
        }
    }
    debug_assert_eq!(opc & 0b11, opc);
    let n_bit = size.sf_bit();
    0b0_00_100110_0_000000_000000_00000_00000
        | size.sf_bit() << 31
        | opc << 29
        | n_bit << 22
        | u32::from(immr) << 16
        | u32::from(imms) << 10
        | machreg_to_gpr(rn) << 5
        | machreg_to_gpr(rd.to_reg())
}

fn enc_br(rn: Reg) -> u32 {
    0b1101011_0000_11111_000000_00000_00000 | (machreg_to_gpr(rn) << 5)
}

fn enc_adr_inst(opcode: u32, off: i32, rd: Writable<Reg>) -> u32 {
    let off = off as u32;
    let immlo = off & 3;
    let immhi = (off >> 2) & ((1 << 19) - 1);
    opcode | (immlo << 29) | (immhi << 5) | machreg_to_gpr(rd.to_reg())
}

fn enc_adr(off: i32, rd: Writable<Reg>) -> u32 {
    enc_adr_inst(0b00010000 << 24, off, rd)
}

fn enc_adrp(off: i32, rd: Writable<Reg>) -> u32 {
    enc_adr_inst(0b10010000 << 24, off, rd)
}

fn enc_csel(rd: Writable<Reg>, rn: Reg, rm: Reg, cond: Cond) -> u32 {
    0x9A800000
        | (machreg_to_gpr(rm) << 16)
        | (cond.bits() << 12)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr(rd.to_reg())
}

fn enc_cset(rd: Writable<Reg>, cond: Cond) -> u32 {
    // cset rd, cond == csinc rd, xzr, xzr, !cond
    0x9A9F07E0 | (cond.invert().bits() << 12) | machreg_to_gpr(rd.to_reg())
}

fn enc_ccmp_imm(size: OperandSize, rn: Reg, imm: UImm5, nzcv: NZCV, cond: Cond) -> u32 {
    0b0_1_1_11010010_00000_0000_10_00000_0_0000
        | size.sf_bit() << 31
        | imm.bits() << 16
        | cond.bits() << 12
        | machreg_to_gpr(rn) << 5
        | nzcv.bits()
}

fn enc_fcsel(rd: Writable<Reg>, rn: Reg, rm: Reg, cond: Cond, size: ScalarSize) -> u32 {
    0b000_11110_00_1_00000_0000_11_00000_00000
        | (size.ftype() << 22)
        | (machreg_to_vec(rm) << 16)
        | (machreg_to_vec(rn) << 5)
        | machreg_to_vec(rd.to_reg())
        | (cond.bits() << 12)
}

fn enc_fpurr(base: u32, rd: Writable<Reg>, rn: Reg) -> u32 {
    base | (machreg_to_vec(rn) << 5) | machreg_to_vec(rd.to_reg())
}

fn enc_fpurrr(base: u32, rd: Writable<Reg>, rn: Reg, rm: Reg) -> u32 {
    base | (machreg_to_vec(rm) << 16) | (machreg_to_vec(rn) << 5) | machreg_to_vec(rd.to_reg())
}

fn enc_fcmp(size: ScalarSize, rn: Reg, rm: Reg) -> u32 {
    0b000_11110_00_1_00000_00_1000_00000_00000
        | (size.ftype() << 22)
        | (machreg_to_vec(rm) << 16)
        | (machreg_to_vec(rn) << 5)
}

fn enc_fputoint(top16: u32, rd: Writable<Reg>, rn: Reg) -> u32 {
    (top16 << 16) | (machreg_to_vec(rn) << 5) | machreg_to_gpr(rd.to_reg())
}

fn enc_inttofpu(top16: u32, rd: Writable<Reg>, rn: Reg) -> u32 {
    (top16 << 16) | (machreg_to_gpr(rn) << 5) | machreg_to_vec(rd.to_reg())
}

fn enc_vec_rrr(base: u32, q: u32, size: u32, rd: Writable<Reg>, rn: Reg, rm: Reg) -> u32 {
    base | (q << 30)
        | (size << 22)
        | (machreg_to_vec(rm) << 16)
        | (machreg_to_vec(rn) << 5)
        | machreg_to_vec(rd.to_reg())
}

fn enc_vec_rr_misc(base: u32, q: u32, size: u32, rd: Writable<Reg>, rn: Reg) -> u32 {
    base | (q << 30) | (size << 22) | (machreg_to_vec(rn) << 5) | machreg_to_vec(rd.to_reg())
}

fn enc_ldar(ty: Type, rt: Writable<Reg>, rn: Reg) -> u32 {
    let sz = match ty.bits() {
        64 => 0b11,
        32 => 0b10,
        16 => 0b01,
        8 => 0b00,
        _ => unreachable!(),
    };
    0b00_001000_1_1_0_11111_1_11111_00000_00000
        | (sz << 30)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr(rt.to_reg())
}

fn enc_stlr(ty: Type, rt: Reg, rn: Reg) -> u32 {
    let sz = match ty.bits() {
        64 => 0b11,
        32 => 0b10,
        16 => 0b01,
        8 => 0b00,
        _ => unreachable!(),
    };
    0b00_001000_100_11111_1_11111_00000_00000
        | (sz << 30)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr(rt)
}

fn enc_dmb_ish() -> u32 {
    0xD5033BBF
}

fn enc_vec_lanes(base: u32, q: u32, size: u32, rd: Writable<Reg>, rn: Reg) -> u32 {
    base | (q << 30) | (size << 22) | (machreg_to_vec(rn) << 5) | machreg_to_vec(rd.to_reg())
}

/// imm5 field for a lane reference: the lane marker bit ORed with the
/// index shifted above it.
fn enc_imm5_for_lane(lane_bits: u32, idx: u8) -> u32 {
    let marker = lane_bits / 8;
    debug_assert!(u32::from(idx) < 128 / lane_bits);
    marker | (u32::from(idx) * marker * 2)
}

/// State carried between emissions of a sequence of instructions.
#[derive(Default)]
pub struct EmitState {
    /// The literal pool for this function.
    pub litpool: LitPool,
    /// The label of the next block in layout order, if any; used to elide
    /// unconditional branches to the fallthrough block.
    pub fallthrough: Option<MachLabel>,
    /// The frozen frame size of the function being emitted; resolves
    /// `AMode::IncomingArg` offsets.
    pub frame_size: u32,
}

impl EmitState {
    /// Fresh state for one function.
    pub fn new() -> EmitState {
        EmitState::default()
    }
}

fn ldst_opbits_for_load(inst: &Inst) -> (u32, u8) {
    // (op_31_22 bits for the register forms, access size in bytes)
    match inst {
        Inst::ULoad8 { .. } => (0b0011100001, 1),
        Inst::SLoad8 { .. } => (0b0011100010, 1),
        Inst::ULoad16 { .. } => (0b0111100001, 2),
        Inst::SLoad16 { .. } => (0b0111100010, 2),
        Inst::ULoad32 { .. } => (0b1011100001, 4),
        Inst::SLoad32 { .. } => (0b1011100010, 4),
        Inst::ULoad64 { .. } => (0b1111100001, 8),
        Inst::FpuLoad32 { .. } => (0b1011110001, 4),
        Inst::FpuLoad64 { .. } => (0b1111110001, 8),
        Inst::FpuLoad128 { .. } => (0b0011110011, 16),
        _ => unreachable!(),
    }
}

fn ldst_opbits_for_store(inst: &Inst) -> (u32, u8) {
    match inst {
        Inst::Store8 { .. } => (0b0011100000, 1),
        Inst::Store16 { .. } => (0b0111100000, 2),
        Inst::Store32 { .. } => (0b1011100000, 4),
        Inst::Store64 { .. } => (0b1111100000, 8),
        Inst::FpuStore32 { .. } => (0b1011110000, 4),
        Inst::FpuStore64 { .. } => (0b1111110000, 8),
        Inst::FpuStore128 { .. } => (0b0011110010, 16),
        _ => unreachable!(),
    }
}

fn access_ty_for_bytes(bytes: u8) -> Type {
    match bytes {
        1 => types::I8,
        2 => types::I16,
        4 => types::I32,
        8 => types::I64,
        16 => types::I8X16,
        _ => unreachable!(),
    }
}

fn emit_ldst(sink: &mut MachBuffer, op: u32, bytes: u8, rd: Reg, mem: &AMode, state: &mut EmitState) {
    let (mem_insts, mem) = mem_finalize(mem, access_ty_for_bytes(bytes), state);
    for inst in mem_insts {
        inst.emit(sink, state);
    }
    match &mem {
        &AMode::Unscaled(reg, simm9) => {
            sink.put4(enc_ldst_simm9(op, simm9, 0b00, reg, rd));
        }
        &AMode::UnsignedOffset(reg, uimm12) => {
            debug_assert_eq!(u32::from(uimm12.scale), u32::from(bytes));
            sink.put4(enc_ldst_uimm12(op, uimm12, reg, rd));
        }
        &AMode::RegReg(r1, r2) => {
            sink.put4(enc_ldst_reg(op, r1, r2, /* scaled = */ false, None, rd));
        }
        &AMode::RegScaled(r1, r2, ty) => {
            debug_assert_eq!(ty.bytes(), u32::from(bytes));
            sink.put4(enc_ldst_reg(op, r1, r2, /* scaled = */ true, None, rd));
        }
        &AMode::RegScaledExtended(r1, r2, ty, extendop) => {
            debug_assert_eq!(ty.bytes(), u32::from(bytes));
            sink.put4(enc_ldst_reg(op, r1, r2, true, Some(extendop), rd));
        }
        &AMode::Label(MemLabel::PCRel(off)) => {
            let op_literal = match op {
                0b1011100001 => 0b00011000, // ldr w
                0b1111100001 => 0b01011000, // ldr x
                0b1011100010 => 0b10011000, // ldrsw
                0b1011110001 => 0b00011100, // ldr s
                0b1111110001 => 0b01011100, // ldr d
                0b0011110011 => 0b10011100, // ldr q
                _ => panic!("unsupported literal load"),
            };
            let imm19 = ((off >> 2) as u32) & 0x7ffff;
            sink.put4(enc_ldst_imm19(op_literal, imm19, rd));
        }
        &AMode::Label(MemLabel::Mach(label)) => {
            let op_literal = match op {
                0b1011100001 => 0b00011000,
                0b1111100001 => 0b01011000,
                0b1011100010 => 0b10011000,
                0b1011110001 => 0b00011100,
                0b1111110001 => 0b01011100,
                0b0011110011 => 0b10011100,
                _ => panic!("unsupported literal load"),
            };
            sink.use_label_at_offset(sink.cur_offset(), label, LabelUse::Ldr19);
            sink.put4(enc_ldst_imm19(op_literal, 0, rd));
        }
        &AMode::PreIndexed(reg, simm9) => {
            sink.put4(enc_ldst_simm9(op, simm9, 0b11, reg.to_reg(), rd));
        }
        &AMode::PostIndexed(reg, simm9) => {
            sink.put4(enc_ldst_simm9(op, simm9, 0b01, reg.to_reg(), rd));
        }
        &AMode::RegOffset(..)
        | &AMode::SPOffset(..)
        | &AMode::FPOffset(..)
        | &AMode::IncomingArg(..) => {
            unreachable!("amode should have been finalized");
        }
    }
}

impl Inst {
    /// Emit this instruction into `sink`, writing exactly the correct
    /// number of 4-byte little-endian words: zero for `Nop0`, one for most
    /// instructions, up to four for a constant materialization sequence.
    pub fn emit(&self, sink: &mut MachBuffer, state: &mut EmitState) {
        match self {
            &Inst::Nop0 => {}
            &Inst::Nop4 => sink.put4(NOP4),
            &Inst::AluRRR {
                alu_op,
                size,
                rd,
                rn,
                rm,
            } => {
                let sf = size.sf_bit();
                let (top11, bits_15_10) = match alu_op {
                    ALUOp::Add => (0b00001011_000, 0b000000),
                    ALUOp::Sub => (0b01001011_000, 0b000000),
                    ALUOp::AddS => (0b00101011_000, 0b000000),
                    ALUOp::SubS => (0b01101011_000, 0b000000),
                    ALUOp::Orr => (0b00101010_000, 0b000000),
                    ALUOp::OrrNot => (0b00101010_001, 0b000000),
                    ALUOp::And => (0b00001010_000, 0b000000),
                    ALUOp::AndS => (0b01101010_000, 0b000000),
                    ALUOp::AndNot => (0b00001010_001, 0b000000),
                    ALUOp::Eor => (0b01001010_000, 0b000000),
                    ALUOp::EorNot => (0b01001010_001, 0b000000),
                    ALUOp::SMulH => {
                        debug_assert!(size.is64());
                        (0b10011011_010, 0b011111)
                    }
                    ALUOp::UMulH => {
                        debug_assert!(size.is64());
                        (0b10011011_110, 0b011111)
                    }
                    ALUOp::SDiv => (0b00011010_110, 0b000011),
                    ALUOp::UDiv => (0b00011010_110, 0b000010),
                    ALUOp::RotR => (0b00011010_110, 0b001011),
                    ALUOp::Lsr => (0b00011010_110, 0b001001),
                    ALUOp::Asr => (0b00011010_110, 0b001010),
                    ALUOp::Lsl => (0b00011010_110, 0b001000),
                };
                // SMulH/UMulH have sf baked into the top bits.
                let top11 = if matches!(alu_op, ALUOp::SMulH | ALUOp::UMulH) {
                    top11
                } else {
                    top11 | (sf << 10)
                };
                sink.put4(enc_arith_rrr(top11, bits_15_10, rd, rn, rm));
            }
            &Inst::AluRRRR {
                alu_op,
                size,
                rd,
                rn,
                rm,
                ra,
            } => {
                let (top11, bit15) = match alu_op {
                    ALUOp3::MAdd => (0b0_00_11011_000 | (size.sf_bit() << 10), 0),
                    ALUOp3::MSub => (0b0_00_11011_000 | (size.sf_bit() << 10), 1),
                    ALUOp3::SMAddL => (0b1_00_11011_001, 0),
                    ALUOp3::UMAddL => (0b1_00_11011_101, 0),
                };
                sink.put4(enc_arith_rrrr(top11, rm, bit15, ra, rn, rd));
            }
            &Inst::AluRRImm12 {
                alu_op,
                size,
                rd,
                rn,
                ref imm12,
            } => {
                let top8 = match alu_op {
                    ALUOp::Add => 0b000_10001,
                    ALUOp::Sub => 0b010_10001,
                    ALUOp::AddS => 0b001_10001,
                    ALUOp::SubS => 0b011_10001,
                    _ => unreachable!("bad ALU op for imm12: {:?}", alu_op),
                };
                let top8 = top8 | (size.sf_bit() << 7);
                sink.put4(enc_arith_rr_imm12(
                    top8,
                    imm12.shift_bits(),
                    imm12.imm_bits(),
                    rn,
                    rd,
                ));
            }
            &Inst::AluRRImmLogic {
                alu_op,
                size,
                rd,
                rn,
                ref imml,
            } => {
                let top9 = match alu_op {
                    ALUOp::And => 0b000_100100,
                    ALUOp::Orr => 0b001_100100,
                    ALUOp::Eor => 0b010_100100,
                    ALUOp::AndS => 0b011_100100,
                    _ => unreachable!("bad ALU op for imml: {:?}", alu_op),
                };
                let top9 = top9 | (size.sf_bit() << 8);
                debug_assert!(size.is64() || !imml.n);
                sink.put4(enc_arith_rr_imml(top9, imml.enc_bits(), rn, rd));
            }
            &Inst::AluRRImmShift {
                alu_op,
                size,
                rd,
                rn,
                ref immshift,
            } => {
                let amt = u32::from(immshift.value());
                let (max, sf, n) = if size.is64() {
                    (63, 1, 1)
                } else {
                    (31, 0, 0)
                };
                debug_assert!(amt <= max);
                let word = match alu_op {
                    ALUOp::Lsl => {
                        let immr = (max + 1 - amt) & max;
                        let imms = max - amt;
                        // ubfm
                        0b0_10_100110_0_000000_000000_00000_00000
                            | (sf << 31)
                            | (n << 22)
                            | (immr << 16)
                            | (imms << 10)
                            | (machreg_to_gpr(rn) << 5)
                            | machreg_to_gpr(rd.to_reg())
                    }
                    ALUOp::Lsr => {
                        0b0_10_100110_0_000000_000000_00000_00000
                            | (sf << 31)
                            | (n << 22)
                            | (amt << 16)
                            | (max << 10)
                            | (machreg_to_gpr(rn) << 5)
                            | machreg_to_gpr(rd.to_reg())
                    }
                    ALUOp::Asr => {
                        // sbfm
                        0b0_00_100110_0_000000_000000_00000_00000
                            | (sf << 31)
                            | (n << 22)
                            | (amt << 16)
                            | (max << 10)
                            | (machreg_to_gpr(rn) << 5)
                            | machreg_to_gpr(rd.to_reg())
                    }
                    ALUOp::RotR => {
                        // extr rd, rn, rn, #amt
                        0b0_00_100111_0_0_00000_000000_00000_00000
                            | (sf << 31)
                            | (n << 22)
                            | (machreg_to_gpr(rn) << 16)
                            | (amt << 10)
                            | (machreg_to_gpr(rn) << 5)
                            | machreg_to_gpr(rd.to_reg())
                    }
                    _ => unreachable!("bad ALU op for immshift: {:?}", alu_op),
                };
                sink.put4(word);
            }
            &Inst::AluRRRShift {
                alu_op,
                size,
                rd,
                rn,
                rm,
                ref shiftop,
            } => {
                let top11: u32 = match alu_op {
                    ALUOp::Add => 0b000_01011_000,
                    ALUOp::Sub => 0b010_01011_000,
                    ALUOp::AddS => 0b001_01011_000,
                    ALUOp::SubS => 0b011_01011_000,
                    ALUOp::Orr => 0b001_01010_000,
                    ALUOp::OrrNot => 0b001_01010_001,
                    ALUOp::And => 0b000_01010_000,
                    ALUOp::AndS => 0b011_01010_000,
                    ALUOp::AndNot => 0b000_01010_001,
                    ALUOp::Eor => 0b010_01010_000,
                    ALUOp::EorNot => 0b010_01010_001,
                    _ => unreachable!("bad ALU op for shifted-reg: {:?}", alu_op),
                };
                let top11 = top11 | (size.sf_bit() << 10);
                let top11 = top11 | (u32::from(shiftop.op().bits()) << 1);
                sink.put4(enc_arith_rrr(
                    top11,
                    u32::from(shiftop.amt().value()),
                    rd,
                    rn,
                    rm,
                ));
            }
            &Inst::AluRRRExtend {
                alu_op,
                size,
                rd,
                rn,
                rm,
                extendop,
            } => {
                let top11: u32 = match alu_op {
                    ALUOp::Add => 0b000_01011_001,
                    ALUOp::Sub => 0b010_01011_001,
                    ALUOp::AddS => 0b001_01011_001,
                    ALUOp::SubS => 0b011_01011_001,
                    _ => unreachable!("bad ALU op for extended-reg: {:?}", alu_op),
                };
                let top11 = top11 | (size.sf_bit() << 10);
                let bits_15_10 = u32::from(extendop.bits()) << 3;
                sink.put4(enc_arith_rrr(top11, bits_15_10, rd, rn, rm));
            }
            &Inst::BitRR { op, size, rd, rn } => {
                let sf = size.sf_bit();
                let opcode1 = match op {
                    BitOp::RBit => 0b000000,
                    BitOp::Rev16 => 0b000001,
                    BitOp::Rev32 => 0b000010,
                    BitOp::Rev64 => {
                        debug_assert!(size.is64());
                        0b000011
                    }
                    BitOp::Clz => 0b000100,
                    BitOp::Cls => 0b000101,
                };
                sink.put4(
                    (0b01011010110 << 21)
                        | (sf << 31)
                        | (opcode1 << 10)
                        | (machreg_to_gpr(rn) << 5)
                        | machreg_to_gpr(rd.to_reg()),
                );
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
                let (op, bytes) = ldst_opbits_for_load(self);
                emit_ldst(sink, op, bytes, rd.to_reg(), mem, state);
            }
            &Inst::Store8 { rd, ref mem, .. }
            | &Inst::Store16 { rd, ref mem, .. }
            | &Inst::Store32 { rd, ref mem, .. }
            | &Inst::Store64 { rd, ref mem, .. }
            | &Inst::FpuStore32 { rd, ref mem, .. }
            | &Inst::FpuStore64 { rd, ref mem, .. }
            | &Inst::FpuStore128 { rd, ref mem, .. } => {
                let (op, bytes) = ldst_opbits_for_store(self);
                emit_ldst(sink, op, bytes, rd, mem, state);
            }
            &Inst::StoreP64 {
                rt, rt2, ref mem, ..
            } => match mem {
                &PairAMode::SignedOffset(reg, simm7) => {
                    debug_assert_eq!(simm7.scale, 8);
                    sink.put4(enc_ldst_pair(0b1010100100, simm7, reg, rt, rt2));
                }
                &PairAMode::PreIndexed(reg, simm7) => {
                    sink.put4(enc_ldst_pair(0b1010100110, simm7, reg.to_reg(), rt, rt2));
                }
                &PairAMode::PostIndexed(reg, simm7) => {
                    sink.put4(enc_ldst_pair(0b1010100010, simm7, reg.to_reg(), rt, rt2));
                }
            },
            &Inst::LoadP64 {
                rt, rt2, ref mem, ..
            } => {
                let rt = rt.to_reg();
                let rt2 = rt2.to_reg();
                match mem {
                    &PairAMode::SignedOffset(reg, simm7) => {
                        debug_assert_eq!(simm7.scale, 8);
                        sink.put4(enc_ldst_pair(0b1010100101, simm7, reg, rt, rt2));
                    }
                    &PairAMode::PreIndexed(reg, simm7) => {
                        sink.put4(enc_ldst_pair(0b1010100111, simm7, reg.to_reg(), rt, rt2));
                    }
                    &PairAMode::PostIndexed(reg, simm7) => {
                        sink.put4(enc_ldst_pair(0b1010100011, simm7, reg.to_reg(), rt, rt2));
                    }
                }
            }
            &Inst::FpuStoreP64 {
                rt, rt2, ref mem, ..
            } => {
                let (amode, reg, simm7) = pair_amode_fields(mem);
                sink.put4(enc_ldst_vec_pair(0b01, amode, false, simm7, reg, rt, rt2));
            }
            &Inst::FpuLoadP64 {
                rt, rt2, ref mem, ..
            } => {
                let (amode, reg, simm7) = pair_amode_fields(mem);
                sink.put4(enc_ldst_vec_pair(
                    0b01,
                    amode,
                    true,
                    simm7,
                    reg,
                    rt.to_reg(),
                    rt2.to_reg(),
                ));
            }
            &Inst::FpuStoreP128 {
                rt, rt2, ref mem, ..
            } => {
                let (amode, reg, simm7) = pair_amode_fields(mem);
                sink.put4(enc_ldst_vec_pair(0b10, amode, false, simm7, reg, rt, rt2));
            }
            &Inst::FpuLoadP128 {
                rt, rt2, ref mem, ..
            } => {
                let (amode, reg, simm7) = pair_amode_fields(mem);
                sink.put4(enc_ldst_vec_pair(
                    0b10,
                    amode,
                    true,
                    simm7,
                    reg,
                    rt.to_reg(),
                    rt2.to_reg(),
                ));
            }
            &Inst::Mov { size, rd, rm } => {
                debug_assert!(rd.to_reg().class() == RegClass::Int);
                debug_assert!(rm.class() == RegClass::Int);
                // A move to the same register needs no code at all.
                if size.is64() && rd.to_reg() == rm {
                    return;
                }
                // Encoded as ORR rd, zr, rm. SP is not encodable here;
                // moves involving SP use the ADD-immediate form instead.
                debug_assert!(rd.to_reg() != stack_reg() && rm != stack_reg());
                let top11 = 0b00101010_000 | (size.sf_bit() << 10);
                sink.put4(enc_arith_rrr(top11, 0b000000, rd, zero_reg(), rm));
            }
            &Inst::MovWide {
                op,
                rd,
                ref imm,
                size,
            } => {
                sink.put4(enc_move_wide(op, rd, *imm, size));
            }
            &Inst::MovK { rd, ref imm, size } => {
                sink.put4(enc_movk(rd, *imm, size));
            }
            &Inst::Extend {
                rd,
                rn,
                signed,
                from_bits,
                to_bits,
            } => {
                match (signed, from_bits, to_bits) {
                    (false, 32, 64) => {
                        // mov wd, wn zero-extends implicitly.
                        let inst = Inst::Mov {
                            size: OperandSize::Size32,
                            rd,
                            rm: rn,
                        };
                        inst.emit(sink, state);
                    }
                    (true, 32, 64) => {
                        // sxtw
                        sink.put4(enc_bfm(0b00, OperandSize::Size64, rd, rn, 0, 31));
                    }
                    (false, from, _) => {
                        // uxtb/uxth: a 32-bit ubfm clears the high word.
                        sink.put4(enc_bfm(
                            0b10,
                            OperandSize::Size32,
                            rd,
                            rn,
                            0,
                            from - 1,
                        ));
                    }
                    (true, from, to) => {
                        let size = OperandSize::from_bits(u32::from(to));
                        sink.put4(enc_bfm(0b00, size, rd, rn, 0, from - 1));
                    }
                }
            }
            &Inst::CSel { rd, cond, rn, rm } => {
                sink.put4(enc_csel(rd, rn, rm, cond));
            }
            &Inst::CSet { rd, cond } => {
                sink.put4(enc_cset(rd, cond));
            }
            &Inst::CCmpImm {
                size,
                rn,
                ref imm,
                ref nzcv,
                cond,
            } => {
                sink.put4(enc_ccmp_imm(size, rn, *imm, *nzcv, cond));
            }
            &Inst::FpuMove64 { rd, rn } => {
                if rd.to_reg() == rn {
                    return;
                }
                sink.put4(enc_fpurr(0x1E604000, rd, rn));
            }
            &Inst::FpuMove128 { rd, rn } => {
                if rd.to_reg() == rn {
                    return;
                }
                // mov vd.16b, vn.16b == orr vd.16b, vn.16b, vn.16b
                sink.put4(
                    0x4EA01C00
                        | (machreg_to_vec(rn) << 16)
                        | (machreg_to_vec(rn) << 5)
                        | machreg_to_vec(rd.to_reg()),
                );
            }
            &Inst::FpuRR {
                fpu_op,
                size,
                rd,
                rn,
            } => {
                let base = match (fpu_op, size) {
                    (FPUOp1::Abs, ScalarSize::Size32) => 0x1E20C000,
                    (FPUOp1::Abs, ScalarSize::Size64) => 0x1E60C000,
                    (FPUOp1::Neg, ScalarSize::Size32) => 0x1E214000,
                    (FPUOp1::Neg, ScalarSize::Size64) => 0x1E614000,
                    (FPUOp1::Sqrt, ScalarSize::Size32) => 0x1E21C000,
                    (FPUOp1::Sqrt, ScalarSize::Size64) => 0x1E61C000,
                    (FPUOp1::Cvt32To64, _) => 0x1E22C000,
                    (FPUOp1::Cvt64To32, _) => 0x1E624000,
                    _ => panic!("bad FPUOp1 size"),
                };
                sink.put4(enc_fpurr(base, rd, rn));
            }
            &Inst::FpuRRR {
                fpu_op,
                size,
                rd,
                rn,
                rm,
            } => {
                let base = match (fpu_op, size) {
                    (FPUOp2::Add, ScalarSize::Size32) => 0x1E202800,
                    (FPUOp2::Add, ScalarSize::Size64) => 0x1E602800,
                    (FPUOp2::Sub, ScalarSize::Size32) => 0x1E203800,
                    (FPUOp2::Sub, ScalarSize::Size64) => 0x1E603800,
                    (FPUOp2::Mul, ScalarSize::Size32) => 0x1E200800,
                    (FPUOp2::Mul, ScalarSize::Size64) => 0x1E600800,
                    (FPUOp2::Div, ScalarSize::Size32) => 0x1E201800,
                    (FPUOp2::Div, ScalarSize::Size64) => 0x1E601800,
                    (FPUOp2::Max, ScalarSize::Size32) => 0x1E204800,
                    (FPUOp2::Max, ScalarSize::Size64) => 0x1E604800,
                    (FPUOp2::Min, ScalarSize::Size32) => 0x1E205800,
                    (FPUOp2::Min, ScalarSize::Size64) => 0x1E605800,
                    _ => panic!("bad FPUOp2 size"),
                };
                sink.put4(enc_fpurrr(base, rd, rn, rm));
            }
            &Inst::FpuCmp { size, rn, rm } => {
                sink.put4(enc_fcmp(size, rn, rm));
            }
            &Inst::FpuCmpZero { size, rn } => {
                // FCMP (zero): same as the register form with opc bit 3
                // set and Rm zeroed.
                sink.put4(
                    0b000_11110_00_1_00000_00_1000_00000_01000
                        | (size.ftype() << 22)
                        | (machreg_to_vec(rn) << 5),
                );
            }
            &Inst::FpuMoveFPImm { rd, ref imm, size } => {
                let base = match size {
                    ScalarSize::Size32 => 0x1E201000,
                    ScalarSize::Size64 => 0x1E601000,
                    _ => panic!("bad FMOV imm size"),
                };
                sink.put4(base | (u32::from(imm.enc_bits()) << 13) | machreg_to_vec(rd.to_reg()));
            }
            &Inst::LoadFpuConst32 { rd, const_data } => {
                let label = state
                    .litpool
                    .add_constant(sink, u64::from(const_data.to_bits()));
                let inst = Inst::FpuLoad32 {
                    rd,
                    mem: AMode::Label(MemLabel::Mach(label)),
                    flags: crate::ir::MemFlags::trusted(),
                };
                inst.emit(sink, state);
            }
            &Inst::LoadFpuConst64 { rd, const_data } => {
                let label = state.litpool.add_constant(sink, const_data.to_bits());
                let inst = Inst::FpuLoad64 {
                    rd,
                    mem: AMode::Label(MemLabel::Mach(label)),
                    flags: crate::ir::MemFlags::trusted(),
                };
                inst.emit(sink, state);
            }
            &Inst::FpuToInt { op, rd, rn } => {
                let top16 = match op {
                    // FCVTZS/FCVTZU: top16 = sf:0011110:type:11100:op
                    FpuToIntOp::F32ToU32 => 0b000_11110_00_1_11_001,
                    FpuToIntOp::F32ToI32 => 0b000_11110_00_1_11_000,
                    FpuToIntOp::F32ToU64 => 0b100_11110_00_1_11_001,
                    FpuToIntOp::F32ToI64 => 0b100_11110_00_1_11_000,
                    FpuToIntOp::F64ToU32 => 0b000_11110_01_1_11_001,
                    FpuToIntOp::F64ToI32 => 0b000_11110_01_1_11_000,
                    FpuToIntOp::F64ToU64 => 0b100_11110_01_1_11_001,
                    FpuToIntOp::F64ToI64 => 0b100_11110_01_1_11_000,
                };
                sink.put4(enc_fputoint(top16, rd, rn));
            }
            &Inst::IntToFpu { op, rd, rn } => {
                let top16 = match op {
                    // SCVTF/UCVTF: top16 = sf:0011110:type:10001:op
                    IntToFpuOp::U32ToF32 => 0b000_11110_00_1_00_011,
                    IntToFpuOp::I32ToF32 => 0b000_11110_00_1_00_010,
                    IntToFpuOp::U32ToF64 => 0b000_11110_01_1_00_011,
                    IntToFpuOp::I32ToF64 => 0b000_11110_01_1_00_010,
                    IntToFpuOp::U64ToF32 => 0b100_11110_00_1_00_011,
                    IntToFpuOp::I64ToF32 => 0b100_11110_00_1_00_010,
                    IntToFpuOp::U64ToF64 => 0b100_11110_01_1_00_011,
                    IntToFpuOp::I64ToF64 => 0b100_11110_01_1_00_010,
                };
                sink.put4(enc_inttofpu(top16, rd, rn));
            }
            &Inst::FpuCSel {
                size,
                rd,
                rn,
                rm,
                cond,
            } => {
                sink.put4(enc_fcsel(rd, rn, rm, cond, size));
            }
            &Inst::FpuRound { op, rd, rn } => {
                let base = match op {
                    FpuRoundMode::Minus32 => 0x1E254000,
                    FpuRoundMode::Minus64 => 0x1E654000,
                    FpuRoundMode::Plus32 => 0x1E24C000,
                    FpuRoundMode::Plus64 => 0x1E64C000,
                    FpuRoundMode::Zero32 => 0x1E25C000,
                    FpuRoundMode::Zero64 => 0x1E65C000,
                    FpuRoundMode::Nearest32 => 0x1E244000,
                    FpuRoundMode::Nearest64 => 0x1E644000,
                };
                sink.put4(enc_fpurr(base, rd, rn));
            }
            &Inst::MovToFpu { rd, rn, size } => {
                let template = match size {
                    ScalarSize::Size32 => 0x1E270000,
                    ScalarSize::Size64 => 0x9E670000,
                    _ => panic!("bad FMOV size"),
                };
                sink.put4(template | (machreg_to_gpr(rn) << 5) | machreg_to_vec(rd.to_reg()));
            }
            &Inst::MovFromVec { rd, rn, idx, size } => {
                let (q, imm5) = match size.lane_bits() {
                    64 => (1, enc_imm5_for_lane(64, idx)),
                    bits => (0, enc_imm5_for_lane(bits, idx)),
                };
                // umov (or mov for 64-bit lanes)
                sink.put4(
                    0b0_0_0_01110000_00000_0_0111_1_00000_00000
                        | (q << 30)
                        | (imm5 << 16)
                        | (machreg_to_vec(rn) << 5)
                        | machreg_to_gpr(rd.to_reg()),
                );
            }
            &Inst::FpuMoveFromVec { rd, rn, idx, size } => {
                // DUP (element, scalar).
                let imm5 = enc_imm5_for_lane(size.lane_bits(), idx);
                sink.put4(
                    0b01_0_11110000_00000_0_0000_1_00000_00000
                        | (imm5 << 16)
                        | (machreg_to_vec(rn) << 5)
                        | machreg_to_vec(rd.to_reg()),
                );
            }
            &Inst::MovToVec { rd, rn, idx, size } => {
                let imm5 = enc_imm5_for_lane(size.lane_bits(), idx);
                sink.put4(
                    0b0_1_0_01110000_00000_0_0011_1_00000_00000
                        | (imm5 << 16)
                        | (machreg_to_gpr(rn) << 5)
                        | machreg_to_vec(rd.to_reg()),
                );
            }
            &Inst::VecMovElement {
                rd,
                rn,
                dest_idx,
                src_idx,
                size,
            } => {
                let imm5 = enc_imm5_for_lane(size.lane_bits(), dest_idx);
                let lane_bytes = size.lane_bits() / 8;
                let imm4 = u32::from(src_idx) * lane_bytes;
                debug_assert!(imm4 < 16);
                sink.put4(
                    0b0_1_1_01110000_00000_0_0000_1_00000_00000
                        | (imm5 << 16)
                        | (imm4 << 11)
                        | (machreg_to_vec(rn) << 5)
                        | machreg_to_vec(rd.to_reg()),
                );
            }
            &Inst::VecDup { rd, rn, size } => {
                let imm5 = enc_imm5_for_lane(size.lane_bits(), 0);
                let q = size.is_128bits() as u32;
                sink.put4(
                    0b0_0_0_01110000_00000_0_0001_1_00000_00000
                        | (q << 30)
                        | (imm5 << 16)
                        | (machreg_to_gpr(rn) << 5)
                        | machreg_to_vec(rd.to_reg()),
                );
            }
            &Inst::VecDupFromFpu { rd, rn, size } => {
                let imm5 = enc_imm5_for_lane(size.lane_bits(), 0);
                let q = size.is_128bits() as u32;
                sink.put4(
                    0b0_0_0_01110000_00000_0_0000_1_00000_00000
                        | (q << 30)
                        | (imm5 << 16)
                        | (machreg_to_vec(rn) << 5)
                        | machreg_to_vec(rd.to_reg()),
                );
            }
            &Inst::VecDupLane { rd, rn, size, idx } => {
                let imm5 = enc_imm5_for_lane(size.lane_bits(), idx);
                let q = size.is_128bits() as u32;
                sink.put4(
                    0b0_0_0_01110000_00000_0_0000_1_00000_00000
                        | (q << 30)
                        | (imm5 << 16)
                        | (machreg_to_vec(rn) << 5)
                        | machreg_to_vec(rd.to_reg()),
                );
            }
            &Inst::VecExtend {
                t,
                rd,
                rn,
                high_half,
            } => {
                let (u, immh) = match t {
                    VecExtendOp::Sxtl8 => (0b0, 0b001),
                    VecExtendOp::Sxtl16 => (0b0, 0b010),
                    VecExtendOp::Sxtl32 => (0b0, 0b100),
                    VecExtendOp::Uxtl8 => (0b1, 0b001),
                    VecExtendOp::Uxtl16 => (0b1, 0b010),
                    VecExtendOp::Uxtl32 => (0b1, 0b100),
                };
                sink.put4(
                    0b0_0_0_011110_0000_000_101001_00000_00000
                        | ((high_half as u32) << 30)
                        | (u << 29)
                        | (immh << 19)
                        | (machreg_to_vec(rn) << 5)
                        | machreg_to_vec(rd.to_reg()),
                );
            }
            &Inst::VecRRR {
                alu_op,
                rd,
                rn,
                rm,
                size,
            } => {
                let (q, enc_size) = size.enc_size();
                let (base, size_field) = match alu_op {
                    VecALUOp::Add => (0x0E208400, enc_size),
                    VecALUOp::Sub => (0x2E208400, enc_size),
                    VecALUOp::Mul => (0x0E209C00, enc_size),
                    VecALUOp::And => (0x0E201C00, 0b00),
                    VecALUOp::Bic => (0x0E201C00, 0b01),
                    VecALUOp::Orr => (0x0E201C00, 0b10),
                    VecALUOp::Eor => (0x2E201C00, 0b00),
                    VecALUOp::Bsl => (0x2E201C00, 0b01),
                    VecALUOp::Zip1 => (0x0E003800, enc_size),
                    VecALUOp::Zip2 => (0x0E007800, enc_size),
                    VecALUOp::Uzp1 => (0x0E001800, enc_size),
                    VecALUOp::Uzp2 => (0x0E005800, enc_size),
                    VecALUOp::Trn1 => (0x0E002800, enc_size),
                    VecALUOp::Trn2 => (0x0E006800, enc_size),
                    VecALUOp::Smin => (0x0E206C00, enc_size),
                    VecALUOp::Smax => (0x0E206400, enc_size),
                    VecALUOp::Umin => (0x2E206C00, enc_size),
                    VecALUOp::Umax => (0x2E206400, enc_size),
                    VecALUOp::Sshl => (0x0E204400, enc_size),
                    VecALUOp::Ushl => (0x2E204400, enc_size),
                };
                sink.put4(enc_vec_rrr(base, q, size_field, rd, rn, rm));
            }
            &Inst::VecMisc { op, rd, rn, size } => {
                let (q, enc_size) = size.enc_size();
                let (base, size_field) = match op {
                    VecMisc2::Not => (0x2E205800, 0b00),
                    VecMisc2::Neg => (0x2E20B800, enc_size),
                    VecMisc2::Abs => (0x0E20B800, enc_size),
                    // FP two-register misc: the size field is the `sz` bit
                    // (0 = f32 lanes, 1 = f64 lanes) with bit 23 set.
                    VecMisc2::Fabs => (0x0EA0F800, (size.lane_bits() == 64) as u32),
                    VecMisc2::Fneg => (0x2EA0F800, (size.lane_bits() == 64) as u32),
                };
                sink.put4(enc_vec_rr_misc(base, q, size_field, rd, rn));
            }
            &Inst::VecRRNarrow {
                op,
                rd,
                rn,
                lane_size,
                high_half,
            } => {
                let q = high_half as u32;
                let size = match lane_size {
                    ScalarSize::Size8 => 0b00,
                    ScalarSize::Size16 => 0b01,
                    ScalarSize::Size32 => 0b10,
                    _ => panic!("bad narrow lane size"),
                };
                let base = match op {
                    VecRRNarrowOp::Sqxtn => 0x0E214800,
                    VecRRNarrowOp::Sqxtun => 0x2E212800,
                    VecRRNarrowOp::Uqxtn => 0x2E214800,
                };
                sink.put4(enc_vec_rr_misc(base, q, size, rd, rn));
            }
            &Inst::VecFpWiden { rd, rn, high_half } => {
                // fcvtl: f32 -> f64 lanes
                sink.put4(enc_vec_rr_misc(
                    0x0E217800,
                    high_half as u32,
                    0b01,
                    rd,
                    rn,
                ));
            }
            &Inst::VecFpNarrow { rd, rn, high_half } => {
                // fcvtn: f64 -> f32 lanes
                sink.put4(enc_vec_rr_misc(
                    0x0E216800,
                    high_half as u32,
                    0b01,
                    rd,
                    rn,
                ));
            }
            &Inst::VecLanes { op, rd, rn, size } => {
                let (q, enc_size) = size.enc_size();
                let base = match op {
                    VecLanesOp::Addv => 0x0E31B800,
                    VecLanesOp::Uminv => 0x2E31A800,
                    VecLanesOp::Umaxv => 0x2E30A800,
                };
                sink.put4(enc_vec_lanes(base, q, enc_size, rd, rn));
            }
            &Inst::VecShiftImm {
                op,
                rd,
                rn,
                size,
                imm,
            } => {
                let q = size.is_128bits() as u32;
                let lane_bits = size.lane_bits();
                let immh_immb = match op {
                    // shl encodes lane_size | shift.
                    VecShiftImmOp::Shl => {
                        debug_assert!(u32::from(imm) < lane_bits);
                        lane_bits | u32::from(imm)
                    }
                    // sshr/ushr encode 2*lane_size - shift.
                    VecShiftImmOp::Sshr | VecShiftImmOp::Ushr => {
                        debug_assert!(u32::from(imm) >= 1 && u32::from(imm) <= lane_bits);
                        2 * lane_bits - u32::from(imm)
                    }
                };
                let base = match op {
                    VecShiftImmOp::Shl => 0x0F005400,
                    VecShiftImmOp::Sshr => 0x0F000400,
                    VecShiftImmOp::Ushr => 0x2F000400,
                };
                sink.put4(
                    base | (q << 30)
                        | (immh_immb << 16)
                        | (machreg_to_vec(rn) << 5)
                        | machreg_to_vec(rd.to_reg()),
                );
            }
            &Inst::VecExtract { rd, rn, rm, imm4 } => {
                debug_assert!(imm4 < 16);
                sink.put4(
                    0x6E000000
                        | (machreg_to_vec(rm) << 16)
                        | (u32::from(imm4) << 11)
                        | (machreg_to_vec(rn) << 5)
                        | machreg_to_vec(rd.to_reg()),
                );
            }
            &Inst::VecTbl2 { rd, rn, rn2, rm } => {
                debug_assert_eq!(
                    (machreg_to_vec(rn) + 1) % 32,
                    machreg_to_vec(rn2),
                    "TBL2 table registers must be consecutive"
                );
                sink.put4(
                    0x4E002000
                        | (machreg_to_vec(rm) << 16)
                        | (machreg_to_vec(rn) << 5)
                        | machreg_to_vec(rd.to_reg()),
                );
            }
            &Inst::LoadAcquire { access_ty, rt, rn } => {
                sink.put4(enc_ldar(access_ty, rt, rn));
            }
            &Inst::StoreRelease { access_ty, rt, rn } => {
                sink.put4(enc_stlr(access_ty, rt, rn));
            }
            &Inst::Fence => {
                sink.put4(enc_dmb_ish());
            }
            &Inst::Call { ref info } => {
                sink.add_reloc(Reloc::Arm64Call, &info.dest, 0);
                sink.put4(enc_jump26(0b100101, 0));
            }
            &Inst::CallInd { ref info } => {
                sink.put4(0b1101011_0001_11111_000000_00000_00000 | (machreg_to_gpr(info.rn) << 5));
            }
            &Inst::Ret => {
                sink.put4(0xD65F03C0);
            }
            &Inst::EpiloguePlaceholder => {
                // The emission driver replaces these with the epilogue
                // sequence; reaching here means it did not.
                panic!("EpiloguePlaceholder should not reach emission");
            }
            &Inst::Jump { ref dest } => {
                match dest {
                    BranchTarget::Label(label) if Some(*label) == state.fallthrough => {
                        // Elided: falls through.
                    }
                    BranchTarget::Label(label) => {
                        sink.use_label_at_offset(sink.cur_offset(), *label, LabelUse::Branch26);
                        sink.put4(enc_jump26(0b000101, 0));
                    }
                    BranchTarget::ResolvedOffset(off) => {
                        sink.put4(enc_jump26(
                            0b000101,
                            BranchTarget::ResolvedOffset(*off).as_offset26_or_zero(),
                        ));
                    }
                }
            }
            &Inst::CondBr {
                ref taken,
                ref not_taken,
                ref kind,
            } => {
                // If the taken target is the fallthrough block, invert
                // the polarity and branch to the other target instead, so
                // only one branch is emitted.
                if taken.as_label().is_some()
                    && taken.as_label() == state.fallthrough
                    && not_taken.as_label() != state.fallthrough
                {
                    let inverted = Inst::CondBr {
                        taken: *not_taken,
                        not_taken: *taken,
                        kind: kind.invert(),
                    };
                    inverted.emit(sink, state);
                    return;
                }
                if let Some(label) = taken.as_label() {
                    sink.use_label_at_offset(sink.cur_offset(), label, LabelUse::Branch19);
                }
                sink.put4(enc_conditional_br(*taken, *kind));
                let jump = Inst::Jump { dest: *not_taken };
                jump.emit(sink, state);
            }
            &Inst::TrapIf {
                ref kind,
                trap_code,
            } => {
                trace!("trap if {:?}: code {}", kind, trap_code);
                // Condition inverted: branch over the trap when the trap
                // condition is false.
                sink.put4(enc_conditional_br(
                    BranchTarget::ResolvedOffset(8),
                    kind.invert(),
                ));
                let udf = Inst::Udf { trap_code };
                udf.emit(sink, state);
            }
            &Inst::IndirectBr { rn, .. } => {
                sink.put4(enc_br(rn));
            }
            &Inst::Brk => {
                sink.put4(0xD4200000);
            }
            &Inst::Udf { .. } => {
                sink.put4(0xD4A00000);
            }
            &Inst::Adr { rd, off } => {
                assert!(off > -(1 << 20));
                assert!(off < (1 << 20));
                sink.put4(enc_adr(off, rd));
            }
            &Inst::Adrp { rd, off } => {
                sink.put4(enc_adrp(off, rd));
            }
            &Inst::LoadConst64 { rd, const_data } => {
                let label = state.litpool.add_constant(sink, const_data);
                let inst = Inst::ULoad64 {
                    rd,
                    mem: AMode::Label(MemLabel::Mach(label)),
                    flags: crate::ir::MemFlags::trusted(),
                };
                inst.emit(sink, state);
            }
            &Inst::LoadExtName {
                rd,
                ref name,
                offset,
            } => {
                // adrp rd, <sym@page> ; add rd, rd, <sym@pageoff>
                sink.add_reloc(Reloc::Aarch64AdrpPage21, name, offset);
                sink.put4(enc_adrp(0, rd));
                sink.add_reloc(Reloc::Aarch64AbsLo12, name, offset);
                sink.put4(enc_arith_rr_imm12(
                    0b100_10001,
                    0,
                    0,
                    rd.to_reg(),
                    rd,
                ));
            }
            &Inst::LoadAddr { rd, ref mem } => {
                let (mem_insts, mem) = mem_finalize(mem, types::I8, state);
                for inst in mem_insts {
                    inst.emit(sink, state);
                }
                match mem {
                    AMode::Unscaled(reg, simm9) => {
                        let imm = simm9.value;
                        if imm >= 0 {
                            let imm12 = Imm12::maybe_from_u64(imm as u64).unwrap();
                            let add = Inst::AluRRImm12 {
                                alu_op: ALUOp::Add,
                                size: OperandSize::Size64,
                                rd,
                                rn: reg,
                                imm12,
                            };
                            add.emit(sink, state);
                        } else {
                            let imm12 = Imm12::maybe_from_u64(-i64::from(imm) as u64).unwrap();
                            let sub = Inst::AluRRImm12 {
                                alu_op: ALUOp::Sub,
                                size: OperandSize::Size64,
                                rd,
                                rn: reg,
                                imm12,
                            };
                            sub.emit(sink, state);
                        }
                    }
                    AMode::UnsignedOffset(reg, uimm12) => {
                        let imm12 = Imm12::maybe_from_u64(u64::from(uimm12.value)).unwrap();
                        let add = Inst::AluRRImm12 {
                            alu_op: ALUOp::Add,
                            size: OperandSize::Size64,
                            rd,
                            rn: reg,
                            imm12,
                        };
                        add.emit(sink, state);
                    }
                    AMode::RegReg(r1, r2) => {
                        let add = Inst::AluRRR {
                            alu_op: ALUOp::Add,
                            size: OperandSize::Size64,
                            rd,
                            rn: r1,
                            rm: r2,
                        };
                        add.emit(sink, state);
                    }
                    mem => panic!("LoadAddr: unsupported amode {:?}", mem),
                }
            }
        }
    }
}

fn pair_amode_fields(mem: &PairAMode) -> (u32, Reg, SImm7Scaled) {
    match mem {
        &PairAMode::SignedOffset(reg, simm7) => (0b10, reg, simm7),
        &PairAMode::PreIndexed(reg, simm7) => (0b11, reg.to_reg(), simm7),
        &PairAMode::PostIndexed(reg, simm7) => (0b01, reg.to_reg(), simm7),
    }
}
