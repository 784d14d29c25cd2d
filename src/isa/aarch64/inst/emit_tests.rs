use crate::ir::types;
use crate::ir::{MemFlags, TrapCode};
use crate::isa::aarch64::inst::*;
use crate::machinst::MachBuffer;

fn flags() -> MemFlags {
    MemFlags::trusted()
}

#[test]
fn test_aarch64_binemit() {
    let mut insns = Vec::<(Inst, &str, &str)>::new();

    // N.B.: the architecture is little-endian, so when transcribing the
    // 32-bit hex instructions from e.g. objdump disassembly, one must swap
    // the bytes seen below. (E.g., a `ret` is normally written as the u32
    // `D65F03C0`, but we write it here as C0035FD6.)
    //
    // Useful helper script to produce the encodings from the text:
    //
    //      #!/bin/sh
    //      tmp=`mktemp /tmp/XXXXXXXX.o`
    //      aarch64-linux-gnu-as /dev/stdin -o $tmp
    //      aarch64-linux-gnu-objdump -d $tmp
    //      rm -f $tmp
    //
    // Then:
    //
    //      $ echo "mov x1, x2" | aarch64inst.sh

    insns.push((Inst::Ret, "C0035FD6", "ret"));
    insns.push((Inst::Nop0, "", "nop-zero-len"));
    insns.push((Inst::Nop4, "1F2003D5", "nop"));

    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::Add,
            size: OperandSize::Size32,
            rd: writable_xreg(1),
            rn: xreg(2),
            rm: xreg(3),
        },
        "4100030B",
        "add w1, w2, w3",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::Add,
            size: OperandSize::Size64,
            rd: writable_xreg(4),
            rn: xreg(5),
            rm: xreg(6),
        },
        "A400068B",
        "add x4, x5, x6",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::Sub,
            size: OperandSize::Size64,
            rd: writable_xreg(4),
            rn: xreg(5),
            rm: xreg(6),
        },
        "A40006CB",
        "sub x4, x5, x6",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::Orr,
            size: OperandSize::Size32,
            rd: writable_xreg(1),
            rn: xreg(2),
            rm: xreg(3),
        },
        "4100032A",
        "orr w1, w2, w3",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::AndNot,
            size: OperandSize::Size64,
            rd: writable_xreg(21),
            rn: xreg(27),
            rm: xreg(28),
        },
        "75033C8A",
        "bic x21, x27, x28",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::SubS,
            size: OperandSize::Size64,
            rd: writable_zero_reg(),
            rn: xreg(1),
            rm: xreg(2),
        },
        "3F0002EB",
        "subs xzr, x1, x2",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::AndS,
            size: OperandSize::Size32,
            rd: writable_zero_reg(),
            rn: xreg(3),
            rm: xreg(4),
        },
        "7F00046A",
        "ands wzr, w3, w4",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::SMulH,
            size: OperandSize::Size64,
            rd: writable_xreg(1),
            rn: xreg(2),
            rm: xreg(3),
        },
        "417C439B",
        "smulh x1, x2, x3",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::UMulH,
            size: OperandSize::Size64,
            rd: writable_xreg(1),
            rn: xreg(2),
            rm: xreg(3),
        },
        "417CC39B",
        "umulh x1, x2, x3",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::SDiv,
            size: OperandSize::Size64,
            rd: writable_xreg(4),
            rn: xreg(5),
            rm: xreg(6),
        },
        "A40CC69A",
        "sdiv x4, x5, x6",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::UDiv,
            size: OperandSize::Size64,
            rd: writable_xreg(4),
            rn: xreg(5),
            rm: xreg(6),
        },
        "A408C69A",
        "udiv x4, x5, x6",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::RotR,
            size: OperandSize::Size64,
            rd: writable_xreg(1),
            rn: xreg(2),
            rm: xreg(3),
        },
        "412CC39A",
        "ror x1, x2, x3",
    ));
    insns.push((
        Inst::AluRRR {
            alu_op: ALUOp::Lsl,
            size: OperandSize::Size64,
            rd: writable_xreg(1),
            rn: xreg(2),
            rm: xreg(3),
        },
        "4120C39A",
        "lsl x1, x2, x3",
    ));

    insns.push((
        Inst::AluRRRR {
            alu_op: ALUOp3::MAdd,
            size: OperandSize::Size64,
            rd: writable_xreg(1),
            rn: xreg(2),
            rm: xreg(3),
            ra: xreg(4),
        },
        "4110039B",
        "madd x1, x2, x3, x4",
    ));
    insns.push((
        Inst::AluRRRR {
            alu_op: ALUOp3::MSub,
            size: OperandSize::Size64,
            rd: writable_xreg(1),
            rn: xreg(2),
            rm: xreg(3),
            ra: xreg(4),
        },
        "4190039B",
        "msub x1, x2, x3, x4",
    ));
    insns.push((
        Inst::AluRRRR {
            alu_op: ALUOp3::SMAddL,
            size: OperandSize::Size64,
            rd: writable_xreg(8),
            rn: xreg(9),
            rm: xreg(10),
            ra: zero_reg(),
        },
        "287D2A9B",
        "smaddl x8, w9, w10, xzr",
    ));
    insns.push((
        Inst::AluRRRR {
            alu_op: ALUOp3::UMAddL,
            size: OperandSize::Size64,
            rd: writable_xreg(8),
            rn: xreg(9),
            rm: xreg(10),
            ra: zero_reg(),
        },
        "287DAA9B",
        "umaddl x8, w9, w10, xzr",
    ));

    insns.push((
        Inst::AluRRImm12 {
            alu_op: ALUOp::Add,
            size: OperandSize::Size32,
            rd: writable_xreg(7),
            rn: xreg(8),
            imm12: Imm12::maybe_from_u64(42).unwrap(),
        },
        "07A90011",
        "add w7, w8, #42",
    ));
    insns.push((
        Inst::AluRRImm12 {
            alu_op: ALUOp::Sub,
            size: OperandSize::Size64,
            rd: writable_xreg(7),
            rn: xreg(8),
            imm12: Imm12::maybe_from_u64(42).unwrap(),
        },
        "07A900D1",
        "sub x7, x8, #42",
    ));
    insns.push((
        Inst::AluRRImm12 {
            alu_op: ALUOp::Add,
            size: OperandSize::Size64,
            rd: writable_fp_reg(),
            rn: stack_reg(),
            imm12: Imm12::zero(),
        },
        "FD030091",
        "mov fp, sp",
    ));

    insns.push((
        Inst::AluRRImmLogic {
            alu_op: ALUOp::Orr,
            size: OperandSize::Size64,
            rd: writable_xreg(4),
            rn: xreg(5),
            imml: ImmLogic::maybe_from_u64(0x0000_ffff_0000_0000, OperandSize::Size64).unwrap(),
        },
        "A43C60B2",
        "orr x4, x5, #281470681743360",
    ));
    insns.push((
        Inst::AluRRImmLogic {
            alu_op: ALUOp::And,
            size: OperandSize::Size32,
            rd: writable_xreg(1),
            rn: xreg(2),
            imml: ImmLogic::maybe_from_u64(7, OperandSize::Size32).unwrap(),
        },
        "41080012",
        "and w1, w2, #7",
    ));

    insns.push((
        Inst::AluRRImmShift {
            alu_op: ALUOp::Lsl,
            size: OperandSize::Size64,
            rd: writable_xreg(4),
            rn: xreg(5),
            immshift: ImmShift::maybe_from_u64(3).unwrap(),
        },
        "A4F07DD3",
        "lsl x4, x5, #3",
    ));
    insns.push((
        Inst::AluRRImmShift {
            alu_op: ALUOp::Lsr,
            size: OperandSize::Size64,
            rd: writable_xreg(4),
            rn: xreg(5),
            immshift: ImmShift::maybe_from_u64(3).unwrap(),
        },
        "A4FC43D3",
        "lsr x4, x5, #3",
    ));
    insns.push((
        Inst::AluRRImmShift {
            alu_op: ALUOp::Asr,
            size: OperandSize::Size64,
            rd: writable_xreg(4),
            rn: xreg(5),
            immshift: ImmShift::maybe_from_u64(3).unwrap(),
        },
        "A4FC4393",
        "asr x4, x5, #3",
    ));
    insns.push((
        Inst::AluRRImmShift {
            alu_op: ALUOp::RotR,
            size: OperandSize::Size64,
            rd: writable_xreg(1),
            rn: xreg(2),
            immshift: ImmShift::maybe_from_u64(4).unwrap(),
        },
        "4110C293",
        "ror x1, x2, #4",
    ));

    insns.push((
        Inst::AluRRRShift {
            alu_op: ALUOp::Add,
            size: OperandSize::Size64,
            rd: writable_xreg(1),
            rn: xreg(2),
            rm: xreg(3),
            shiftop: ShiftOpAndAmt::new(
                ShiftOp::LSL,
                ShiftOpShiftImm::maybe_from_shift(4).unwrap(),
            ),
        },
        "4110038B",
        "add x1, x2, x3, LSL 4",
    ));
    insns.push((
        Inst::AluRRRExtend {
            alu_op: ALUOp::Add,
            size: OperandSize::Size64,
            rd: writable_xreg(1),
            rn: xreg(2),
            rm: xreg(3),
            extendop: ExtendOp::SXTW,
        },
        "41C0238B",
        "add x1, x2, x3, SXTW",
    ));

    insns.push((
        Inst::BitRR {
            op: BitOp::RBit,
            size: OperandSize::Size32,
            rd: writable_xreg(1),
            rn: xreg(10),
        },
        "4101415A",
        "rbit w1, w10",
    ));
    insns.push((
        Inst::BitRR {
            op: BitOp::Clz,
            size: OperandSize::Size64,
            rd: writable_xreg(15),
            rn: xreg(3),
        },
        "6F10C0DA",
        "clz x15, x3",
    ));
    insns.push((
        Inst::BitRR {
            op: BitOp::Rev64,
            size: OperandSize::Size64,
            rd: writable_xreg(1),
            rn: xreg(2),
        },
        "410CC0DA",
        "rev64 x1, x2",
    ));
    insns.push((
        Inst::BitRR {
            op: BitOp::Rev16,
            size: OperandSize::Size32,
            rd: writable_xreg(1),
            rn: xreg(2),
        },
        "4104C05A",
        "rev16 w1, w2",
    ));

    insns.push((
        Inst::ULoad8 {
            rd: writable_xreg(3),
            mem: AMode::UnsignedOffset(xreg(4), UImm12Scaled::zero(1)),
            flags: flags(),
        },
        "83004039",
        "ldrb w3, [x4]",
    ));
    insns.push((
        Inst::ULoad64 {
            rd: writable_xreg(1),
            mem: AMode::UnsignedOffset(xreg(2), UImm12Scaled::maybe_from_i64(8, 8).unwrap()),
            flags: flags(),
        },
        "410440F9",
        "ldr x1, [x2, #8]",
    ));
    insns.push((
        Inst::SLoad32 {
            rd: writable_xreg(5),
            mem: AMode::UnsignedOffset(xreg(6), UImm12Scaled::maybe_from_i64(100, 4).unwrap()),
            flags: flags(),
        },
        "C56480B9",
        "ldrsw x5, [x6, #100]",
    ));
    insns.push((
        Inst::Store64 {
            rd: xreg(1),
            mem: AMode::UnsignedOffset(xreg(2), UImm12Scaled::zero(8)),
            flags: flags(),
        },
        "410000F9",
        "str x1, [x2]",
    ));
    insns.push((
        Inst::Store32 {
            rd: xreg(7),
            mem: AMode::Unscaled(xreg(8), SImm9::maybe_from_i64(-24).unwrap()),
            flags: flags(),
        },
        "07811EB8",
        "str w7, [x8, #-24]",
    ));
    insns.push((
        Inst::ULoad64 {
            rd: writable_xreg(1),
            mem: AMode::RegReg(xreg(2), xreg(3)),
            flags: flags(),
        },
        "416863F8",
        "ldr x1, [x2, x3]",
    ));
    insns.push((
        Inst::ULoad64 {
            rd: writable_xreg(1),
            mem: AMode::RegScaled(xreg(2), xreg(3), types::I64),
            flags: flags(),
        },
        "417863F8",
        "ldr x1, [x2, x3, LSL #3]",
    ));
    insns.push((
        Inst::ULoad64 {
            rd: writable_xreg(1),
            mem: AMode::PostIndexed(writable_xreg(2), SImm9::maybe_from_i64(16).unwrap()),
            flags: flags(),
        },
        "410441F8",
        "ldr x1, [x2], #16",
    ));

    insns.push((
        Inst::StoreP64 {
            rt: fp_reg(),
            rt2: link_reg(),
            mem: PairAMode::PreIndexed(
                writable_stack_reg(),
                SImm7Scaled::maybe_from_i64(-16, 8).unwrap(),
            ),
            flags: flags(),
        },
        "FD7BBFA9",
        "stp fp, lr, [sp, #-16]!",
    ));
    insns.push((
        Inst::LoadP64 {
            rt: writable_fp_reg(),
            rt2: writable_link_reg(),
            mem: PairAMode::PostIndexed(
                writable_stack_reg(),
                SImm7Scaled::maybe_from_i64(16, 8).unwrap(),
            ),
            flags: flags(),
        },
        "FD7BC1A8",
        "ldp fp, lr, [sp], #16",
    ));
    insns.push((
        Inst::StoreP64 {
            rt: xreg(19),
            rt2: xreg(20),
            mem: PairAMode::SignedOffset(
                stack_reg(),
                SImm7Scaled::maybe_from_i64(16, 8).unwrap(),
            ),
            flags: flags(),
        },
        "F35301A9",
        "stp x19, x20, [sp, #16]",
    ));
    insns.push((
        Inst::FpuStoreP64 {
            rt: vreg(8),
            rt2: vreg(9),
            mem: PairAMode::PreIndexed(
                writable_stack_reg(),
                SImm7Scaled::maybe_from_i64(-16, 8).unwrap(),
            ),
            flags: flags(),
        },
        "E827BF6D",
        "stp d8, d9, [sp, #-16]!",
    ));
    insns.push((
        Inst::FpuStoreP128 {
            rt: vreg(0),
            rt2: vreg(1),
            mem: PairAMode::PreIndexed(
                writable_stack_reg(),
                SImm7Scaled::maybe_from_i64(-32, 16).unwrap(),
            ),
            flags: flags(),
        },
        "E007BFAD",
        "stp q0, q1, [sp, #-32]!",
    ));

    insns.push((
        Inst::Mov {
            size: OperandSize::Size64,
            rd: writable_xreg(8),
            rm: xreg(9),
        },
        "E80309AA",
        "mov x8, x9",
    ));
    insns.push((
        Inst::Mov {
            size: OperandSize::Size32,
            rd: writable_xreg(8),
            rm: xreg(9),
        },
        "E803092A",
        "mov w8, w9",
    ));
    insns.push((
        Inst::MovWide {
            op: MoveWideOp::MovZ,
            rd: writable_xreg(8),
            imm: MoveWideConst::maybe_from_u64(42).unwrap(),
            size: OperandSize::Size64,
        },
        "480580D2",
        "movz x8, #42",
    ));
    insns.push((
        Inst::MovWide {
            op: MoveWideOp::MovN,
            rd: writable_xreg(9),
            imm: MoveWideConst::maybe_from_u64(42).unwrap(),
            size: OperandSize::Size64,
        },
        "49058092",
        "movn x9, #42",
    ));
    insns.push((
        Inst::MovK {
            rd: writable_xreg(9),
            imm: MoveWideConst::maybe_with_shift(0x1234, 16).unwrap(),
            size: OperandSize::Size64,
        },
        "894668F2",
        "movk x9, #4660, LSL #16",
    ));

    insns.push((
        Inst::Extend {
            rd: writable_xreg(1),
            rn: xreg(2),
            signed: false,
            from_bits: 8,
            to_bits: 32,
        },
        "411C0053",
        "uxtb w1, w2",
    ));
    insns.push((
        Inst::Extend {
            rd: writable_xreg(1),
            rn: xreg(2),
            signed: true,
            from_bits: 16,
            to_bits: 64,
        },
        "413C4093",
        "sxth x1, w2",
    ));
    insns.push((
        Inst::Extend {
            rd: writable_xreg(3),
            rn: xreg(4),
            signed: true,
            from_bits: 32,
            to_bits: 64,
        },
        "837C4093",
        "sxtw x3, w4",
    ));

    insns.push((
        Inst::CSel {
            rd: writable_xreg(10),
            cond: Cond::Hs,
            rn: xreg(12),
            rm: xreg(14),
        },
        "8A218E9A",
        "csel x10, x12, x14, hs",
    ));
    insns.push((
        Inst::CSet {
            rd: writable_xreg(15),
            cond: Cond::Ge,
        },
        "EFB79F9A",
        "cset x15, ge",
    ));
    insns.push((
        Inst::CCmpImm {
            size: OperandSize::Size64,
            rn: xreg(22),
            imm: UImm5::maybe_from_u8(5).unwrap(),
            nzcv: NZCV::new(false, false, false, false),
            cond: Cond::Eq,
        },
        "C00A45FA",
        "ccmp x22, #5, #nzcv, eq",
    ));

    insns.push((
        Inst::FpuMove64 {
            rd: writable_vreg(8),
            rn: vreg(4),
        },
        "8840601E",
        "fmov d8, d4",
    ));
    insns.push((
        Inst::FpuRR {
            fpu_op: FPUOp1::Abs,
            size: ScalarSize::Size64,
            rd: writable_vreg(10),
            rn: vreg(20),
        },
        "8AC2601E",
        "fabs d10, d20",
    ));
    insns.push((
        Inst::FpuRR {
            fpu_op: FPUOp1::Neg,
            size: ScalarSize::Size32,
            rd: writable_vreg(1),
            rn: vreg(2),
        },
        "4140211E",
        "fneg s1, s2",
    ));
    insns.push((
        Inst::FpuRR {
            fpu_op: FPUOp1::Cvt32To64,
            size: ScalarSize::Size32,
            rd: writable_vreg(1),
            rn: vreg(2),
        },
        "41C0221E",
        "fcvt d1, s2",
    ));
    insns.push((
        Inst::FpuRRR {
            fpu_op: FPUOp2::Add,
            size: ScalarSize::Size32,
            rd: writable_vreg(3),
            rn: vreg(4),
            rm: vreg(5),
        },
        "8328251E",
        "fadd s3, s4, s5",
    ));
    insns.push((
        Inst::FpuRRR {
            fpu_op: FPUOp2::Div,
            size: ScalarSize::Size64,
            rd: writable_vreg(3),
            rn: vreg(4),
            rm: vreg(5),
        },
        "8318651E",
        "fdiv d3, d4, d5",
    ));
    insns.push((
        Inst::FpuCmp {
            size: ScalarSize::Size64,
            rn: vreg(1),
            rm: vreg(2),
        },
        "2020621E",
        "fcmp d1, d2",
    ));
    insns.push((
        Inst::FpuCSel {
            size: ScalarSize::Size64,
            rd: writable_vreg(1),
            rn: vreg(2),
            rm: vreg(3),
            cond: Cond::Mi,
        },
        "414C631E",
        "fcsel d1, d2, d3, mi",
    ));
    insns.push((
        Inst::FpuMoveFPImm {
            rd: writable_vreg(1),
            imm: FpImm8::maybe_from_f64(1.0).unwrap(),
            size: ScalarSize::Size64,
        },
        "01106E1E",
        "fmov d1, #1",
    ));
    insns.push((
        Inst::FpuRound {
            op: FpuRoundMode::Minus64,
            rd: writable_vreg(1),
            rn: vreg(2),
        },
        "4140651E",
        "frintm d1, d2",
    ));
    insns.push((
        Inst::FpuToInt {
            op: FpuToIntOp::F64ToI64,
            rd: writable_xreg(1),
            rn: vreg(2),
        },
        "4100789E",
        "fcvtzs x1, d2",
    ));
    insns.push((
        Inst::IntToFpu {
            op: IntToFpuOp::I64ToF64,
            rd: writable_vreg(1),
            rn: xreg(2),
        },
        "4100629E",
        "scvtf d1, x2",
    ));
    insns.push((
        Inst::MovToFpu {
            rd: writable_vreg(1),
            rn: xreg(2),
            size: ScalarSize::Size64,
        },
        "4100679E",
        "fmov d1, x2",
    ));

    insns.push((
        Inst::VecDup {
            rd: writable_vreg(4),
            rn: xreg(5),
            size: VectorSize::Size32x4,
        },
        "A40C044E",
        "dup v4.4s, w5",
    ));
    insns.push((
        Inst::VecRRR {
            alu_op: VecALUOp::Add,
            rd: writable_vreg(1),
            rn: vreg(2),
            rm: vreg(3),
            size: VectorSize::Size32x4,
        },
        "4184A34E",
        "add v1.4s, v2.4s, v3.4s",
    ));
    insns.push((
        Inst::VecRRR {
            alu_op: VecALUOp::Uzp1,
            rd: writable_vreg(1),
            rn: vreg(2),
            rm: vreg(3),
            size: VectorSize::Size16x8,
        },
        "4118434E",
        "uzp1 v1.8h, v2.8h, v3.8h",
    ));
    insns.push((
        Inst::VecLanes {
            op: VecLanesOp::Umaxv,
            rd: writable_vreg(6),
            rn: vreg(7),
            size: VectorSize::Size32x4,
        },
        "E6A8B06E",
        "umaxv s6, v7.4s",
    ));
    insns.push((
        Inst::VecRRNarrow {
            op: VecRRNarrowOp::Sqxtn,
            rd: writable_vreg(1),
            rn: vreg(2),
            lane_size: ScalarSize::Size8,
            high_half: true,
        },
        "4148214E",
        "sqxtn2 v1.16b, v2.8h",
    ));
    insns.push((
        Inst::VecExtend {
            t: VecExtendOp::Sxtl8,
            rd: writable_vreg(8),
            rn: vreg(2),
            high_half: false,
        },
        "48A4080F",
        "sshll v8.8h, v2.8b, #0",
    ));
    insns.push((
        Inst::VecExtract {
            rd: writable_vreg(1),
            rn: vreg(2),
            rm: vreg(3),
            imm4: 4,
        },
        "4120036E",
        "ext v1.16b, v2.16b, v3.16b, #4",
    ));
    insns.push((
        Inst::VecTbl2 {
            rd: writable_vreg(0),
            rn: vreg(1),
            rn2: vreg(2),
            rm: vreg(3),
        },
        "2020034E",
        "tbl v0.16b, { v1.16b, v2.16b }, v3.16b",
    ));
    insns.push((
        Inst::MovFromVec {
            rd: writable_xreg(3),
            rn: vreg(8),
            idx: 1,
            size: VectorSize::Size32x4,
        },
        "033D0C0E",
        "umov w3, v8.s[1]",
    ));
    insns.push((
        Inst::MovFromVec {
            rd: writable_xreg(1),
            rn: vreg(2),
            idx: 0,
            size: VectorSize::Size64x2,
        },
        "413C084E",
        "mov x1, v2.d[0]",
    ));
    insns.push((
        Inst::MovToVec {
            rd: writable_vreg(9),
            rn: xreg(5),
            idx: 2,
            size: VectorSize::Size32x4,
        },
        "A91C144E",
        "mov v9.s[2], w5",
    ));
    insns.push((
        Inst::VecShiftImm {
            op: VecShiftImmOp::Shl,
            rd: writable_vreg(1),
            rn: vreg(2),
            size: VectorSize::Size32x4,
            imm: 3,
        },
        "4154234F",
        "shl v1.4s, v2.4s, #3",
    ));

    insns.push((
        Inst::LoadAcquire {
            access_ty: types::I64,
            rt: writable_xreg(3),
            rn: xreg(4),
        },
        "83FCDFC8",
        "ldar x3, [x4]",
    ));
    insns.push((
        Inst::StoreRelease {
            access_ty: types::I32,
            rt: xreg(1),
            rn: xreg(2),
        },
        "41FC9F88",
        "stlr w1, [x2]",
    ));
    insns.push((Inst::Fence, "BF3B03D5", "dmb ish"));

    insns.push((Inst::Brk, "000020D4", "brk #0"));
    insns.push((
        Inst::Udf {
            trap_code: TrapCode::UnreachableCodeReached,
        },
        "0000A0D4",
        "udf",
    ));
    insns.push((
        Inst::IndirectBr {
            rn: xreg(3),
            targets: vec![],
        },
        "60001FD6",
        "br x3",
    ));
    insns.push((
        Inst::CallInd {
            info: Box::new(CallIndInfo {
                rn: xreg(10),
                uses: vec![],
                defs: vec![],
            }),
        },
        "40013FD6",
        "blr x10",
    ));
    insns.push((
        Inst::Adr {
            rd: writable_xreg(2),
            off: 16,
        },
        "82000010",
        "adr x2, pc+16",
    ));

    let mut all_hex = String::new();
    for (insn, expected_encoding, expected_printing) in insns {
        println!("AArch64: {:?}, {}, {}", insn, expected_encoding, expected_printing);

        assert_eq!(insn.show(), expected_printing);

        let mut buffer = MachBuffer::new();
        let mut state = EmitState::new();
        insn.emit(&mut buffer, &mut state);
        let buffer = buffer.finish().unwrap();
        let actual_encoding = hex_encode(&buffer.data);
        assert_eq!(actual_encoding, expected_encoding);
        all_hex.push_str(&actual_encoding);
    }
    // Every emitted instruction is a whole number of 4-byte words.
    assert_eq!(all_hex.len() % 8, 0);
}

fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for b in data {
        s.push_str(&format!("{:02X}", b));
    }
    s
}

#[test]
fn test_load_constant_sequences() {
    // Single MOVZ.
    let insts = Inst::load_constant(writable_xreg(1), 42);
    assert_eq!(insts.len(), 1);
    // Single MOVN for a dense-ones value.
    let insts = Inst::load_constant(writable_xreg(1), !42u64);
    assert_eq!(insts.len(), 1);
    // Logical immediate via ORR.
    let insts = Inst::load_constant(writable_xreg(1), 0x5555_5555_5555_5555);
    assert_eq!(insts.len(), 1);
    // Three significant halfwords -> MOVZ + 2 MOVK.
    let insts = Inst::load_constant(writable_xreg(1), 0x1234_0000_5678_0000 | 1);
    assert_eq!(insts.len(), 3);
    // All four halfwords significant -> MOVZ + 3 MOVK (4 words).
    let insts = Inst::load_constant(writable_xreg(1), 0x1234_5678_9abc_def1);
    assert_eq!(insts.len(), 4);
}

#[test]
fn test_mem_finalize_legalizes_offsets() {
    use crate::isa::aarch64::inst::emit::mem_finalize;

    let state = EmitState::new();

    // Small SP offset: no helper instructions.
    let (insts, mem) = mem_finalize(&AMode::SPOffset(32, types::I64), types::I64, &state);
    assert!(insts.is_empty());
    match mem {
        AMode::Unscaled(reg, simm9) => {
            assert_eq!(reg, stack_reg());
            assert_eq!(simm9.value, 32);
        }
        m => panic!("unexpected amode {:?}", m),
    }

    // Medium positive offset: scaled unsigned form.
    let (insts, mem) = mem_finalize(&AMode::SPOffset(4096, types::I64), types::I64, &state);
    assert!(insts.is_empty());
    match mem {
        AMode::UnsignedOffset(reg, uimm12) => {
            assert_eq!(reg, stack_reg());
            assert_eq!(uimm12.value, 4096);
        }
        m => panic!("unexpected amode {:?}", m),
    }

    // Huge offset: materialized into the spill temporary.
    let (insts, mem) = mem_finalize(&AMode::FPOffset(1 << 20, types::I64), types::I64, &state);
    assert!(!insts.is_empty());
    match mem {
        AMode::RegReg(base, idx) => {
            assert_eq!(base, fp_reg());
            assert_eq!(idx, spilltmp_reg());
        }
        m => panic!("unexpected amode {:?}", m),
    }

    // Incoming-arg offsets resolve against the frozen frame size.
    let mut state = EmitState::new();
    state.frame_size = 80;
    let (insts, mem) = mem_finalize(&AMode::IncomingArg(8, types::I64), types::I64, &state);
    assert!(insts.is_empty());
    match mem {
        AMode::Unscaled(reg, simm9) => {
            assert_eq!(reg, stack_reg());
            assert_eq!(simm9.value, 88);
        }
        m => panic!("unexpected amode {:?}", m),
    }
}
