//! End-to-end pipeline tests: IR function in, AArch64 bytes out.
//!
//! The register allocator is an external collaborator, so these tests
//! drive the backend with a table-driven assignment that plays its role:
//! each virtual register is mapped to a hand-picked physical register
//! (or spill slot), the way a coalescing allocator would assign them.

use oxbow_codegen::ir::{self, types, AbiParam, Function, InstructionData, Opcode, Signature};
use oxbow_codegen::isa::aarch64::inst::{aarch64_map_regs, xreg, AMode, Inst, OperandSize};
use oxbow_codegen::isa::aarch64::AArch64Backend;
use oxbow_codegen::isa::{CallConv, Platform};
use oxbow_codegen::machinst::{RealReg, RegClass, VirtualReg, Writable};
use oxbow_codegen::regalloc::{
    Allocation, RegAllocRequest, RegAllocation, RegAllocator, RegUsageMapper, SpillSlot,
};

/// An "allocator" whose decisions are a fixed table indexed by vreg
/// number.
struct TableAlloc {
    map: Vec<Allocation>,
    spillslots: u32,
}

impl TableAlloc {
    fn regs(assignments: &[(RegClass, u8)]) -> TableAlloc {
        TableAlloc {
            map: assignments
                .iter()
                .map(|&(class, enc)| Allocation::Reg(RealReg::new(class, enc)))
                .collect(),
            spillslots: 0,
        }
    }
}

struct TableAssignment {
    map: Vec<Allocation>,
    spillslots: u32,
}

impl RegAllocator for TableAlloc {
    fn run(&mut self, req: &RegAllocRequest) -> Box<dyn RegAllocation> {
        assert_eq!(
            req.num_vregs as usize,
            self.map.len(),
            "test allocation table must cover every vreg"
        );
        Box::new(TableAssignment {
            map: self.map.clone(),
            spillslots: self.spillslots,
        })
    }
}

impl RegAllocation for TableAssignment {
    fn allocation(&self, vreg: VirtualReg) -> Option<Allocation> {
        self.map.get(vreg.index()).copied()
    }

    fn num_spillslots(&self) -> u32 {
        self.spillslots
    }
}

fn x(n: u8) -> (RegClass, u8) {
    (RegClass::Int, n)
}

fn words(data: &[u8]) -> Vec<u32> {
    assert_eq!(data.len() % 4, 0);
    data.chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

fn i64_sig(nargs: usize, nrets: usize) -> Signature {
    let mut sig = Signature::new(CallConv::Aapcs64);
    sig.params = (0..nargs).map(|_| AbiParam::new(types::I64)).collect();
    sig.returns = (0..nrets).map(|_| AbiParam::new(types::I64)).collect();
    sig
}

#[test]
fn minimal_return() {
    let _ = env_logger::try_init();
    // function() -> i64 { ret iconst_64 0 }
    let mut func = Function::with_name_signature(ir::ExternalName::user(0, 0), i64_sig(0, 1));
    let block = func.dfg.make_block();
    func.layout.push(block);
    let c = func.dfg.append_inst(
        block,
        InstructionData::UnaryImm {
            opcode: Opcode::Iconst,
            imm: 0,
        },
        &[types::I64],
    );
    let v = func.dfg.first_result(c);
    func.dfg.append_inst(
        block,
        InstructionData::MultiAry {
            opcode: Opcode::Ret,
            args: vec![v],
        },
        &[],
    );

    let backend = AArch64Backend::new(Platform::Linux);
    let mut ra = TableAlloc::regs(&[x(0)]);
    let code = backend.compile_function(&func, &mut ra).unwrap();

    assert_eq!(code.frame_size, 16);
    assert_eq!(
        words(&code.buffer.data),
        vec![
            0xA9BF7BFD, // stp x29, x30, [sp, #-16]!
            0x910003FD, // mov x29, sp
            0xD2800000, // movz x0, #0
            0xA8C17BFD, // ldp x29, x30, [sp], #16
            0xD65F03C0, // ret
        ]
    );
}

#[test]
fn add_two_args() {
    let _ = env_logger::try_init();
    // function(a: i64, b: i64) -> i64 { ret iadd a, b }
    let mut func = Function::with_name_signature(ir::ExternalName::user(0, 1), i64_sig(2, 1));
    let block = func.dfg.make_block();
    func.layout.push(block);
    let a = func.dfg.append_block_param(block, types::I64);
    let b = func.dfg.append_block_param(block, types::I64);
    let add = func.dfg.append_inst(
        block,
        InstructionData::Binary {
            opcode: Opcode::Iadd,
            args: [a, b],
        },
        &[types::I64],
    );
    let sum = func.dfg.first_result(add);
    func.dfg.append_inst(
        block,
        InstructionData::MultiAry {
            opcode: Opcode::Ret,
            args: vec![sum],
        },
        &[],
    );

    let backend = AArch64Backend::new(Platform::Linux);
    // a -> x0, b -> x1, sum -> x0: the coalesced assignment.
    let mut ra = TableAlloc::regs(&[x(0), x(1), x(0)]);
    let code = backend.compile_function(&func, &mut ra).unwrap();

    assert_eq!(
        words(&code.buffer.data),
        vec![
            0xA9BF7BFD, // stp x29, x30, [sp, #-16]!
            0x910003FD, // mov x29, sp
            0x8B010000, // add x0, x0, x1
            0xA8C17BFD, // ldp x29, x30, [sp], #16
            0xD65F03C0, // ret
        ]
    );

    // The rule coverage tracker saw the iadd rule fire.
    let coverage = code.coverage.unwrap();
    assert!(coverage.report().contains("iadd_imm12: 1"));
    assert!(coverage.unique_rules() >= 1);
}

#[test]
fn ninth_arg_comes_from_stack() {
    let _ = env_logger::try_init();
    // function(a..h, i: i64) -> i64 { ret i }
    let mut func = Function::with_name_signature(ir::ExternalName::user(0, 2), i64_sig(9, 1));
    let block = func.dfg.make_block();
    func.layout.push(block);
    let params: Vec<ir::Value> = (0..9)
        .map(|_| func.dfg.append_block_param(block, types::I64))
        .collect();
    func.dfg.append_inst(
        block,
        InstructionData::MultiAry {
            opcode: Opcode::Ret,
            args: vec![params[8]],
        },
        &[],
    );

    let backend = AArch64Backend::new(Platform::Linux);
    let mut assignments: Vec<(RegClass, u8)> = (0..8).map(|i| x(i as u8)).collect();
    assignments.push(x(0)); // the ninth argument's vreg
    let mut ra = TableAlloc::regs(&assignments);
    let code = backend.compile_function(&func, &mut ra).unwrap();

    assert_eq!(
        words(&code.buffer.data),
        vec![
            0xA9BF7BFD, // stp x29, x30, [sp, #-16]!
            0x910003FD, // mov x29, sp
            0xF84103E0, // ldur x0, [sp, #16] (frame_size + 0)
            0xA8C17BFD, // ldp x29, x30, [sp], #16
            0xD65F03C0, // ret
        ]
    );
}

#[test]
fn icmp_brif_fuses_into_conditional_branch() {
    let _ = env_logger::try_init();
    // v2 = icmp.eq v0, v1 ; brif v2, block1, block2
    // block1: ret 1 ; block2: ret 0
    let mut func = Function::with_name_signature(ir::ExternalName::user(0, 3), i64_sig(2, 1));
    let block0 = func.dfg.make_block();
    let block1 = func.dfg.make_block();
    let block2 = func.dfg.make_block();
    func.layout.extend([block0, block1, block2]);

    let a = func.dfg.append_block_param(block0, types::I64);
    let b = func.dfg.append_block_param(block0, types::I64);
    let cmp = func.dfg.append_inst(
        block0,
        InstructionData::IntCompare {
            opcode: Opcode::Icmp,
            args: [a, b],
            cond: ir::IntCC::Equal,
        },
        &[types::I8],
    );
    let flag = func.dfg.first_result(cmp);
    func.dfg.append_inst(
        block0,
        InstructionData::Brif {
            opcode: Opcode::Brif,
            arg: flag,
            then_dest: block1,
            then_args: vec![],
            else_dest: block2,
            else_args: vec![],
        },
        &[],
    );

    for (block, value) in [(block1, 1i64), (block2, 0i64)] {
        let c = func.dfg.append_inst(
            block,
            InstructionData::UnaryImm {
                opcode: Opcode::Iconst,
                imm: value,
            },
            &[types::I64],
        );
        let v = func.dfg.first_result(c);
        func.dfg.append_inst(
            block,
            InstructionData::MultiAry {
                opcode: Opcode::Ret,
                args: vec![v],
            },
            &[],
        );
    }

    let backend = AArch64Backend::new(Platform::Linux);
    let mut ra = TableAlloc::regs(&[x(0), x(1), x(0), x(0)]);
    let code = backend.compile_function(&func, &mut ra).unwrap();

    assert_eq!(
        words(&code.buffer.data),
        vec![
            0xA9BF7BFD, // stp x29, x30, [sp, #-16]!
            0x910003FD, // mov x29, sp
            0xEB01001F, // cmp x0, x1
            0x54000081, // b.ne block2 (inverted: block1 is fallthrough)
            0xD2800020, // movz x0, #1
            0xA8C17BFD, // ldp x29, x30, [sp], #16
            0xD65F03C0, // ret
            0xD2800000, // movz x0, #0
            0xA8C17BFD, // ldp x29, x30, [sp], #16
            0xD65F03C0, // ret
        ]
    );
}

#[test]
fn pointer_compare_uses_cmp_not_subtract_and_test() {
    let _ = env_logger::try_init();
    // v2 = isub a, b ; v4 = icmp.ult v2, 0 with pointer-typed a and b:
    // the comparison must be a real `cmp a, b`, never a `subs v2, #0`
    // (which pins Carry and breaks the unsigned conditions).
    let mut sig = Signature::new(CallConv::Aapcs64);
    sig.params = vec![AbiParam::new(types::R64), AbiParam::new(types::R64)];
    sig.returns = vec![AbiParam::new(types::I64)];
    let mut func = Function::with_name_signature(ir::ExternalName::user(0, 6), sig);
    let block = func.dfg.make_block();
    func.layout.push(block);
    let a = func.dfg.append_block_param(block, types::R64);
    let b = func.dfg.append_block_param(block, types::R64);
    let sub = func.dfg.append_inst(
        block,
        InstructionData::Binary {
            opcode: Opcode::Isub,
            args: [a, b],
        },
        &[types::I64],
    );
    let diff = func.dfg.first_result(sub);
    let zero = func.dfg.append_inst(
        block,
        InstructionData::UnaryImm {
            opcode: Opcode::Iconst,
            imm: 0,
        },
        &[types::I64],
    );
    let zero = func.dfg.first_result(zero);
    let cmp = func.dfg.append_inst(
        block,
        InstructionData::IntCompare {
            opcode: Opcode::Icmp,
            args: [diff, zero],
            cond: ir::IntCC::UnsignedLessThan,
        },
        &[types::I8],
    );
    let flag = func.dfg.first_result(cmp);
    func.dfg.append_inst(
        block,
        InstructionData::MultiAry {
            opcode: Opcode::Ret,
            args: vec![flag],
        },
        &[],
    );

    let backend = AArch64Backend::new(Platform::Linux);
    let mut ra = TableAlloc::regs(&[x(0), x(1), x(2), x(3), x(0)]);
    let code = backend.compile_function(&func, &mut ra).unwrap();

    assert_eq!(
        words(&code.buffer.data),
        vec![
            0xA9BF7BFD, // stp x29, x30, [sp, #-16]!
            0x910003FD, // mov x29, sp
            0xCB010002, // sub x2, x0, x1
            0xD2800003, // movz x3, #0
            0xEB01001F, // cmp x0, x1 (not `subs x2, #0`)
            0x9A9F27E0, // cset x0, lo
            0xA8C17BFD, // ldp x29, x30, [sp], #16
            0xD65F03C0, // ret
        ]
    );
    assert!(code.coverage.unwrap().report().contains("icmp_zero_sub: 1"));
}

#[test]
fn dense_constant_comes_from_literal_pool() {
    let _ = env_logger::try_init();
    // A constant with four significant half-words is loaded from the
    // pool after the code rather than synthesized with MOVKs.
    let mut func = Function::with_name_signature(ir::ExternalName::user(0, 4), i64_sig(0, 1));
    let block = func.dfg.make_block();
    func.layout.push(block);
    let c = func.dfg.append_inst(
        block,
        InstructionData::UnaryImm {
            opcode: Opcode::Iconst,
            imm: 0x1234_5678_9abc_def0u64 as i64,
        },
        &[types::I64],
    );
    let v = func.dfg.first_result(c);
    func.dfg.append_inst(
        block,
        InstructionData::MultiAry {
            opcode: Opcode::Ret,
            args: vec![v],
        },
        &[],
    );

    let backend = AArch64Backend::new(Platform::Linux);
    let mut ra = TableAlloc::regs(&[x(0)]);
    let code = backend.compile_function(&func, &mut ra).unwrap();

    let ws = words(&code.buffer.data);
    // stp, mov fp, ldr-literal, ldp, ret, alignment nop, then the 8-byte
    // pool entry.
    assert_eq!(ws.len(), 8);
    // LDR (literal) x0 with a 19-bit word offset of (24 - 8) / 4 = 4.
    assert_eq!(ws[2], 0x58000080);
    assert_eq!(ws[5], 0xD503201F); // alignment nop
    assert_eq!(
        &code.buffer.data[24..32],
        &0x1234_5678_9abc_def0u64.to_le_bytes()
    );
}

#[test]
fn spilled_vreg_gets_reload_and_save() {
    let _ = env_logger::try_init();
    // Same add-two-args function, but the sum's vreg is assigned a spill
    // slot: the bridge materializes a save after the def and a reload
    // before the use.
    let mut func = Function::with_name_signature(ir::ExternalName::user(0, 5), i64_sig(2, 1));
    let block = func.dfg.make_block();
    func.layout.push(block);
    let a = func.dfg.append_block_param(block, types::I64);
    let b = func.dfg.append_block_param(block, types::I64);
    let add = func.dfg.append_inst(
        block,
        InstructionData::Binary {
            opcode: Opcode::Iadd,
            args: [a, b],
        },
        &[types::I64],
    );
    let sum = func.dfg.first_result(add);
    func.dfg.append_inst(
        block,
        InstructionData::MultiAry {
            opcode: Opcode::Ret,
            args: vec![sum],
        },
        &[],
    );

    let backend = AArch64Backend::new(Platform::Linux);
    let mut ra = TableAlloc {
        map: vec![
            Allocation::Reg(RealReg::new(RegClass::Int, 0)),
            Allocation::Reg(RealReg::new(RegClass::Int, 1)),
            Allocation::Stack(SpillSlot(0)),
        ],
        spillslots: 1,
    };
    let code = backend.compile_function(&func, &mut ra).unwrap();

    // Spill slots add 8 bytes to the frame, rounded to 16.
    assert_eq!(code.frame_size, 32);
    let ws = words(&code.buffer.data);
    // add into the scratch (x16), store to the slot, reload into x16,
    // move to x0 for the return.
    assert_eq!(
        ws,
        vec![
            0xA9BE7BFD, // stp x29, x30, [sp, #-32]!
            0x910003FD, // mov x29, sp
            0x8B010010, // add x16, x0, x1
            0xF81003F0, // stur x16, [sp, #16]
            0xF85103F0, // ldur x16, [sp, #16]
            0xAA1003E0, // mov x0, x16
            0xA8C27BFD, // ldp x29, x30, [sp], #32
            0xD65F03C0, // ret
        ]
    );
}

#[test]
fn application_pass_is_idempotent() {
    let _ = env_logger::try_init();
    // Mapping an instruction whose registers are already physical is a
    // no-op.
    struct NullMapper;
    impl RegUsageMapper for NullMapper {
        fn get_use(&self, _: VirtualReg) -> Option<RealReg> {
            None
        }
        fn get_def(&self, _: VirtualReg) -> Option<RealReg> {
            None
        }
        fn get_mod(&self, _: VirtualReg) -> Option<RealReg> {
            None
        }
    }

    let mut inst = Inst::AluRRR {
        alu_op: oxbow_codegen::isa::aarch64::inst::ALUOp::Add,
        size: OperandSize::Size64,
        rd: Writable::from_reg(xreg(1)),
        rn: xreg(2),
        rm: xreg(3),
    };
    let before = inst.show();
    aarch64_map_regs(&mut inst, &NullMapper);
    assert_eq!(inst.show(), before);

    let mut load = Inst::ULoad64 {
        rd: Writable::from_reg(xreg(4)),
        mem: AMode::RegReg(xreg(5), xreg(6)),
        flags: ir::MemFlags::trusted(),
    };
    let before = load.show();
    aarch64_map_regs(&mut load, &NullMapper);
    assert_eq!(load.show(), before);
}
