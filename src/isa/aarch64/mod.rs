//! AArch64 (ARMv8-A) instruction-set backend.
//!
//! The pipeline, per function: the lowering engine produces `VCode` over
//! virtual registers; the register-allocator bridge extracts operand
//! records, runs the external allocator, and applies its output; the ABI
//! engine finalizes the frame and supplies prologue/epilogue code; the
//! emitter walks the vcode writing bytes into a `MachBuffer`, then appends
//! the literal pool and resolves all label fixups.

pub mod abi;
pub mod inst;
pub(crate) mod lower;
pub mod pcc;

use crate::ir::{self, Function};
use crate::isa::Platform;
use crate::machinst::{CompiledCode, Lower, MachBuffer, MachLabel, RegClass, VCode, Writable};
use crate::regalloc::{
    Allocation, Operand, OperandPos, RegAllocRequest, RegAllocation, RegAllocator,
    RegUsageCollector, RegUsageMapper, SpillSlot,
};
use crate::result::CodegenResult;
use abi::{AArch64ABICallee, ABIArg, ABIArgSlot};
use inst::{
    aarch64_get_regs, aarch64_map_regs, writable_spilltmp_reg, writable_tmp2_reg,
    writable_vec_spilltmp_reg, AMode, EmitState, Inst, NOP4,
};
use log::{debug, trace};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// The AArch64 backend.
pub struct AArch64Backend {
    platform: Platform,
}

impl AArch64Backend {
    /// Create a backend for the given platform.
    pub fn new(platform: Platform) -> AArch64Backend {
        AArch64Backend { platform }
    }

    /// The platform this backend targets.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Compile one function to machine code. All mutable state reachable
    /// from one invocation is newly allocated; distinct functions may be
    /// compiled on distinct threads concurrently.
    pub fn compile_function<RA: RegAllocator>(
        &self,
        func: &Function,
        ra: &mut RA,
    ) -> CodegenResult<CompiledCode> {
        debug!("compiling {} {}", func.name, func.signature);
        let mut callee = AArch64ABICallee::new(func.signature.clone(), self.platform)?;
        let facts = pcc::FactFlowState::compute(func);

        // A comparison whose single use is the terminator of its own
        // block is sunk into the branch: the branch re-materializes the
        // flags and the standalone boolean is never built.
        let sunk = sinkable_compares(func);

        // Lower IR to vcode.
        let (mut vcode, coverage) = {
            let mut lower = Lower::<Inst>::new(func);
            let block_index: FxHashMap<ir::Block, u32> = func
                .layout
                .iter()
                .enumerate()
                .map(|(i, b)| (*b, i as u32))
                .collect();
            let lookup = |b: ir::Block| -> u32 { block_index[&b] };

            for (i, &block) in func.layout.iter().enumerate() {
                lower.start_block(block);
                if i == 0 {
                    let params: Vec<ir::Value> = func.dfg.block_params(block).to_vec();
                    let mut ctx = lower::AArch64LowerCtx {
                        lower: &mut lower,
                        abi: &callee,
                        facts: &facts,
                    };
                    emit_arg_copies(&mut ctx, &params);
                }
                let insts: Vec<ir::Inst> = func.dfg.block_insts(block).to_vec();
                let (body, term) = match insts.split_last() {
                    Some((term, body)) => (body, *term),
                    None => panic!("block {} has no terminator", block),
                };
                let mut ctx = lower::AArch64LowerCtx {
                    lower: &mut lower,
                    abi: &callee,
                    facts: &facts,
                };
                for &insn in body {
                    if sunk.contains(&insn) {
                        continue;
                    }
                    lower::lower_inst::lower_insn(&mut ctx, insn)?;
                }
                let succs = lower::lower_inst::lower_terminator(&mut ctx, term, &lookup)?;
                lower.finish_block(succs);
            }
            lower.finish()
        };
        trace!(
            "lowered {} vcode insts over {} blocks; {}",
            vcode.num_insts(),
            vcode.num_blocks(),
            coverage.report()
        );

        // Bridge, extraction pass: flat operand records per instruction.
        let request = RegAllocRequest {
            operands: vcode
                .insts()
                .iter()
                .map(|inst| {
                    let mut coll = RegUsageCollector::new();
                    aarch64_get_regs(inst, &mut coll);
                    coll.into_operands()
                })
                .collect(),
            block_params: (0..vcode.num_blocks() as u32)
                .map(|b| vcode.block_params(b).to_vec())
                .collect(),
            num_vregs: vcode.num_vregs(),
        };
        let allocation = ra.run(&request);

        // Bridge, application pass (part 1): record spill-slot usage and
        // scan for clobbered callee-saves so the frame can be frozen.
        callee.set_locals_size(func.stack_slots_size());
        callee.set_spillslots(allocation.num_spillslots());
        scan_clobbers(&request.operands, &*allocation, &mut callee);
        let frame_size = callee.compute_frame_layout();

        // Bridge, application pass (part 2): rewrite every vreg to its
        // physical register, materializing spill reloads and saves around
        // the affected operands.
        apply_allocations(&mut vcode, &request.operands, &*allocation, &callee);

        // Emission.
        let mut buffer = MachBuffer::new();
        let mut state = EmitState::new();
        state.frame_size = frame_size;
        buffer.reserve_labels_for_blocks(vcode.num_blocks() as u32);

        let nblocks = vcode.num_blocks() as u32;
        for b in 0..nblocks {
            buffer.bind_label(MachLabel::from_block(b));
            state.fallthrough = if b + 1 < nblocks {
                Some(MachLabel::from_block(b + 1))
            } else {
                None
            };
            if b == 0 {
                for inst in callee.gen_prologue() {
                    inst.emit(&mut buffer, &mut state);
                }
            }
            for inst in vcode.block_insns(b) {
                match inst {
                    Inst::EpiloguePlaceholder => {
                        for inst in callee.gen_epilogue() {
                            inst.emit(&mut buffer, &mut state);
                        }
                    }
                    inst => inst.emit(&mut buffer, &mut state),
                }
            }
        }

        // The literal pool lives after the function's code.
        let litpool = std::mem::take(&mut state.litpool);
        litpool.emit(&mut buffer, NOP4);

        let buffer = buffer.finish()?;
        debug_assert_eq!(buffer.data.len() % 4, 0);
        Ok(CompiledCode {
            buffer,
            frame_size,
            unwind: callee.unwind_info(),
            coverage: Some(coverage),
        })
    }
}

/// Find `icmp`/`fcmp` instructions whose single use is the conditional
/// branch terminating their own block; those are lowered as part of the
/// branch and skipped in the block body.
fn sinkable_compares(func: &Function) -> std::collections::HashSet<ir::Inst> {
    let dfg = &func.dfg;
    let mut use_counts = vec![0u32; dfg.num_values()];
    for &block in &func.layout {
        for &inst in dfg.block_insts(block) {
            for arg in dfg.inst_data(inst).arguments() {
                use_counts[arg.index()] += 1;
            }
        }
        for (_, edge_args) in dfg.block_succs(block) {
            for arg in edge_args {
                use_counts[arg.index()] += 1;
            }
        }
    }

    let mut sunk = std::collections::HashSet::new();
    for &block in &func.layout {
        let insts = dfg.block_insts(block);
        let term = match insts.last() {
            Some(t) => *t,
            None => continue,
        };
        let cond = match dfg.inst_data(term) {
            ir::InstructionData::Brif { arg, .. } => *arg,
            _ => continue,
        };
        if use_counts[cond.index()] != 1 {
            continue;
        }
        if let ir::ValueDef::Result(def_inst, 0) = dfg.value_def(cond) {
            if !insts.contains(&def_inst) {
                continue;
            }
            match dfg.inst_data(def_inst) {
                ir::InstructionData::IntCompare { .. } => {
                    sunk.insert(def_inst);
                }
                // Compound unordered conditions materialize a boolean;
                // only single-condition float compares sink.
                ir::InstructionData::FloatCompare { cond, .. } => {
                    if let lower::FloatCCMapping::Single(_) = lower::expand_float_cc(*cond) {
                        sunk.insert(def_inst);
                    }
                }
                _ => {}
            }
        }
    }
    sunk
}

/// Copy incoming arguments from their fixed registers or stack slots into
/// the entry block's parameter vregs.
fn emit_arg_copies(ctx: &mut lower::AArch64LowerCtx, params: &[ir::Value]) {
    let arg_locs = ctx.abi.arg_locs().to_vec();
    debug_assert_eq!(
        params.len(),
        arg_locs.len(),
        "entry block params must match ABI signature"
    );
    for (param, loc) in params.iter().zip(arg_locs.iter()) {
        let regs = ctx.lower.value_regs(*param);
        match loc {
            ABIArg::Slots { slots } => {
                debug_assert_eq!(
                    slots.len(),
                    regs.len(),
                    "value registers must match ABI slots"
                );
                for (slot, &dst) in slots.iter().zip(regs.regs().iter()) {
                    let dst = Writable::from_reg(dst);
                    match *slot {
                        ABIArgSlot::Reg { reg, ty } => {
                            ctx.lower.emit(Inst::mov_for_ty(dst, reg.to_reg(), ty));
                        }
                        ABIArgSlot::Stack { offset, ty } => {
                            ctx.lower.emit(Inst::gen_load(
                                dst,
                                AMode::IncomingArg(offset, ty),
                                ty,
                                crate::ir::MemFlags::trusted(),
                            ));
                        }
                    }
                }
            }
            ABIArg::Indirect { pointer } => match *pointer {
                ABIArgSlot::Reg { reg, ty } => {
                    let dst = Writable::from_reg(regs.only_reg());
                    ctx.lower.emit(Inst::mov_for_ty(dst, reg.to_reg(), ty));
                }
                ABIArgSlot::Stack { offset, ty } => {
                    let dst = Writable::from_reg(regs.only_reg());
                    ctx.lower.emit(Inst::gen_load(
                        dst,
                        AMode::IncomingArg(offset, ty),
                        ty,
                        crate::ir::MemFlags::trusted(),
                    ));
                }
            },
        }
    }
}

/// Scan allocated defs for callee-saved physical registers and record
/// them as clobbers.
fn scan_clobbers(
    operands: &[SmallVec<[Operand; 8]>],
    allocation: &dyn RegAllocation,
    callee: &mut AArch64ABICallee,
) {
    let conv = callee.signature().call_conv;
    let platform = callee.platform();
    for ops in operands {
        for op in ops {
            if op.pos == OperandPos::Use {
                continue;
            }
            let real = match op.reg.to_virtual_reg() {
                Some(vreg) => match allocation.allocation(vreg) {
                    Some(Allocation::Reg(real)) => real,
                    _ => continue,
                },
                None => op.reg.to_real_reg().unwrap(),
            };
            if abi::is_reg_saved_in_prologue(conv, platform, real) {
                callee.add_clobber(Writable::from_reg(real));
            }
        }
    }
}

struct InstMapper {
    map: FxHashMap<crate::machinst::VirtualReg, crate::machinst::RealReg>,
}

impl RegUsageMapper for InstMapper {
    fn get_use(&self, vreg: crate::machinst::VirtualReg) -> Option<crate::machinst::RealReg> {
        self.map.get(&vreg).copied()
    }
    fn get_def(&self, vreg: crate::machinst::VirtualReg) -> Option<crate::machinst::RealReg> {
        self.map.get(&vreg).copied()
    }
    fn get_mod(&self, vreg: crate::machinst::VirtualReg) -> Option<crate::machinst::RealReg> {
        self.map.get(&vreg).copied()
    }
}

/// Walk vcode once, replacing every virtual register with its physical
/// assignment. Spilled vregs borrow a reserved scratch register around
/// the instruction: a reload before for uses, a save after for defs.
/// Running this pass twice is a no-op, since by then every register is
/// physical.
fn apply_allocations(
    vcode: &mut VCode<Inst>,
    operands: &[SmallVec<[Operand; 8]>],
    allocation: &dyn RegAllocation,
    callee: &AArch64ABICallee,
) {
    let mut edits: Vec<(u32, Inst)> = Vec::new();
    for ix in 0..vcode.num_insts() as u32 {
        let mut mapper = InstMapper {
            map: FxHashMap::default(),
        };
        // Scratch registers for spilled operands: one int, one vector
        // reload slot before the instruction; defs store after.
        let mut int_scratch = [writable_spilltmp_reg(), writable_tmp2_reg()].into_iter();
        let mut vec_scratch = [writable_vec_spilltmp_reg()].into_iter();
        for op in &operands[ix as usize] {
            let vreg = match op.reg.to_virtual_reg() {
                Some(v) => v,
                None => continue,
            };
            match allocation
                .allocation(vreg)
                .unwrap_or_else(|| panic!("no allocation for {:?}", vreg))
            {
                Allocation::Reg(real) => {
                    mapper.map.insert(vreg, real);
                }
                Allocation::Stack(SpillSlot(slot)) => {
                    let (scratch, ty) = match vreg.class() {
                        RegClass::Int => (
                            int_scratch.next().expect("too many spilled int operands"),
                            ir::types::I64,
                        ),
                        RegClass::Float => (
                            vec_scratch.next().expect("too many spilled fp operands"),
                            ir::types::F64,
                        ),
                        RegClass::Vector => (
                            vec_scratch.next().expect("too many spilled vec operands"),
                            ir::types::I8X16,
                        ),
                    };
                    let amode = callee.spillslot_amode(slot, ty);
                    match op.pos {
                        OperandPos::Use => {
                            edits.push((
                                ix,
                                Inst::gen_load(scratch, amode, ty, crate::ir::MemFlags::trusted()),
                            ));
                        }
                        OperandPos::Def => {
                            edits.push((
                                ix + 1,
                                Inst::gen_store(
                                    amode,
                                    scratch.to_reg(),
                                    ty,
                                    crate::ir::MemFlags::trusted(),
                                ),
                            ));
                        }
                        OperandPos::UseDef => {
                            edits.push((
                                ix,
                                Inst::gen_load(scratch, amode, ty, crate::ir::MemFlags::trusted()),
                            ));
                            edits.push((
                                ix + 1,
                                Inst::gen_store(
                                    amode,
                                    scratch.to_reg(),
                                    ty,
                                    crate::ir::MemFlags::trusted(),
                                ),
                            ));
                        }
                    }
                    mapper
                        .map
                        .insert(vreg, scratch.to_reg().to_real_reg().unwrap());
                }
            }
        }
        aarch64_map_regs(vcode.inst_mut(ix), &mapper);
    }
    vcode.insert_insts(edits);
}
