//! The lowering context: the state a backend's lowering rules operate on.
//!
//! `Lower` walks an IR function block by block, handing each IR
//! instruction to the backend's rule engine. Constructors fetch operand
//! registers through `put_value_in_reg` (which assigns a fresh virtual
//! register per register class to any value it has not seen), allocate
//! destination vregs with `alloc_tmp`, and push machine instructions into
//! the current vcode block with `emit`.

use crate::ir::{self, Function, InstructionData, Opcode, Value, ValueDef};
use crate::machinst::reg::{Reg, RegClass, Writable};
use crate::machinst::vcode::{BlockIndex, VCodeBuilder};
use crate::machinst::MachInst;
use log::trace;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Tracker counting, per named lowering rule, how many times it fired.
/// Used to detect dead rules. Keys are reported in alphabetical order.
#[derive(Default, Debug)]
pub struct RuleCoverage {
    counts: BTreeMap<&'static str, u64>,
}

impl RuleCoverage {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one firing of the named rule.
    pub fn record(&mut self, rule: &'static str) {
        *self.counts.entry(rule).or_insert(0) += 1;
    }

    /// Number of distinct rules that fired.
    pub fn unique_rules(&self) -> usize {
        self.counts.len()
    }

    /// Total rule firings.
    pub fn total_firings(&self) -> u64 {
        self.counts.values().sum()
    }

    /// A report listing each rule and its count, sorted alphabetically,
    /// followed by the totals.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (rule, count) in &self.counts {
            out.push_str(&format!("{}: {}\n", rule, count));
        }
        out.push_str(&format!(
            "total: {} rules, {} firings\n",
            self.unique_rules(),
            self.total_firings()
        ));
        out
    }
}

/// Lowering context over one function, generic over the machine
/// instruction type.
pub struct Lower<'a, I> {
    f: &'a Function,
    vcode: VCodeBuilder<I>,
    /// vreg assigned to each IR value that has been seen, indexed by value
    /// number. Multi-register values (i128) take a pair.
    value_regs: Vec<Option<ValueRegs>>,
    next_vreg: u32,
    coverage: RuleCoverage,
}

/// One or two registers holding an SSA value (two for i128).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValueRegs {
    regs: [Reg; 2],
    len: u8,
}

impl ValueRegs {
    /// A single-register value.
    pub fn one(reg: Reg) -> Self {
        Self {
            regs: [reg, reg],
            len: 1,
        }
    }

    /// A register-pair value.
    pub fn two(lo: Reg, hi: Reg) -> Self {
        Self {
            regs: [lo, hi],
            len: 2,
        }
    }

    /// The registers.
    pub fn regs(&self) -> &[Reg] {
        &self.regs[..self.len as usize]
    }

    /// The single register; panics if this is a pair.
    pub fn only_reg(&self) -> Reg {
        assert_eq!(self.len, 1);
        self.regs[0]
    }

    /// Number of registers.
    pub fn len(&self) -> usize {
        self.len as usize
    }
}

impl<'a, I: MachInst> Lower<'a, I> {
    /// Create a lowering context for the given function.
    pub fn new(f: &'a Function) -> Self {
        Self {
            f,
            vcode: VCodeBuilder::new(),
            value_regs: vec![None; f.dfg.num_values()],
            next_vreg: 0,
            coverage: RuleCoverage::new(),
        }
    }

    /// The function being lowered.
    pub fn func(&self) -> &Function {
        self.f
    }

    /// The data flow graph of the function being lowered.
    pub fn dfg(&self) -> &ir::DataFlowGraph {
        &self.f.dfg
    }

    /// The operation and operands of an IR instruction.
    pub fn data(&self, inst: ir::Inst) -> &InstructionData {
        self.f.dfg.inst_data(inst)
    }

    /// The type of the given IR value.
    pub fn value_ty(&self, value: Value) -> ir::Type {
        self.f.dfg.value_type(value)
    }

    /// The type of instruction `inst`'s result number `idx`.
    pub fn output_ty(&self, inst: ir::Inst, idx: usize) -> ir::Type {
        self.f.dfg.value_type(self.f.dfg.inst_results(inst)[idx])
    }

    /// The `idx`'th input value of an instruction.
    pub fn input_as_value(&self, inst: ir::Inst, idx: usize) -> Value {
        self.data(inst).arguments()[idx]
    }

    /// If `value` is defined by an instruction with the given opcode,
    /// return that instruction.
    pub fn maybe_input_insn(&self, value: Value, op: Opcode) -> Option<ir::Inst> {
        match self.f.dfg.value_def(value) {
            ValueDef::Result(def_inst, 0) if self.data(def_inst).opcode() == op => Some(def_inst),
            _ => None,
        }
    }

    /// If `value` is an integer constant, return its bits.
    pub fn get_value_constant(&self, value: Value) -> Option<u64> {
        match self.f.dfg.value_def(value) {
            ValueDef::Result(def_inst, 0) => match self.data(def_inst) {
                &InstructionData::UnaryImm {
                    opcode: Opcode::Iconst,
                    imm,
                } => Some(imm as u64),
                _ => None,
            },
            _ => None,
        }
    }

    /// Allocate a fresh virtual register of the given class.
    pub fn alloc_vreg(&mut self, class: RegClass) -> Reg {
        let reg = Reg::new_virtual(class, self.next_vreg);
        self.next_vreg += 1;
        reg
    }

    /// Allocate a fresh writable temporary of the given class.
    pub fn alloc_tmp(&mut self, class: RegClass) -> Writable<Reg> {
        Writable::from_reg(self.alloc_vreg(class))
    }

    /// The register(s) holding `value`, assigning fresh vregs on first
    /// sight. Virtual-register numbering is per-function; indices are not
    /// reused.
    pub fn value_regs(&mut self, value: Value) -> ValueRegs {
        if let Some(regs) = self.value_regs[value.index()] {
            return regs;
        }
        let ty = self.value_ty(value);
        let regs = if ty == ir::types::I128 {
            ValueRegs::two(
                self.alloc_vreg(RegClass::Int),
                self.alloc_vreg(RegClass::Int),
            )
        } else {
            ValueRegs::one(self.alloc_vreg(I::rc_for_type(ty)))
        };
        trace!("value {} -> {:?}", value, regs);
        self.value_regs[value.index()] = Some(regs);
        regs
    }

    /// The single register holding `value`.
    pub fn put_value_in_reg(&mut self, value: Value) -> Reg {
        self.value_regs(value).only_reg()
    }

    /// Push a machine instruction into the current vcode block.
    pub fn emit(&mut self, inst: I) {
        self.vcode.push(inst);
    }

    /// Record that the named rule fired.
    pub fn rule_fired(&mut self, rule: &'static str) {
        trace!("rule fired: {}", rule);
        self.coverage.record(rule);
    }

    /// The rule-coverage tracker.
    pub fn coverage(&self) -> &RuleCoverage {
        &self.coverage
    }

    /// Begin lowering a block: open a vcode block whose parameters are the
    /// vregs of the IR block's parameters.
    pub fn start_block(&mut self, block: ir::Block) -> BlockIndex {
        let mut params: SmallVec<[Reg; 4]> = SmallVec::new();
        let block_params: Vec<Value> = self.f.dfg.block_params(block).to_vec();
        for v in block_params {
            let regs = self.value_regs(v);
            for &reg in regs.regs() {
                params.push(reg);
            }
        }
        self.vcode.start_block(params)
    }

    /// Finish the current vcode block.
    pub fn finish_block(&mut self, succs: SmallVec<[BlockIndex; 2]>) {
        self.vcode.finish_block(succs);
    }

    /// Consume the context, producing the built vcode and the coverage
    /// tracker.
    pub fn finish(self) -> (crate::machinst::vcode::VCode<I>, RuleCoverage) {
        let vcode = self.vcode.build(self.next_vreg);
        (vcode, self.coverage)
    }
}
