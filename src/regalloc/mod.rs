//! The register-allocator bridge.
//!
//! The allocator itself is an external collaborator; this module defines
//! the shapes exchanged with it. The *extraction pass* walks every vcode
//! instruction collecting its register mentions into a `RegUsageCollector`
//! and flattening them into `(vreg, constraint, position)` operand records:
//! all uses in source order, then use-defs, then defs. Physical registers
//! appearing before allocation denote ABI-imposed fixed constraints. The
//! *application pass* walks vcode once, replacing every virtual register
//! with the allocator's assignment; spilled vregs are materialized with
//! load/store instructions around the affected operands.

use crate::machinst::reg::{RealReg, Reg, VirtualReg, Writable};
use smallvec::SmallVec;

/// The position of an operand relative to its instruction's execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandPos {
    /// Read before execution.
    Use,
    /// Written by execution.
    Def,
    /// Read, then written (e.g. MOVK, which preserves the untouched
    /// 16-bit halves; pre/post-indexed address bases).
    UseDef,
}

/// A constraint on where an operand may be allocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandConstraint {
    /// Any register of the operand's class.
    AnyReg,
    /// This specific physical register (ABI-imposed).
    FixedReg(RealReg),
}

/// One flattened operand record handed to the allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operand {
    /// The (virtual or fixed physical) register.
    pub reg: Reg,
    /// The allocation constraint.
    pub constraint: OperandConstraint,
    /// Use/def/use-def position.
    pub pos: OperandPos,
}

impl Operand {
    fn new(reg: Reg, pos: OperandPos) -> Operand {
        let constraint = match reg.to_real_reg() {
            Some(real) => OperandConstraint::FixedReg(real),
            None => OperandConstraint::AnyReg,
        };
        Operand {
            reg,
            constraint,
            pos,
        }
    }
}

/// Collects the register mentions of one instruction. Each `Inst` variant's
/// dispatch arm calls `add_use`/`add_def`/`add_mod` for its operands in
/// source order.
#[derive(Default, Debug)]
pub struct RegUsageCollector {
    uses: SmallVec<[Reg; 8]>,
    defs: SmallVec<[Writable<Reg>; 4]>,
    mods: SmallVec<[Writable<Reg>; 2]>,
}

impl RegUsageCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a register read.
    pub fn add_use(&mut self, reg: Reg) {
        self.uses.push(reg);
    }

    /// Record several register reads.
    pub fn add_uses(&mut self, regs: &[Reg]) {
        self.uses.extend_from_slice(regs);
    }

    /// Record a register write.
    pub fn add_def(&mut self, reg: Writable<Reg>) {
        self.defs.push(reg);
    }

    /// Record several register writes.
    pub fn add_defs(&mut self, regs: &[Writable<Reg>]) {
        self.defs.extend_from_slice(regs);
    }

    /// Record a read-modify-write.
    pub fn add_mod(&mut self, reg: Writable<Reg>) {
        self.mods.push(reg);
    }

    /// Flatten into operand records: uses in source order, then use-defs,
    /// then defs.
    pub fn into_operands(self) -> SmallVec<[Operand; 8]> {
        let mut out = SmallVec::new();
        for reg in self.uses {
            out.push(Operand::new(reg, OperandPos::Use));
        }
        for reg in self.mods {
            out.push(Operand::new(reg.to_reg(), OperandPos::UseDef));
        }
        for reg in self.defs {
            out.push(Operand::new(reg.to_reg(), OperandPos::Def));
        }
        out
    }
}

/// A spill slot, identified by its dense index. Slots are 8 bytes each;
/// vector-class values take two consecutive slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpillSlot(pub u32);

/// One allocation decision for a virtual register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allocation {
    /// The vreg lives in this physical register.
    Reg(RealReg),
    /// The vreg is spilled to this stack slot.
    Stack(SpillSlot),
}

/// The allocator's response: a total mapping from virtual registers to
/// allocations, valid at every program point.
pub trait RegAllocation {
    /// The allocation of the given vreg, or `None` if the allocator failed
    /// to produce one (which is a fatal bridge/allocator disagreement).
    fn allocation(&self, vreg: VirtualReg) -> Option<Allocation>;

    /// Total number of spill slots used.
    fn num_spillslots(&self) -> u32;
}

/// The request handed to the external register allocator: one flat
/// operand vector per instruction, the block-parameter vregs standing in
/// for liveness-in sets, and the total vreg count.
pub struct RegAllocRequest {
    /// Operand records, one vector per instruction, in instruction
    /// order.
    pub operands: Vec<SmallVec<[Operand; 8]>>,
    /// Block-parameter vregs per block.
    pub block_params: Vec<Vec<Reg>>,
    /// Number of virtual registers in the function.
    pub num_vregs: u32,
}

/// The external register allocator. The backend builds a
/// `RegAllocRequest` from vcode, hands it over, and applies the returned
/// allocation.
pub trait RegAllocator {
    /// Run allocation; the result must give an allocation for every vreg
    /// mentioned in the request.
    fn run(&mut self, req: &RegAllocRequest) -> Box<dyn RegAllocation>;
}

/// A mapper handing back a physical register per vreg mention, used by the
/// in-place mapping pass once spills have been materialized.
pub trait RegUsageMapper {
    /// The physical replacement for a use of `vreg`.
    fn get_use(&self, vreg: VirtualReg) -> Option<RealReg>;
    /// The physical replacement for a def of `vreg`.
    fn get_def(&self, vreg: VirtualReg) -> Option<RealReg>;
    /// The physical replacement for a use-def of `vreg`.
    fn get_mod(&self, vreg: VirtualReg) -> Option<RealReg>;
}

/// Map a use-position register in place. A physical register is left
/// untouched. Panics on an unallocated vreg: that is a compiler bug.
pub fn map_use<M: RegUsageMapper>(m: &M, r: &mut Reg) {
    if let Some(vreg) = r.to_virtual_reg() {
        let new = m
            .get_use(vreg)
            .unwrap_or_else(|| panic!("no allocation for vreg use {:?}", vreg));
        *r = new.to_reg();
    }
}

/// Map a def-position register in place.
pub fn map_def<M: RegUsageMapper>(m: &M, r: &mut Writable<Reg>) {
    if let Some(vreg) = r.to_reg().to_virtual_reg() {
        let new = m
            .get_def(vreg)
            .unwrap_or_else(|| panic!("no allocation for vreg def {:?}", vreg));
        *r = Writable::from_reg(new.to_reg());
    }
}

/// Map a use-def-position register in place.
pub fn map_mod<M: RegUsageMapper>(m: &M, r: &mut Writable<Reg>) {
    if let Some(vreg) = r.to_reg().to_virtual_reg() {
        let new = m
            .get_mod(vreg)
            .unwrap_or_else(|| panic!("no allocation for vreg mod {:?}", vreg));
        *r = Writable::from_reg(new.to_reg());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machinst::reg::RegClass;

    #[test]
    fn operand_order_and_constraints() {
        let v0 = Reg::new_virtual(RegClass::Int, 0);
        let v1 = Reg::new_virtual(RegClass::Int, 1);
        let x0 = Reg::new_real(RegClass::Int, 0);
        let mut coll = RegUsageCollector::new();
        coll.add_use(v0);
        coll.add_use(x0);
        coll.add_def(Writable::from_reg(v1));
        let ops = coll.into_operands();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].pos, OperandPos::Use);
        assert_eq!(ops[0].constraint, OperandConstraint::AnyReg);
        assert_eq!(
            ops[1].constraint,
            OperandConstraint::FixedReg(x0.to_real_reg().unwrap())
        );
        assert_eq!(ops[2].pos, OperandPos::Def);
    }
}
