//! The virtual-code container: an ordered instruction stream partitioned
//! into basic blocks, produced by lowering and consumed first by the
//! register-allocator bridge and then by emission.
//!
//! Instructions and blocks are dense-indexed; block `i`'s entry label is
//! always `MachLabel::from_block(i)`.

use crate::machinst::reg::Reg;
use smallvec::SmallVec;

/// Index of an instruction in VCode.
pub type InsnIndex = u32;

/// Index of a basic block in VCode.
pub type BlockIndex = u32;

/// A block of virtual code: lowered instructions with virtual registers.
pub struct VCode<I> {
    /// Lowered machine instructions, in emission order.
    insts: Vec<I>,
    /// Half-open instruction ranges, per block.
    block_ranges: Vec<(InsnIndex, InsnIndex)>,
    /// Successors of each block.
    block_succs: Vec<SmallVec<[BlockIndex; 2]>>,
    /// Predecessors of each block.
    block_preds: Vec<SmallVec<[BlockIndex; 2]>>,
    /// Block parameters (vregs standing in for φ-nodes), per block.
    block_params: Vec<SmallVec<[Reg; 4]>>,
    /// Number of virtual registers allocated during lowering.
    num_vregs: u32,
}

impl<I> VCode<I> {
    /// Number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.block_ranges.len()
    }

    /// Number of instructions.
    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    /// Number of virtual registers.
    pub fn num_vregs(&self) -> u32 {
        self.num_vregs
    }

    /// The instructions of a block.
    pub fn block_insns(&self, block: BlockIndex) -> &[I] {
        let (start, end) = self.block_ranges[block as usize];
        &self.insts[start as usize..end as usize]
    }

    /// The instruction index range of a block.
    pub fn block_range(&self, block: BlockIndex) -> (InsnIndex, InsnIndex) {
        self.block_ranges[block as usize]
    }

    /// One instruction, by index.
    pub fn inst(&self, ix: InsnIndex) -> &I {
        &self.insts[ix as usize]
    }

    /// Mutable access to one instruction, used by the allocation
    /// application pass.
    pub fn inst_mut(&mut self, ix: InsnIndex) -> &mut I {
        &mut self.insts[ix as usize]
    }

    /// All instructions.
    pub fn insts(&self) -> &[I] {
        &self.insts
    }

    /// All instructions, mutably.
    pub fn insts_mut(&mut self) -> &mut [I] {
        &mut self.insts
    }

    /// Successors of a block.
    pub fn succs(&self, block: BlockIndex) -> &[BlockIndex] {
        &self.block_succs[block as usize]
    }

    /// Predecessors of a block.
    pub fn preds(&self, block: BlockIndex) -> &[BlockIndex] {
        &self.block_preds[block as usize]
    }

    /// Block parameters of a block.
    pub fn block_params(&self, block: BlockIndex) -> &[Reg] {
        &self.block_params[block as usize]
    }

    /// Insert instructions before/after positions produced by the spill
    /// materialization pass. `edits` is a list of `(index, inst)` pairs;
    /// each new instruction is placed immediately before the instruction
    /// currently at `index`. Block ranges are re-derived.
    pub fn insert_insts(&mut self, mut edits: Vec<(InsnIndex, I)>) {
        if edits.is_empty() {
            return;
        }
        edits.sort_by_key(|(ix, _)| *ix);
        let mut new_insts = Vec::with_capacity(self.insts.len() + edits.len());
        let mut shift_at: Vec<u32> = Vec::with_capacity(edits.len());
        let mut edits = edits.into_iter().peekable();
        for (ix, inst) in std::mem::take(&mut self.insts).into_iter().enumerate() {
            while let Some((eix, _)) = edits.peek() {
                if *eix as usize == ix {
                    let (eix, einst) = edits.next().unwrap();
                    shift_at.push(eix);
                    new_insts.push(einst);
                } else {
                    break;
                }
            }
            new_insts.push(inst);
        }
        for (_, einst) in edits {
            shift_at.push(self.insts.len() as u32);
            new_insts.push(einst);
        }
        // Shift block ranges to account for the inserted instructions. An
        // edit at a block boundary belongs to the block it precedes.
        for range in self.block_ranges.iter_mut() {
            let shift_start = shift_at.iter().filter(|&&e| e < range.0).count() as u32;
            let shift_end = shift_at.iter().filter(|&&e| e < range.1).count() as u32;
            range.0 += shift_start;
            range.1 += shift_end;
        }
        self.insts = new_insts;
    }
}

/// Builder for a `VCode` instance, used during lowering.
pub struct VCodeBuilder<I> {
    insts: Vec<I>,
    block_ranges: Vec<(InsnIndex, InsnIndex)>,
    block_succs: Vec<SmallVec<[BlockIndex; 2]>>,
    block_params: Vec<SmallVec<[Reg; 4]>>,
    cur_block_start: Option<InsnIndex>,
}

impl<I> VCodeBuilder<I> {
    /// Create a new builder.
    pub fn new() -> VCodeBuilder<I> {
        VCodeBuilder {
            insts: Vec::new(),
            block_ranges: Vec::new(),
            block_succs: Vec::new(),
            block_params: Vec::new(),
            cur_block_start: None,
        }
    }

    /// Begin a new basic block with the given parameter vregs. Returns the
    /// block index.
    pub fn start_block(&mut self, params: SmallVec<[Reg; 4]>) -> BlockIndex {
        debug_assert!(self.cur_block_start.is_none(), "unfinished block");
        self.cur_block_start = Some(self.insts.len() as InsnIndex);
        self.block_params.push(params);
        self.block_ranges.len() as BlockIndex
    }

    /// Append an instruction to the current block. Returns its index.
    pub fn push(&mut self, inst: I) -> InsnIndex {
        debug_assert!(self.cur_block_start.is_some(), "no open block");
        let ix = self.insts.len() as InsnIndex;
        self.insts.push(inst);
        ix
    }

    /// Finish the current block, recording its successor edges.
    pub fn finish_block(&mut self, succs: SmallVec<[BlockIndex; 2]>) {
        let start = self.cur_block_start.take().expect("no open block");
        let end = self.insts.len() as InsnIndex;
        self.block_ranges.push((start, end));
        self.block_succs.push(succs);
    }

    /// Build the final `VCode`, computing predecessor lists.
    pub fn build(self, num_vregs: u32) -> VCode<I> {
        debug_assert!(self.cur_block_start.is_none(), "unfinished block");
        let nblocks = self.block_ranges.len();
        let mut block_preds = vec![SmallVec::new(); nblocks];
        for (b, succs) in self.block_succs.iter().enumerate() {
            for &s in succs.iter() {
                block_preds[s as usize].push(b as BlockIndex);
            }
        }
        VCode {
            insts: self.insts,
            block_ranges: self.block_ranges,
            block_succs: self.block_succs,
            block_preds,
            block_params: self.block_params,
            num_vregs,
        }
    }
}

impl<I> Default for VCodeBuilder<I> {
    fn default() -> Self {
        Self::new()
    }
}
