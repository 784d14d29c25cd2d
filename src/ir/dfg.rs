//! Data flow graph tracking instructions, values, and blocks.
//!
//! The backend consumes this structure through a small set of read-only
//! queries: which instruction defines a value (`value_def`), an
//! instruction's operation and operands (`inst_data`), the type of a value
//! (`value_type`), and block parameters / successors for φ-style data flow.

use crate::ir::entities::{Block as BlockRef, Inst, StackSlot, Value};
use crate::ir::types::{self, Type};
use crate::ir::{ExternalName, FloatCC, IntCC, MemFlags, Signature, TrapCode};

/// Memory ordering for atomic loads and stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomicOrdering {
    /// No ordering constraint beyond atomicity.
    Relaxed,
    /// Load-acquire.
    Acquire,
    /// Store-release.
    Release,
    /// Sequentially consistent.
    SeqCst,
}

/// An instruction operation code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Opcode {
    // Constants.
    Iconst,
    F32const,
    F64const,
    Vconst,

    // Integer arithmetic.
    Iadd,
    Isub,
    Ineg,
    Iabs,
    Imul,
    Smulhi,
    Umulhi,
    Udiv,
    Sdiv,

    // Bitwise.
    Band,
    Bor,
    Bxor,
    BandNot,
    BorNot,
    BxorNot,
    Bnot,
    Ishl,
    Ushr,
    Sshr,
    Rotl,
    Rotr,
    Clz,
    Ctz,
    Bitrev,
    Bswap,

    // Min/max.
    Smin,
    Smax,
    Umin,
    Umax,

    // Comparisons and selection.
    Icmp,
    Fcmp,
    Select,
    Bitselect,

    // Conversions.
    Uextend,
    Sextend,
    Ireduce,
    Fpromote,
    Fdemote,
    FcvtToSint,
    FcvtToUint,
    FcvtFromSint,
    FcvtFromUint,

    // Float arithmetic.
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    Fmin,
    Fmax,
    Fabs,
    Fneg,
    Fcopysign,
    Sqrt,
    Ceil,
    Floor,
    Trunc,
    Nearest,

    // Memory.
    Load,
    Uload8,
    Sload8,
    Uload16,
    Sload16,
    Uload32,
    Sload32,
    Store,
    Istore8,
    Istore16,
    Istore32,
    AtomicLoad,
    AtomicStore,
    Fence,
    StackAddr,
    SymbolValue,

    // Vector.
    Splat,
    Shuffle,
    Extractlane,
    Insertlane,
    Snarrow,
    Unarrow,
    Uunarrow,
    SwidenLow,
    SwidenHigh,
    UwidenLow,
    UwidenHigh,
    FvpromoteLow,
    Fvdemote,
    VanyTrue,
    VallTrue,

    // Varargs.
    VaStart,
    VaArg,

    // Calls and control flow.
    Call,
    CallIndirect,
    Jump,
    Brif,
    Ret,
    Trap,
    Debugtrap,
}

impl Opcode {
    /// Is this opcode a block terminator?
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::Brif | Opcode::Ret | Opcode::Trap
        )
    }

    /// Is this a load from memory?
    pub fn is_load(self) -> bool {
        matches!(
            self,
            Opcode::Load
                | Opcode::Uload8
                | Opcode::Sload8
                | Opcode::Uload16
                | Opcode::Sload16
                | Opcode::Uload32
                | Opcode::Sload32
        )
    }
}

/// Contents of an instruction: operation code plus typed operands.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum InstructionData {
    Nullary {
        opcode: Opcode,
    },
    UnaryImm {
        opcode: Opcode,
        imm: i64,
    },
    UnaryIeee32 {
        opcode: Opcode,
        imm: u32,
    },
    UnaryIeee64 {
        opcode: Opcode,
        imm: u64,
    },
    UnaryConst {
        opcode: Opcode,
        imm: u128,
    },
    Unary {
        opcode: Opcode,
        arg: Value,
    },
    Binary {
        opcode: Opcode,
        args: [Value; 2],
    },
    BinaryImm8 {
        opcode: Opcode,
        arg: Value,
        imm: u8,
    },
    Ternary {
        opcode: Opcode,
        args: [Value; 3],
    },
    TernaryImm8 {
        opcode: Opcode,
        args: [Value; 2],
        imm: u8,
    },
    IntCompare {
        opcode: Opcode,
        args: [Value; 2],
        cond: IntCC,
    },
    FloatCompare {
        opcode: Opcode,
        args: [Value; 2],
        cond: FloatCC,
    },
    Shuffle {
        opcode: Opcode,
        args: [Value; 2],
        mask: u128,
    },
    Load {
        opcode: Opcode,
        arg: Value,
        offset: i32,
        flags: MemFlags,
    },
    Store {
        opcode: Opcode,
        args: [Value; 2],
        offset: i32,
        flags: MemFlags,
    },
    AtomicLoad {
        opcode: Opcode,
        arg: Value,
        ordering: AtomicOrdering,
    },
    AtomicStore {
        opcode: Opcode,
        args: [Value; 2],
        ordering: AtomicOrdering,
    },
    StackAddr {
        opcode: Opcode,
        stack_slot: StackSlot,
        offset: i32,
    },
    UnaryGlobalValue {
        opcode: Opcode,
        name: ExternalName,
        offset: i64,
    },
    Call {
        opcode: Opcode,
        name: ExternalName,
        sig: Signature,
        args: Vec<Value>,
    },
    CallIndirect {
        opcode: Opcode,
        sig: Signature,
        args: Vec<Value>,
    },
    Jump {
        opcode: Opcode,
        destination: BlockRef,
        args: Vec<Value>,
    },
    Brif {
        opcode: Opcode,
        arg: Value,
        then_dest: BlockRef,
        then_args: Vec<Value>,
        else_dest: BlockRef,
        else_args: Vec<Value>,
    },
    MultiAry {
        opcode: Opcode,
        args: Vec<Value>,
    },
    Trap {
        opcode: Opcode,
        code: TrapCode,
    },
}

impl InstructionData {
    /// The operation performed by this instruction.
    pub fn opcode(&self) -> Opcode {
        match self {
            InstructionData::Nullary { opcode }
            | InstructionData::UnaryImm { opcode, .. }
            | InstructionData::UnaryIeee32 { opcode, .. }
            | InstructionData::UnaryIeee64 { opcode, .. }
            | InstructionData::UnaryConst { opcode, .. }
            | InstructionData::Unary { opcode, .. }
            | InstructionData::Binary { opcode, .. }
            | InstructionData::BinaryImm8 { opcode, .. }
            | InstructionData::Ternary { opcode, .. }
            | InstructionData::TernaryImm8 { opcode, .. }
            | InstructionData::IntCompare { opcode, .. }
            | InstructionData::FloatCompare { opcode, .. }
            | InstructionData::Shuffle { opcode, .. }
            | InstructionData::Load { opcode, .. }
            | InstructionData::Store { opcode, .. }
            | InstructionData::AtomicLoad { opcode, .. }
            | InstructionData::AtomicStore { opcode, .. }
            | InstructionData::StackAddr { opcode, .. }
            | InstructionData::UnaryGlobalValue { opcode, .. }
            | InstructionData::Call { opcode, .. }
            | InstructionData::CallIndirect { opcode, .. }
            | InstructionData::Jump { opcode, .. }
            | InstructionData::Brif { opcode, .. }
            | InstructionData::MultiAry { opcode, .. }
            | InstructionData::Trap { opcode, .. } => *opcode,
        }
    }

    /// The value arguments of this instruction, in source order.
    pub fn arguments(&self) -> Vec<Value> {
        match self {
            InstructionData::Nullary { .. }
            | InstructionData::UnaryImm { .. }
            | InstructionData::UnaryIeee32 { .. }
            | InstructionData::UnaryIeee64 { .. }
            | InstructionData::UnaryConst { .. }
            | InstructionData::StackAddr { .. }
            | InstructionData::UnaryGlobalValue { .. }
            | InstructionData::Trap { .. } => vec![],
            InstructionData::Unary { arg, .. }
            | InstructionData::BinaryImm8 { arg, .. }
            | InstructionData::Load { arg, .. }
            | InstructionData::AtomicLoad { arg, .. } => vec![*arg],
            InstructionData::Binary { args, .. }
            | InstructionData::IntCompare { args, .. }
            | InstructionData::FloatCompare { args, .. }
            | InstructionData::Shuffle { args, .. }
            | InstructionData::TernaryImm8 { args, .. }
            | InstructionData::Store { args, .. }
            | InstructionData::AtomicStore { args, .. } => args.to_vec(),
            InstructionData::Ternary { args, .. } => args.to_vec(),
            InstructionData::Call { args, .. }
            | InstructionData::CallIndirect { args, .. }
            | InstructionData::MultiAry { args, .. } => args.clone(),
            InstructionData::Jump { args, .. } => args.clone(),
            InstructionData::Brif { arg, .. } => vec![*arg],
        }
    }
}

/// Where a value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueDef {
    /// Value is the n'th result of an instruction.
    Result(Inst, usize),
    /// Value is the n'th parameter of a block.
    Param(BlockRef, usize),
}

/// A basic block: ordered instructions plus block parameters standing in
/// for φ-nodes.
#[derive(Clone, Debug, Default)]
pub struct Block {
    /// Parameters of this block; values flowing in along predecessor edges.
    pub params: Vec<Value>,
    /// Instructions in this block, in order. The last one is the
    /// terminator.
    pub insts: Vec<Inst>,
}

/// A data flow graph defines all instructions and their extended basic
/// blocks. It tracks which block each instruction belongs to, and which
/// instruction or block parameter defines each value.
#[derive(Clone, Debug, Default)]
pub struct DataFlowGraph {
    insts: Vec<InstructionData>,
    results: Vec<Vec<Value>>,
    value_defs: Vec<ValueDef>,
    value_types: Vec<Type>,
    blocks: Vec<Block>,
}

impl DataFlowGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions.
    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    /// Number of values.
    pub fn num_values(&self) -> usize {
        self.value_defs.len()
    }

    /// The operation and operands of an instruction.
    pub fn inst_data(&self, inst: Inst) -> &InstructionData {
        &self.insts[inst.index()]
    }

    /// The results of an instruction.
    pub fn inst_results(&self, inst: Inst) -> &[Value] {
        &self.results[inst.index()]
    }

    /// Where a value comes from.
    pub fn value_def(&self, value: Value) -> ValueDef {
        self.value_defs[value.index()]
    }

    /// The type of a value.
    pub fn value_type(&self, value: Value) -> Type {
        self.value_types[value.index()]
    }

    /// Parameters of a block.
    pub fn block_params(&self, block: BlockRef) -> &[Value] {
        &self.blocks[block.index()].params
    }

    /// Instructions of a block, in order.
    pub fn block_insts(&self, block: BlockRef) -> &[Inst] {
        &self.blocks[block.index()].insts
    }

    /// Successor edges of a block: the destinations and edge arguments of
    /// its terminator.
    pub fn block_succs(&self, block: BlockRef) -> Vec<(BlockRef, Vec<Value>)> {
        let term = match self.blocks[block.index()].insts.last() {
            Some(inst) => *inst,
            None => return vec![],
        };
        match self.inst_data(term) {
            InstructionData::Jump {
                destination, args, ..
            } => vec![(*destination, args.clone())],
            InstructionData::Brif {
                then_dest,
                then_args,
                else_dest,
                else_args,
                ..
            } => vec![
                (*then_dest, then_args.clone()),
                (*else_dest, else_args.clone()),
            ],
            _ => vec![],
        }
    }

    /// Number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    // -- construction (used by the IR producer and by tests) --

    /// Create a new block.
    pub fn make_block(&mut self) -> BlockRef {
        let block = BlockRef::new(self.blocks.len());
        self.blocks.push(Block::default());
        block
    }

    /// Append a parameter of the given type to a block.
    pub fn append_block_param(&mut self, block: BlockRef, ty: Type) -> Value {
        let value = self.make_value(
            ValueDef::Param(block, self.blocks[block.index()].params.len()),
            ty,
        );
        self.blocks[block.index()].params.push(value);
        value
    }

    /// Append an instruction to a block, creating result values of the
    /// given types.
    pub fn append_inst(
        &mut self,
        block: BlockRef,
        data: InstructionData,
        result_types: &[Type],
    ) -> Inst {
        let inst = Inst::new(self.insts.len());
        self.insts.push(data);
        let mut results = Vec::with_capacity(result_types.len());
        for (i, &ty) in result_types.iter().enumerate() {
            results.push(self.make_value(ValueDef::Result(inst, i), ty));
        }
        self.results.push(results);
        self.blocks[block.index()].insts.push(inst);
        inst
    }

    /// The single result of an instruction; panics if it does not have
    /// exactly one.
    pub fn first_result(&self, inst: Inst) -> Value {
        self.results[inst.index()][0]
    }

    fn make_value(&mut self, def: ValueDef, ty: Type) -> Value {
        let value = Value::new(self.value_defs.len());
        self.value_defs.push(def);
        self.value_types.push(ty);
        value
    }
}

/// An Oxbow IR function: signature, stack slots, data flow graph, and block
/// layout order.
#[derive(Clone, Debug)]
pub struct Function {
    /// Name of this function.
    pub name: ExternalName,
    /// Signature of this function.
    pub signature: Signature,
    /// Sizes of the explicit stack slots, in declaration order.
    pub stack_slots: Vec<u32>,
    /// Data flow graph.
    pub dfg: DataFlowGraph,
    /// Block layout: the order blocks will be emitted in.
    pub layout: Vec<BlockRef>,
}

impl Function {
    /// Create a function with the given name and signature.
    pub fn with_name_signature(name: ExternalName, signature: Signature) -> Self {
        Self {
            name,
            signature,
            stack_slots: Vec::new(),
            dfg: DataFlowGraph::new(),
            layout: Vec::new(),
        }
    }

    /// Create a stack slot of the given size in bytes.
    pub fn create_stack_slot(&mut self, size: u32) -> StackSlot {
        let slot = StackSlot::new(self.stack_slots.len());
        self.stack_slots.push(size);
        slot
    }

    /// Total size of the explicit stack slots, 8-byte aligned each.
    pub fn stack_slots_size(&self) -> u32 {
        self.stack_slots.iter().map(|s| (s + 7) & !7).sum()
    }

    /// The entry block, if any.
    pub fn entry_block(&self) -> Option<BlockRef> {
        self.layout.first().copied()
    }

    /// The IR type corresponding to a machine pointer.
    pub fn pointer_type(&self) -> Type {
        types::I64
    }
}
