//! Implementation of a standard AArch64 ABI.
//!
//! This covers the AAPCS64 argument classification rules (including
//! homogeneous floating-point and vector aggregates and indirect large
//! structs), the frame layout with its 16-byte alignment invariant,
//! callee-save pairing with `STP`/`LDP`, the variadic register save area,
//! and the `va_list` accessors.
//!
//! The frame, high addresses first, immediately after the prologue of a
//! small (≤ 504-byte) frame:
//!
//! ```plain
//! [incoming stack args]           <- caller-managed, at SP + frame_size
//! [locals + spill slots]
//! [variadic register save area]   (192 bytes, when present)
//! [callee-save pairs]             (16 bytes per pair)
//! [saved FP (x29), saved LR (x30)]  <- SP after prologue; FP points here
//! ```
//!
//! Large frames allocate the FP/LR pair first (so it sits at the top of
//! the frame) and then extend SP downward in chunks of at most 4095
//! bytes; callee-saves then live at the bottom, reachable with small
//! offsets.

use crate::ir::{types, ParamType, Signature, StructField, Type};
use crate::isa::aarch64::inst::*;
use crate::isa::{CallConv, Platform};
use crate::machinst::{align_to, RealReg, Reg, RegClass, UnwindInfo, Writable};
use crate::result::{CodegenError, CodegenResult};
use log::{debug, trace};
use smallvec::{smallvec, SmallVec};

/// A location for (part of) an argument or return value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ABIArgSlot {
    /// In a real register.
    Reg {
        /// Register that holds this slot.
        reg: RealReg,
        /// Value type of this slot.
        ty: Type,
    },
    /// Arguments only: on the stack, at the given byte offset into the
    /// argument area (relative to SP at the call instruction).
    Stack {
        /// Offset of this slot in the argument area.
        offset: i64,
        /// Value type of this slot.
        ty: Type,
    },
}

/// An ABI-level argument: an ordered list of slots, or an indirect
/// pointer slot for large aggregates.
#[derive(Clone, Debug)]
pub enum ABIArg {
    /// The argument is passed directly in the listed slots.
    Slots {
        /// The slots, in order.
        slots: SmallVec<[ABIArgSlot; 4]>,
    },
    /// A large struct passed by pointer: the caller copies it into a
    /// temporary and passes the address. The pointer is always an
    /// *integer* slot, whatever the pointee's class.
    Indirect {
        /// The slot carrying the pointer.
        pointer: ABIArgSlot,
    },
}

impl ABIArg {
    /// A single-slot register argument.
    pub fn reg(reg: RealReg, ty: Type) -> ABIArg {
        ABIArg::Slots {
            slots: smallvec![ABIArgSlot::Reg { reg, ty }],
        }
    }

    /// A single-slot stack argument.
    pub fn stack(offset: i64, ty: Type) -> ABIArg {
        ABIArg::Slots {
            slots: smallvec![ABIArgSlot::Stack { offset, ty }],
        }
    }

    /// The slots of this argument.
    pub fn slots(&self) -> &[ABIArgSlot] {
        match self {
            ABIArg::Slots { slots } => slots,
            ABIArg::Indirect { pointer } => std::slice::from_ref(pointer),
        }
    }
}

/// Classification of a struct parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructClass {
    /// Homogeneous floating-point aggregate: 1..4 members, all f32 or all
    /// f64.
    Hfa {
        /// The member type.
        elem: Type,
        /// Number of members.
        count: u8,
    },
    /// Homogeneous vector aggregate: 1..4 same-size vector members.
    Hva {
        /// The member type.
        elem: Type,
        /// Number of members.
        count: u8,
    },
    /// A small (≤ 16 byte) non-homogeneous aggregate, passed in up to
    /// two consecutive integer registers.
    General,
    /// A large (> 16 byte) aggregate, passed indirectly by pointer.
    Indirect,
}

/// Classify a struct per AAPCS64.
pub fn classify_struct(fields: &[StructField]) -> StructClass {
    let size: u32 = fields
        .last()
        .map(|f| f.offset + f.ty.bytes())
        .unwrap_or(0);

    // HFA: 1..4 members, all the same scalar float type.
    if !fields.is_empty() && fields.len() <= 4 {
        let first = fields[0].ty;
        if first.is_float() && fields.iter().all(|f| f.ty == first) {
            return StructClass::Hfa {
                elem: first,
                count: fields.len() as u8,
            };
        }
        if first.is_vector() && fields.iter().all(|f| f.ty.is_vector() && f.ty.bits() == first.bits())
        {
            return StructClass::Hva {
                elem: first,
                count: fields.len() as u8,
            };
        }
    }

    if size > 16 {
        StructClass::Indirect
    } else {
        StructClass::General
    }
}

/// Are we computing argument locations, or return-value locations?
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgsOrRets {
    /// Arguments.
    Args,
    /// Return values.
    Rets,
}

/// This is the limit for the size of argument and return-value areas on
/// the stack: 128 MB, a reasonable bound that avoids 32-bit overflow.
static STACK_ARG_RET_SIZE_LIMIT: u64 = 128 * 1024 * 1024;

fn reg_limits(call_conv: CallConv) -> (u8, u8) {
    match call_conv {
        // x0-x7 and v0-v7.
        CallConv::Aapcs64 | CallConv::PreserveAll | CallConv::Cold => (8, 8),
        // The fast convention exposes x0-x17 and v0-v15.
        CallConv::Fast => (18, 16),
    }
}

/// The register used to pass the pointer to an indirect return slot.
pub fn indirect_ret_reg() -> RealReg {
    xreg(8).to_real_reg().unwrap()
}

/// Compute the register/stack location of each argument (or return
/// value). Returns the locations, the stack space used by stack-passed
/// slots, and the implicit indirect-return pointer register if any return
/// value required one.
pub fn compute_arg_locs(
    sig: &Signature,
    args_or_rets: ArgsOrRets,
) -> CodegenResult<(Vec<ABIArg>, u32, Option<RealReg>)> {
    let (max_xreg, max_vreg) = reg_limits(sig.call_conv);
    let mut next_xreg: u8 = 0;
    let mut next_vreg: u8 = 0;
    let mut next_stack: u64 = 0;
    let mut ret = vec![];
    let mut ret_area_ptr = None;

    let params = match args_or_rets {
        ArgsOrRets::Args => &sig.params,
        ArgsOrRets::Rets => &sig.returns,
    };

    for param in params {
        match &param.value_type {
            &ParamType::Value(ty) if ty == types::I128 => {
                // Two consecutive integer registers, the first
                // even-numbered; or the stack, 16-byte aligned.
                if next_xreg % 2 != 0 {
                    next_xreg += 1;
                }
                if next_xreg + 2 <= max_xreg {
                    let lo = xreg(next_xreg).to_real_reg().unwrap();
                    let hi = xreg(next_xreg + 1).to_real_reg().unwrap();
                    next_xreg += 2;
                    ret.push(ABIArg::Slots {
                        slots: smallvec![
                            ABIArgSlot::Reg {
                                reg: lo,
                                ty: types::I64
                            },
                            ABIArgSlot::Reg {
                                reg: hi,
                                ty: types::I64
                            },
                        ],
                    });
                } else {
                    next_xreg = max_xreg;
                    next_stack = align_up64(next_stack, 16);
                    ret.push(ABIArg::Slots {
                        slots: smallvec![
                            ABIArgSlot::Stack {
                                offset: next_stack as i64,
                                ty: types::I64
                            },
                            ABIArgSlot::Stack {
                                offset: next_stack as i64 + 8,
                                ty: types::I64
                            },
                        ],
                    });
                    next_stack += 16;
                }
            }
            &ParamType::Value(ty) if ty.is_float() => {
                if next_vreg < max_vreg {
                    ret.push(ABIArg::reg(vreg(next_vreg).to_real_reg().unwrap(), ty));
                    next_vreg += 1;
                } else {
                    next_stack = align_up64(next_stack, 8);
                    ret.push(ABIArg::stack(next_stack as i64, ty));
                    next_stack += 8;
                }
            }
            &ParamType::Value(ty) if ty.is_vector() => {
                if next_vreg < max_vreg {
                    ret.push(ABIArg::reg(vreg(next_vreg).to_real_reg().unwrap(), ty));
                    next_vreg += 1;
                } else {
                    let align = u64::from(ty.bytes()).max(8);
                    next_stack = align_up64(next_stack, align);
                    ret.push(ABIArg::stack(next_stack as i64, ty));
                    next_stack += u64::from(ty.bytes()).max(8);
                }
            }
            &ParamType::Value(ty) => {
                // Scalar integer or pointer.
                if next_xreg < max_xreg {
                    ret.push(ABIArg::reg(xreg(next_xreg).to_real_reg().unwrap(), ty));
                    next_xreg += 1;
                } else {
                    // Stack slots take 8 bytes each, 8-byte aligned; a
                    // narrower value occupies the low bytes, padded to 8.
                    next_stack = align_up64(next_stack, 8);
                    ret.push(ABIArg::stack(next_stack as i64, ty));
                    next_stack += 8;
                }
            }
            ParamType::Struct(fields) => match classify_struct(fields) {
                StructClass::Hfa { elem, count } | StructClass::Hva { elem, count } => {
                    if next_vreg + count <= max_vreg {
                        let mut slots = SmallVec::new();
                        for i in 0..count {
                            slots.push(ABIArgSlot::Reg {
                                reg: vreg(next_vreg + i).to_real_reg().unwrap(),
                                ty: elem,
                            });
                        }
                        next_vreg += count;
                        ret.push(ABIArg::Slots { slots });
                    } else {
                        // Once an HFA/HVA spills, the remaining FP
                        // registers are not used for any later argument.
                        next_vreg = max_vreg;
                        let elem_size = u64::from(elem.bytes()).max(8);
                        let align = elem_size.max(8);
                        next_stack = align_up64(next_stack, align);
                        let mut slots = SmallVec::new();
                        for i in 0..count {
                            slots.push(ABIArgSlot::Stack {
                                offset: (next_stack + u64::from(i) * elem_size) as i64,
                                ty: elem,
                            });
                        }
                        next_stack += u64::from(count) * elem_size;
                        next_stack = align_up64(next_stack, 8);
                        ret.push(ABIArg::Slots { slots });
                    }
                }
                StructClass::Indirect => {
                    // One integer slot carrying a pointer.
                    if args_or_rets == ArgsOrRets::Rets {
                        // Indirect returns reserve x8 as an implicit
                        // pointer-to-result-slot input.
                        ret_area_ptr = Some(indirect_ret_reg());
                        ret.push(ABIArg::Indirect {
                            pointer: ABIArgSlot::Reg {
                                reg: indirect_ret_reg(),
                                ty: types::I64,
                            },
                        });
                    } else if next_xreg < max_xreg {
                        let reg = xreg(next_xreg).to_real_reg().unwrap();
                        next_xreg += 1;
                        ret.push(ABIArg::Indirect {
                            pointer: ABIArgSlot::Reg {
                                reg,
                                ty: types::I64,
                            },
                        });
                    } else {
                        next_stack = align_up64(next_stack, 8);
                        ret.push(ABIArg::Indirect {
                            pointer: ABIArgSlot::Stack {
                                offset: next_stack as i64,
                                ty: types::I64,
                            },
                        });
                        next_stack += 8;
                    }
                }
                StructClass::General => {
                    let size: u64 = fields
                        .last()
                        .map(|f| u64::from(f.offset + f.ty.bytes()))
                        .unwrap_or(0);
                    let nregs = if size <= 8 { 1u8 } else { 2u8 };
                    // 16-byte structs take an even-aligned register pair.
                    if nregs == 2 && size > 8 && next_xreg % 2 != 0 && size == 16 {
                        next_xreg += 1;
                    }
                    if next_xreg + nregs <= max_xreg {
                        let mut slots = SmallVec::new();
                        for i in 0..nregs {
                            slots.push(ABIArgSlot::Reg {
                                reg: xreg(next_xreg + i).to_real_reg().unwrap(),
                                ty: types::I64,
                            });
                        }
                        next_xreg += nregs;
                        ret.push(ABIArg::Slots { slots });
                    } else {
                        // Never split between registers and stack.
                        next_xreg = max_xreg;
                        next_stack = align_up64(next_stack, 8);
                        let mut slots = SmallVec::new();
                        for i in 0..nregs {
                            slots.push(ABIArgSlot::Stack {
                                offset: (next_stack + u64::from(i) * 8) as i64,
                                ty: types::I64,
                            });
                        }
                        next_stack += u64::from(nregs) * 8;
                        ret.push(ABIArg::Slots { slots });
                    }
                }
            },
        }
    }

    next_stack = align_up64(next_stack, 16);

    if next_stack > STACK_ARG_RET_SIZE_LIMIT {
        return Err(CodegenError::ImplLimitExceeded);
    }

    Ok((ret, next_stack as u32, ret_area_ptr))
}

fn align_up64(x: u64, align: u64) -> u64 {
    (x + align - 1) & !(align - 1)
}

/// Is the given register a callee-save under the given convention and
/// platform?
pub fn is_reg_saved_in_prologue(call_conv: CallConv, platform: Platform, r: RealReg) -> bool {
    let preserve_all = call_conv.preserves_all_regs();
    match r.class() {
        RegClass::Int => {
            let enc = r.hw_enc();
            if (19..=28).contains(&enc) {
                true
            } else if preserve_all && (8..=18).contains(&enc) {
                // The platform register is never touched where reserved.
                !(enc == 18 && platform.reserves_x18())
            } else {
                false
            }
        }
        RegClass::Float | RegClass::Vector => {
            let enc = r.hw_enc();
            (8..=15).contains(&enc) || (preserve_all && (16..=31).contains(&enc))
        }
    }
}

/// Is the given register clobbered by a call under the given convention?
pub fn is_reg_clobbered_by_call(call_conv: CallConv, platform: Platform, r: RealReg) -> bool {
    !is_reg_saved_in_prologue(call_conv, platform, r)
}

/// Registers clobbered by a call with the given callee convention: every
/// non-callee-saved allocatable register.
pub fn get_regs_clobbered_by_call(
    call_conv: CallConv,
    platform: Platform,
) -> Vec<Writable<Reg>> {
    let mut caller_saved = Vec::new();
    for i in 0..29 {
        // x16/x17 are ours (spill temporaries); x18 is the platform's.
        if i == 16 || i == 17 || i == 18 {
            continue;
        }
        let x = writable_xreg(i);
        if is_reg_clobbered_by_call(call_conv, platform, x.to_reg().to_real_reg().unwrap()) {
            caller_saved.push(x);
        }
    }
    for i in 0..32 {
        let v = writable_vreg(i);
        if is_reg_clobbered_by_call(call_conv, platform, v.to_reg().to_real_reg().unwrap()) {
            caller_saved.push(v);
        }
    }
    caller_saved
}

/// Byte size of the variadic register save area: 64 bytes of X0..X7 plus
/// 128 bytes of V0..V7.
pub const VARARGS_SAVE_AREA_SIZE: u32 = 192;

/// Offsets of the `va_list` fields within its 32-byte record.
pub const VA_LIST_STACK: i64 = 0;
/// `__gr_top`: one past the end of the general save area.
pub const VA_LIST_GR_TOP: i64 = 8;
/// `__vr_top`: one past the end of the FP/SIMD save area.
pub const VA_LIST_VR_TOP: i64 = 16;
/// `__gr_offs`: negative offset of the next general argument.
pub const VA_LIST_GR_OFFS: i64 = 24;
/// `__vr_offs`: negative offset of the next FP/SIMD argument.
pub const VA_LIST_VR_OFFS: i64 = 28;

/// The largest frame a single pre-indexed `STP X29, X30, [SP, #-N]!` can
/// allocate.
const MAX_SMALL_FRAME: u32 = 504;

/// ABI object for a function body: the frame descriptor and
/// prologue/epilogue generator for the function being compiled.
pub struct AArch64ABICallee {
    sig: Signature,
    platform: Platform,
    /// Argument locations, computed at construction.
    arg_locs: Vec<ABIArg>,
    /// Return-value locations.
    ret_locs: Vec<ABIArg>,
    /// Stack space consumed by incoming stack arguments.
    stack_arg_space: u32,
    /// Indirect-return pointer register, if any.
    ret_area_ptr: Option<RealReg>,
    /// Clobbered callee-saves, in insertion order, deduplicated.
    clobbered: Vec<Writable<RealReg>>,
    /// Size of explicit stack slots (locals), in bytes.
    locals_size: u32,
    /// Size of register-allocator spill slots, in bytes.
    spillslots_size: u32,
    /// Number of integer and FP registers used by named arguments; the
    /// varargs save area only matters past these.
    named_gp_used: u8,
    named_fp_used: u8,
    /// Total frame size; `Some` once frozen. The prologue generator
    /// asserts this is set: frame layout must be final before any
    /// prologue instruction is produced.
    frame_size: Option<u32>,
}

impl AArch64ABICallee {
    /// Create an ABI object for the given signature and platform.
    pub fn new(sig: Signature, platform: Platform) -> CodegenResult<Self> {
        trace!("AArch64ABICallee::new: sig {}", sig);
        let (arg_locs, stack_arg_space, _) = compute_arg_locs(&sig, ArgsOrRets::Args)?;
        let (ret_locs, ret_stack, ret_area_ptr) = compute_arg_locs(&sig, ArgsOrRets::Rets)?;
        if ret_stack != 0 {
            return Err(CodegenError::Unsupported(
                "stack-passed return values".to_string(),
            ));
        }
        let mut named_gp_used = 0;
        let mut named_fp_used = 0;
        for arg in &arg_locs {
            for slot in arg.slots() {
                if let ABIArgSlot::Reg { reg, .. } = slot {
                    match reg.class() {
                        RegClass::Int => named_gp_used = named_gp_used.max(reg.hw_enc() + 1),
                        _ => named_fp_used = named_fp_used.max(reg.hw_enc() + 1),
                    }
                }
            }
        }
        Ok(Self {
            sig,
            platform,
            arg_locs,
            ret_locs,
            stack_arg_space,
            ret_area_ptr,
            clobbered: Vec::new(),
            locals_size: 0,
            spillslots_size: 0,
            named_gp_used,
            named_fp_used,
            frame_size: None,
        })
    }

    /// The signature.
    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    /// The platform.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Argument locations.
    pub fn arg_locs(&self) -> &[ABIArg] {
        &self.arg_locs
    }

    /// Return-value locations.
    pub fn ret_locs(&self) -> &[ABIArg] {
        &self.ret_locs
    }

    /// Indirect-return pointer register, if the signature requires one.
    pub fn ret_area_ptr(&self) -> Option<RealReg> {
        self.ret_area_ptr
    }

    /// Record that the function body clobbers a callee-save register.
    /// Insertion order is preserved; duplicates are ignored. Presenting a
    /// register outside the legal callee-save set is a compiler bug.
    pub fn add_clobber(&mut self, reg: Writable<RealReg>) {
        debug_assert!(
            self.frame_size.is_none(),
            "clobber added after frame freeze"
        );
        assert!(
            is_reg_saved_in_prologue(self.sig.call_conv, self.platform, reg.to_reg()),
            "invalid callee-save register: {:?}",
            reg.to_reg()
        );
        if !self.clobbered.iter().any(|r| r.to_reg() == reg.to_reg()) {
            self.clobbered.push(reg);
        }
    }

    /// The clobbered callee-saves recorded so far.
    pub fn clobbered(&self) -> &[Writable<RealReg>] {
        &self.clobbered
    }

    /// Set the size of the explicit stack slots (locals).
    pub fn set_locals_size(&mut self, size: u32) {
        debug_assert!(self.frame_size.is_none());
        self.locals_size = size;
    }

    /// Set the number of 8-byte spill slots the register allocator used.
    pub fn set_spillslots(&mut self, slots: u32) {
        debug_assert!(self.frame_size.is_none());
        self.spillslots_size = slots * 8;
    }

    /// Is this a variadic function?
    pub fn is_variadic(&self) -> bool {
        self.sig.variadic
    }

    fn num_callee_saves(&self) -> u32 {
        self.clobbered.len() as u32
    }

    fn save_area_size(&self) -> u32 {
        // 16 bytes per pair; an odd trailing register still reserves 16
        // bytes for alignment.
        16 * ((self.num_callee_saves() + 1) / 2)
    }

    fn varargs_area_size(&self) -> u32 {
        if self.is_variadic() {
            VARARGS_SAVE_AREA_SIZE
        } else {
            0
        }
    }

    /// Finalize the frame layout. After this, no clobbers or size changes
    /// are accepted, and the prologue may be generated.
    pub fn compute_frame_layout(&mut self) -> u32 {
        let size = align_to(
            16 + self.save_area_size()
                + self.varargs_area_size()
                + self.spillslots_size
                + self.locals_size,
            16,
        );
        debug!(
            "frame layout: {} callee-saves, varargs={}, locals={}, spills={} -> frame_size {}",
            self.num_callee_saves(),
            self.is_variadic(),
            self.locals_size,
            self.spillslots_size,
            size
        );
        self.frame_size = Some(size);
        size
    }

    /// The frozen frame size. Panics if the layout has not been
    /// finalized.
    pub fn frame_size(&self) -> u32 {
        self.frame_size
            .expect("frame size queried before compute_frame_layout")
    }

    fn is_small_frame(&self) -> bool {
        self.frame_size() <= MAX_SMALL_FRAME
    }

    /// Offset (from post-prologue SP) of the callee-save area.
    fn saves_offset(&self) -> u32 {
        if self.is_small_frame() {
            16
        } else {
            0
        }
    }

    /// Offset (from post-prologue SP) of the variadic register save
    /// area.
    pub fn varargs_offset(&self) -> u32 {
        self.saves_offset() + self.save_area_size()
    }

    /// Offset (from post-prologue SP) of the spill-slot area.
    pub fn spillslots_offset(&self) -> u32 {
        self.varargs_offset() + self.varargs_area_size()
    }

    /// Offset (from post-prologue SP) of the explicit stack slots.
    pub fn locals_offset(&self) -> u32 {
        self.spillslots_offset() + self.spillslots_size
    }

    /// The address of a given spill slot, as an SP-relative amode.
    pub fn spillslot_amode(&self, slot: u32, ty: Type) -> AMode {
        let off = i64::from(self.spillslots_offset()) + i64::from(slot) * 8;
        AMode::SPOffset(off, ty)
    }

    /// The address of a byte within the explicit stack-slot area.
    pub fn stackslot_amode(&self, offset: u32, ty: Type) -> AMode {
        AMode::SPOffset(i64::from(self.locals_offset()) + i64::from(offset), ty)
    }

    /// The SP-relative offset of an incoming stack argument.
    pub fn incoming_arg_offset(&self, offset: i64) -> i64 {
        i64::from(self.frame_size()) + offset
    }

    /// Generate the prologue.
    pub fn gen_prologue(&self) -> SmallVec<[Inst; 16]> {
        let frame_size = self.frame_size();
        let mut insts: SmallVec<[Inst; 16]> = smallvec![];

        if self.is_small_frame() {
            // stp x29, x30, [sp, #-frame_size]!  (atomic allocate+save)
            insts.push(Inst::StoreP64 {
                rt: fp_reg(),
                rt2: link_reg(),
                mem: PairAMode::PreIndexed(
                    writable_stack_reg(),
                    SImm7Scaled::maybe_from_i64(-i64::from(frame_size), 8).unwrap(),
                ),
                flags: crate::ir::MemFlags::trusted(),
            });
            // mov x29, sp. This uses the ADDI form of `MOV` because the
            // usual encoding (`ORR`) does not work with SP.
            insts.push(Inst::AluRRImm12 {
                alu_op: ALUOp::Add,
                size: OperandSize::Size64,
                rd: writable_fp_reg(),
                rn: stack_reg(),
                imm12: Imm12::zero(),
            });
        } else {
            // sub sp, sp, #16 ; stp x29, x30, [sp] ; mov x29, sp
            insts.push(Inst::AluRRImm12 {
                alu_op: ALUOp::Sub,
                size: OperandSize::Size64,
                rd: writable_stack_reg(),
                rn: stack_reg(),
                imm12: Imm12::maybe_from_u64(16).unwrap(),
            });
            insts.push(Inst::StoreP64 {
                rt: fp_reg(),
                rt2: link_reg(),
                mem: PairAMode::SignedOffset(stack_reg(), SImm7Scaled::zero(8)),
                flags: crate::ir::MemFlags::trusted(),
            });
            insts.push(Inst::AluRRImm12 {
                alu_op: ALUOp::Add,
                size: OperandSize::Size64,
                rd: writable_fp_reg(),
                rn: stack_reg(),
                imm12: Imm12::zero(),
            });
            // Allocate the remainder in chunks of at most 4095 bytes.
            let mut remaining = frame_size - 16;
            while remaining > 0 {
                let chunk = remaining.min(4095);
                insts.push(Inst::AluRRImm12 {
                    alu_op: ALUOp::Sub,
                    size: OperandSize::Size64,
                    rd: writable_stack_reg(),
                    rn: stack_reg(),
                    imm12: Imm12::maybe_from_u64(u64::from(chunk)).unwrap(),
                });
                remaining -= chunk;
            }
        }

        insts.extend(self.gen_clobber_saves());

        if self.is_variadic() {
            insts.extend(self.gen_varargs_save());
        }

        insts
    }

    /// Generate the epilogue, including the final `ret`.
    pub fn gen_epilogue(&self) -> SmallVec<[Inst; 16]> {
        let frame_size = self.frame_size();
        let mut insts: SmallVec<[Inst; 16]> = smallvec![];

        insts.extend(self.gen_clobber_restores());

        if self.is_small_frame() {
            // ldp x29, x30, [sp], #frame_size
            insts.push(Inst::LoadP64 {
                rt: writable_fp_reg(),
                rt2: writable_link_reg(),
                mem: PairAMode::PostIndexed(
                    writable_stack_reg(),
                    SImm7Scaled::maybe_from_i64(i64::from(frame_size), 8).unwrap(),
                ),
                flags: crate::ir::MemFlags::trusted(),
            });
        } else {
            let mut remaining = frame_size - 16;
            while remaining > 0 {
                let chunk = remaining.min(4095);
                insts.push(Inst::AluRRImm12 {
                    alu_op: ALUOp::Add,
                    size: OperandSize::Size64,
                    rd: writable_stack_reg(),
                    rn: stack_reg(),
                    imm12: Imm12::maybe_from_u64(u64::from(chunk)).unwrap(),
                });
                remaining -= chunk;
            }
            insts.push(Inst::LoadP64 {
                rt: writable_fp_reg(),
                rt2: writable_link_reg(),
                mem: PairAMode::PostIndexed(
                    writable_stack_reg(),
                    SImm7Scaled::maybe_from_i64(16, 8).unwrap(),
                ),
                flags: crate::ir::MemFlags::trusted(),
            });
        }

        insts.push(Inst::Ret);
        insts
    }

    fn gen_clobber_saves(&self) -> SmallVec<[Inst; 16]> {
        let mut insts: SmallVec<[Inst; 16]> = smallvec![];
        let base = i64::from(self.saves_offset());
        let mut offset = base;
        let mut iter = self.clobbered.chunks_exact(2);
        for pair in iter.by_ref() {
            let (r1, r2) = (pair[0].to_reg(), pair[1].to_reg());
            insts.push(save_pair_inst(r1, r2, offset));
            offset += 16;
        }
        if let [last] = iter.remainder() {
            // Odd trailing register: a single store, still reserving 16
            // bytes for alignment.
            insts.push(save_single_inst(last.to_reg(), offset));
        }
        insts
    }

    fn gen_clobber_restores(&self) -> SmallVec<[Inst; 16]> {
        let mut insts: SmallVec<[Inst; 16]> = smallvec![];
        let base = i64::from(self.saves_offset());
        let mut offset = base;
        let mut iter = self.clobbered.chunks_exact(2);
        for pair in iter.by_ref() {
            let (r1, r2) = (pair[0].to_reg(), pair[1].to_reg());
            insts.push(restore_pair_inst(r1, r2, offset));
            offset += 16;
        }
        if let [last] = iter.remainder() {
            insts.push(restore_single_inst(last.to_reg(), offset));
        }
        insts
    }

    /// Generate the stores filling the variadic register save area: X0..X7
    /// as four `STP` pairs, then V0..V7 as four 128-bit `STP` pairs.
    fn gen_varargs_save(&self) -> SmallVec<[Inst; 16]> {
        let mut insts: SmallVec<[Inst; 16]> = smallvec![];
        let gr_off = i64::from(self.varargs_offset());
        for i in 0..4 {
            insts.push(Inst::StoreP64 {
                rt: xreg(2 * i),
                rt2: xreg(2 * i + 1),
                mem: PairAMode::SignedOffset(
                    stack_reg(),
                    SImm7Scaled::maybe_from_i64(gr_off + i64::from(i) * 16, 8).unwrap(),
                ),
                flags: crate::ir::MemFlags::trusted(),
            });
        }
        let vr_off = gr_off + 64;
        for i in 0..4 {
            insts.push(Inst::FpuStoreP128 {
                rt: vreg(2 * i),
                rt2: vreg(2 * i + 1),
                mem: PairAMode::SignedOffset(
                    stack_reg(),
                    SImm7Scaled::maybe_from_i64(vr_off + i64::from(i) * 32, 16).unwrap(),
                ),
                flags: crate::ir::MemFlags::trusted(),
            });
        }
        insts
    }

    /// Generate the inline code for `va_start`: initialize the 32-byte
    /// `va_list` record at the address in `ap`. Uses the two reserved
    /// scratch registers.
    pub fn gen_va_start(&self, ap: Reg) -> SmallVec<[Inst; 16]> {
        assert!(self.is_variadic(), "va_start in a non-variadic function");
        let mut insts: SmallVec<[Inst; 16]> = smallvec![];
        let tmp = writable_spilltmp_reg();
        let flags = crate::ir::MemFlags::trusted();

        // __stack = SP + <offset of first anonymous stack arg>.
        let stack_off = self.incoming_arg_offset(i64::from(self.stack_arg_space));
        insts.extend(add_sp_offset(tmp, stack_off));
        insts.push(Inst::Store64 {
            rd: tmp.to_reg(),
            mem: AMode::RegOffset(ap, VA_LIST_STACK, types::I64),
            flags,
        });

        // __gr_top = SP + gr_save_offset + 64.
        let gr_top = i64::from(self.varargs_offset()) + 64;
        insts.extend(add_sp_offset(tmp, gr_top));
        insts.push(Inst::Store64 {
            rd: tmp.to_reg(),
            mem: AMode::RegOffset(ap, VA_LIST_GR_TOP, types::I64),
            flags,
        });

        // __vr_top = SP + vr_save_offset + 128.
        let vr_top = i64::from(self.varargs_offset()) + 64 + 128;
        insts.extend(add_sp_offset(tmp, vr_top));
        insts.push(Inst::Store64 {
            rd: tmp.to_reg(),
            mem: AMode::RegOffset(ap, VA_LIST_VR_TOP, types::I64),
            flags,
        });

        // __gr_offs = -8 * (8 - gp_used).
        let gr_offs = -8 * (8 - i64::from(self.named_gp_used.min(8)));
        insts.extend(Inst::load_constant(tmp, gr_offs as u64));
        insts.push(Inst::Store32 {
            rd: tmp.to_reg(),
            mem: AMode::RegOffset(ap, VA_LIST_GR_OFFS, types::I32),
            flags,
        });

        // __vr_offs = -16 * (8 - fp_used).
        let vr_offs = -16 * (8 - i64::from(self.named_fp_used.min(8)));
        insts.extend(Inst::load_constant(tmp, vr_offs as u64));
        insts.push(Inst::Store32 {
            rd: tmp.to_reg(),
            mem: AMode::RegOffset(ap, VA_LIST_VR_OFFS, types::I32),
            flags,
        });

        insts
    }

    /// Build the unwind descriptor for this function.
    pub fn unwind_info(&self) -> UnwindInfo {
        let frame_size = self.frame_size();
        // FP points at the saved FP/LR pair in small frames; in large
        // frames the pair sits at the top and FP points there too.
        let mut callee_save_offsets = Vec::new();
        let base = self.saves_offset() as i32;
        let fp_to_sp = if self.is_small_frame() {
            0
        } else {
            frame_size as i32 - 16
        };
        for (i, reg) in self.clobbered.iter().enumerate() {
            let sp_off = base + 16 * (i as i32 / 2) + 8 * (i as i32 % 2);
            callee_save_offsets.push((reg.to_reg(), sp_off - fp_to_sp));
        }
        UnwindInfo {
            frame_size,
            fp_offset: 0,
            lr_offset: 8,
            callee_save_offsets,
            has_varargs_save_area: self.is_variadic(),
        }
    }
}

fn add_sp_offset(rd: Writable<Reg>, off: i64) -> SmallVec<[Inst; 4]> {
    // SP is legal as Rn of ADD-immediate; for offsets beyond imm12 range
    // materialize into the second scratch and use the extended-register
    // ADD (SP allowed only in the Rn position).
    if let Some(imm12) = Imm12::maybe_from_u64(off as u64) {
        smallvec![Inst::AluRRImm12 {
            alu_op: ALUOp::Add,
            size: OperandSize::Size64,
            rd,
            rn: stack_reg(),
            imm12,
        }]
    } else {
        let mut insts: SmallVec<[Inst; 4]> = Inst::load_constant(writable_tmp2_reg(), off as u64);
        insts.push(Inst::AluRRRExtend {
            alu_op: ALUOp::Add,
            size: OperandSize::Size64,
            rd,
            rn: stack_reg(),
            rm: tmp2_reg(),
            extendop: ExtendOp::UXTX,
        });
        insts
    }
}

fn save_pair_inst(r1: RealReg, r2: RealReg, offset: i64) -> Inst {
    let flags = crate::ir::MemFlags::trusted();
    match r1.class() {
        RegClass::Int => Inst::StoreP64 {
            rt: r1.to_reg(),
            rt2: r2.to_reg(),
            mem: PairAMode::SignedOffset(stack_reg(), SImm7Scaled::maybe_from_i64(offset, 8).unwrap()),
            flags,
        },
        _ => Inst::FpuStoreP64 {
            rt: r1.to_reg(),
            rt2: r2.to_reg(),
            mem: PairAMode::SignedOffset(stack_reg(), SImm7Scaled::maybe_from_i64(offset, 8).unwrap()),
            flags,
        },
    }
}

fn single_save_amode(offset: i64) -> AMode {
    // Red-zone (below-SP) slots need the signed unscaled form.
    if offset < 0 {
        AMode::Unscaled(stack_reg(), SImm9::maybe_from_i64(offset).unwrap())
    } else {
        AMode::UnsignedOffset(stack_reg(), UImm12Scaled::maybe_from_i64(offset, 8).unwrap())
    }
}

fn save_single_inst(r: RealReg, offset: i64) -> Inst {
    let flags = crate::ir::MemFlags::trusted();
    match r.class() {
        RegClass::Int => Inst::Store64 {
            rd: r.to_reg(),
            mem: single_save_amode(offset),
            flags,
        },
        _ => Inst::FpuStore64 {
            rd: r.to_reg(),
            mem: single_save_amode(offset),
            flags,
        },
    }
}

fn restore_pair_inst(r1: RealReg, r2: RealReg, offset: i64) -> Inst {
    let flags = crate::ir::MemFlags::trusted();
    match r1.class() {
        RegClass::Int => Inst::LoadP64 {
            rt: Writable::from_reg(r1.to_reg()),
            rt2: Writable::from_reg(r2.to_reg()),
            mem: PairAMode::SignedOffset(stack_reg(), SImm7Scaled::maybe_from_i64(offset, 8).unwrap()),
            flags,
        },
        _ => Inst::FpuLoadP64 {
            rt: Writable::from_reg(r1.to_reg()),
            rt2: Writable::from_reg(r2.to_reg()),
            mem: PairAMode::SignedOffset(stack_reg(), SImm7Scaled::maybe_from_i64(offset, 8).unwrap()),
            flags,
        },
    }
}

fn restore_single_inst(r: RealReg, offset: i64) -> Inst {
    let flags = crate::ir::MemFlags::trusted();
    match r.class() {
        RegClass::Int => Inst::ULoad64 {
            rd: Writable::from_reg(r.to_reg()),
            mem: single_save_amode(offset),
            flags,
        },
        _ => Inst::FpuLoad64 {
            rd: Writable::from_reg(r.to_reg()),
            mem: single_save_amode(offset),
            flags,
        },
    }
}

/// A bitset tracker of caller-saved registers that hold live values
/// across a region (e.g. a runtime-call shim): GPRs x0..x18 excluding the
/// scratch x16/x17 and the platform register, and FPRs v0..v7 and
/// v16..v31.
pub struct CallerSavedTracker {
    platform: Platform,
    gprs: u32,
    fprs: u32,
}

impl CallerSavedTracker {
    /// Create an empty tracker.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            gprs: 0,
            fprs: 0,
        }
    }

    /// Mark a register as needing save/restore. Marks of registers
    /// outside the tracked caller-saved sets are ignored.
    pub fn mark(&mut self, reg: RealReg) {
        let enc = reg.hw_enc();
        match reg.class() {
            RegClass::Int => {
                if enc <= 18
                    && enc != 8
                    && enc != 16
                    && enc != 17
                    && !(enc == 18 && self.platform.reserves_x18())
                {
                    self.gprs |= 1 << enc;
                }
            }
            _ => {
                if enc <= 7 || enc >= 16 {
                    self.fprs |= 1 << enc;
                }
            }
        }
    }

    /// Clear all marks.
    pub fn clear(&mut self) {
        self.gprs = 0;
        self.fprs = 0;
    }

    fn check_red_zone(&self, base_offset: i64) {
        if base_offset < 0 {
            assert!(
                self.platform.has_red_zone(),
                "saves below SP need a red zone, which {} does not provide",
                self.platform
            );
            assert!(base_offset >= -128, "the red zone is 128 bytes");
        }
    }

    fn marked(&self) -> Vec<RealReg> {
        let mut out = Vec::new();
        for i in 0..32u8 {
            if self.gprs & (1 << i) != 0 {
                out.push(xreg(i).to_real_reg().unwrap());
            }
        }
        for i in 0..32u8 {
            if self.fprs & (1 << i) != 0 {
                out.push(vreg(i).to_real_reg().unwrap());
            }
        }
        out
    }

    /// Generate saves of all marked registers at `[sp, base_offset + i*8]`,
    /// pairing adjacent marked registers into `STP`; an unpaired trailing
    /// register emits a single store and still reserves 16 bytes for
    /// alignment. Returns the instructions and the bytes used.
    ///
    /// A negative `base_offset` places the saves below SP, in the red
    /// zone; that is only legal where the platform provides one, and
    /// within its 128 bytes.
    pub fn gen_saves(&self, base_offset: i64) -> (SmallVec<[Inst; 16]>, u32) {
        self.check_red_zone(base_offset);
        let mut insts: SmallVec<[Inst; 16]> = smallvec![];
        let mut offset = base_offset;
        let marked = self.marked();
        let mut iter = marked.chunks_exact(2);
        for pair in iter.by_ref() {
            if pair[0].class() == pair[1].class() {
                insts.push(save_pair_inst(pair[0], pair[1], offset));
            } else {
                insts.push(save_single_inst(pair[0], offset));
                insts.push(save_single_inst(pair[1], offset + 8));
            }
            offset += 16;
        }
        if let [last] = iter.remainder() {
            insts.push(save_single_inst(*last, offset));
            offset += 16;
        }
        (insts, (offset - base_offset) as u32)
    }

    /// Generate the restores mirroring `gen_saves`.
    pub fn gen_restores(&self, base_offset: i64) -> SmallVec<[Inst; 16]> {
        self.check_red_zone(base_offset);
        let mut insts: SmallVec<[Inst; 16]> = smallvec![];
        let mut offset = base_offset;
        let marked = self.marked();
        let mut iter = marked.chunks_exact(2);
        for pair in iter.by_ref() {
            if pair[0].class() == pair[1].class() {
                insts.push(restore_pair_inst(pair[0], pair[1], offset));
            } else {
                insts.push(restore_single_inst(pair[0], offset));
                insts.push(restore_single_inst(pair[1], offset + 8));
            }
            offset += 16;
        }
        if let [last] = iter.remainder() {
            insts.push(restore_single_inst(*last, offset));
        }
        insts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::AbiParam;

    fn sig_with(params: Vec<AbiParam>) -> Signature {
        let mut sig = Signature::new(CallConv::Aapcs64);
        sig.params = params;
        sig
    }

    #[test]
    fn int_args_fill_x0_to_x7_then_stack() {
        let sig = sig_with((0..10).map(|_| AbiParam::new(types::I64)).collect());
        let (locs, stack, _) = compute_arg_locs(&sig, ArgsOrRets::Args).unwrap();
        for (i, loc) in locs.iter().take(8).enumerate() {
            match loc.slots()[0] {
                ABIArgSlot::Reg { reg, .. } => {
                    assert_eq!(reg.hw_enc(), i as u8);
                    assert_eq!(reg.class(), RegClass::Int);
                }
                ref s => panic!("expected reg, got {:?}", s),
            }
        }
        // 9th and 10th on the stack at 0, 8.
        assert_eq!(
            locs[8].slots()[0],
            ABIArgSlot::Stack {
                offset: 0,
                ty: types::I64
            }
        );
        assert_eq!(
            locs[9].slots()[0],
            ABIArgSlot::Stack {
                offset: 8,
                ty: types::I64
            }
        );
        assert_eq!(stack, 16);
    }

    #[test]
    fn fast_call_conv_exposes_more_registers() {
        let mut sig = Signature::new(CallConv::Fast);
        sig.params = (0..18).map(|_| AbiParam::new(types::I64)).collect();
        let (locs, stack, _) = compute_arg_locs(&sig, ArgsOrRets::Args).unwrap();
        // x0..x17 all carry arguments; nothing spills to the stack.
        for (i, loc) in locs.iter().enumerate() {
            match loc.slots()[0] {
                ABIArgSlot::Reg { reg, .. } => assert_eq!(reg.hw_enc(), i as u8),
                ref s => panic!("expected reg, got {:?}", s),
            }
        }
        assert_eq!(stack, 0);
    }

    #[test]
    fn stack_arg_alignment() {
        // 8 int regs consumed, then an i32, an f64 (with all 8 v-regs
        // exhausted by floats first), and a v128.
        let mut params: Vec<AbiParam> = (0..8).map(|_| AbiParam::new(types::I64)).collect();
        params.extend((0..8).map(|_| AbiParam::new(types::F64)));
        params.push(AbiParam::new(types::I32)); // stack 0..3, padded to 8
        params.push(AbiParam::new(types::F64)); // stack 8, aligned to 8
        params.push(AbiParam::new(types::I8X16)); // stack 16, aligned to 16
        let sig = sig_with(params);
        let (locs, stack, _) = compute_arg_locs(&sig, ArgsOrRets::Args).unwrap();
        assert_eq!(
            locs[16].slots()[0],
            ABIArgSlot::Stack {
                offset: 0,
                ty: types::I32
            }
        );
        assert_eq!(
            locs[17].slots()[0],
            ABIArgSlot::Stack {
                offset: 8,
                ty: types::F64
            }
        );
        assert_eq!(
            locs[18].slots()[0],
            ABIArgSlot::Stack {
                offset: 16,
                ty: types::I8X16
            }
        );
        assert_eq!(stack, 32);
    }

    #[test]
    fn hfa_classification_and_exhaustion() {
        let hfa3 = AbiParam::strukt(vec![
            StructField {
                ty: types::F64,
                offset: 0,
            },
            StructField {
                ty: types::F64,
                offset: 8,
            },
            StructField {
                ty: types::F64,
                offset: 16,
            },
        ]);
        match &hfa3.value_type {
            ParamType::Struct(fields) => assert_eq!(
                classify_struct(fields),
                StructClass::Hfa {
                    elem: types::F64,
                    count: 3
                }
            ),
            _ => unreachable!(),
        }

        // Six f64 singles plus an HFA of 3: only 2 vregs remain, so the
        // whole HFA goes to the stack, and a later f64 must NOT use the
        // remaining registers.
        let mut params: Vec<AbiParam> = (0..6).map(|_| AbiParam::new(types::F64)).collect();
        params.push(hfa3);
        params.push(AbiParam::new(types::F64));
        let sig = sig_with(params);
        let (locs, _, _) = compute_arg_locs(&sig, ArgsOrRets::Args).unwrap();
        for slot in locs[6].slots() {
            assert!(matches!(slot, ABIArgSlot::Stack { .. }));
        }
        assert!(matches!(locs[7].slots()[0], ABIArgSlot::Stack { .. }));
    }

    #[test]
    fn large_struct_is_indirect() {
        let big = AbiParam::strukt(
            (0..5)
                .map(|i| StructField {
                    ty: types::I32,
                    offset: i * 4,
                })
                .collect(),
        );
        let sig = sig_with(vec![big]);
        let (locs, _, _) = compute_arg_locs(&sig, ArgsOrRets::Args).unwrap();
        match &locs[0] {
            ABIArg::Indirect { pointer } => match pointer {
                ABIArgSlot::Reg { reg, .. } => assert_eq!(reg.class(), RegClass::Int),
                s => panic!("expected reg pointer, got {:?}", s),
            },
            a => panic!("expected indirect, got {:?}", a),
        }
    }

    #[test]
    fn i128_takes_even_register_pair() {
        let sig = sig_with(vec![
            AbiParam::new(types::I64),
            AbiParam::new(types::I128),
        ]);
        let (locs, _, _) = compute_arg_locs(&sig, ArgsOrRets::Args).unwrap();
        // x0 for the i64; the i128 skips x1 and takes x2/x3.
        let slots = locs[1].slots();
        match (slots[0], slots[1]) {
            (ABIArgSlot::Reg { reg: lo, .. }, ABIArgSlot::Reg { reg: hi, .. }) => {
                assert_eq!(lo.hw_enc(), 2);
                assert_eq!(hi.hw_enc(), 3);
            }
            s => panic!("unexpected slots {:?}", s),
        }
    }

    #[test]
    fn frame_size_formula() {
        fn frame_for(n_saves: usize, locals: u32) -> u32 {
            let mut callee =
                AArch64ABICallee::new(Signature::new(CallConv::Aapcs64), Platform::Linux)
                    .unwrap();
            for i in 0..n_saves {
                callee.add_clobber(Writable::from_reg(
                    xreg(19 + i as u8).to_real_reg().unwrap(),
                ));
            }
            callee.set_locals_size(locals);
            callee.compute_frame_layout()
        }

        assert_eq!(frame_for(0, 0), 16);
        assert_eq!(frame_for(1, 0), 32);
        assert_eq!(frame_for(2, 0), 32);
        assert_eq!(frame_for(3, 0), 48);
        assert_eq!(frame_for(10, 0), 96);
        // Three callee-saves and 25 bytes of locals: 16 + 32 + 25 -> 80.
        assert_eq!(frame_for(3, 25), 80);
        // Always 16-aligned.
        for n in 0..10 {
            for locals in [0u32, 1, 8, 17, 25, 100] {
                assert_eq!(frame_for(n, locals) % 16, 0);
            }
        }
    }

    #[test]
    fn small_and_large_frame_boundary() {
        fn callee_with_locals(locals: u32) -> AArch64ABICallee {
            let mut callee =
                AArch64ABICallee::new(Signature::new(CallConv::Aapcs64), Platform::Linux)
                    .unwrap();
            callee.set_locals_size(locals);
            callee.compute_frame_layout();
            callee
        }

        // Frame of exactly 504: the small-frame path.
        let callee = callee_with_locals(504 - 16);
        assert_eq!(callee.frame_size(), 504);
        let prologue = callee.gen_prologue();
        assert!(matches!(
            prologue[0],
            Inst::StoreP64 {
                mem: PairAMode::PreIndexed(..),
                ..
            }
        ));

        // Frame of exactly 512: the large-frame path.
        let callee = callee_with_locals(512 - 16);
        assert_eq!(callee.frame_size(), 512);
        let prologue = callee.gen_prologue();
        assert!(matches!(prologue[0], Inst::AluRRImm12 { .. }));
    }

    #[test]
    fn three_saves_prologue_shape() {
        let mut callee =
            AArch64ABICallee::new(Signature::new(CallConv::Aapcs64), Platform::Linux).unwrap();
        for i in 19..22 {
            callee.add_clobber(Writable::from_reg(xreg(i).to_real_reg().unwrap()));
        }
        callee.set_locals_size(25);
        assert_eq!(callee.compute_frame_layout(), 80);
        let prologue = callee.gen_prologue();
        // stp fp, lr, [sp, #-80]! ; mov fp, sp ; stp x19, x20, [sp, #16] ;
        // str x21, [sp, #32]
        assert_eq!(prologue.len(), 4);
        assert_eq!(prologue[0].show(), "stp fp, lr, [sp, #-80]!");
        assert_eq!(prologue[1].show(), "mov fp, sp");
        assert_eq!(prologue[2].show(), "stp x19, x20, [sp, #16]");
        assert_eq!(prologue[3].show(), "str x21, [sp, #32]");
        let epilogue = callee.gen_epilogue();
        assert_eq!(epilogue[epilogue.len() - 2].show(), "ldp fp, lr, [sp], #80");
        assert_eq!(epilogue[epilogue.len() - 1].show(), "ret");
    }

    #[test]
    fn varargs_save_area() {
        let mut sig = Signature::new(CallConv::Aapcs64);
        sig.params = vec![AbiParam::new(types::I32)];
        sig.variadic = true;
        let mut callee = AArch64ABICallee::new(sig, Platform::Linux).unwrap();
        let frame = callee.compute_frame_layout();
        // 16 (fp/lr) + 192 (save area).
        assert_eq!(frame, 208);
        let prologue = callee.gen_prologue();
        // fp/lr store, fp setup, then 4 GP pair stores + 4 vector pair
        // stores.
        assert_eq!(prologue.len(), 2 + 8);
        let gp_stores = prologue
            .iter()
            .filter(|i| matches!(i, Inst::StoreP64 { mem: PairAMode::SignedOffset(..), .. }))
            .count();
        let vec_stores = prologue
            .iter()
            .filter(|i| matches!(i, Inst::FpuStoreP128 { .. }))
            .count();
        assert_eq!(gp_stores, 4);
        assert_eq!(vec_stores, 4);

        // va_start writes all five fields.
        let insts = callee.gen_va_start(xreg(0));
        let stores64 = insts
            .iter()
            .filter(|i| matches!(i, Inst::Store64 { .. }))
            .count();
        let stores32 = insts
            .iter()
            .filter(|i| matches!(i, Inst::Store32 { .. }))
            .count();
        assert_eq!(stores64, 3);
        assert_eq!(stores32, 2);
    }

    #[test]
    fn preserve_all_callee_saves() {
        // x8..x18 join the callee-save set under preserve_all; x18 stays
        // off-limits on Darwin.
        let r = |n: u8| xreg(n).to_real_reg().unwrap();
        assert!(is_reg_saved_in_prologue(
            CallConv::PreserveAll,
            Platform::Linux,
            r(10)
        ));
        assert!(is_reg_saved_in_prologue(
            CallConv::PreserveAll,
            Platform::Linux,
            r(18)
        ));
        assert!(!is_reg_saved_in_prologue(
            CallConv::PreserveAll,
            Platform::Darwin,
            r(18)
        ));
        assert!(!is_reg_saved_in_prologue(
            CallConv::Aapcs64,
            Platform::Linux,
            r(10)
        ));
        // v16..v31 under preserve_all only.
        let v = |n: u8| vreg(n).to_real_reg().unwrap();
        assert!(is_reg_saved_in_prologue(
            CallConv::PreserveAll,
            Platform::Linux,
            v(20)
        ));
        assert!(!is_reg_saved_in_prologue(
            CallConv::Aapcs64,
            Platform::Linux,
            v(20)
        ));
        assert!(is_reg_saved_in_prologue(
            CallConv::Cold,
            Platform::Linux,
            v(20)
        ));
    }

    #[test]
    #[should_panic(expected = "invalid callee-save register")]
    fn illegal_callee_save_rejected() {
        let mut callee =
            AArch64ABICallee::new(Signature::new(CallConv::Aapcs64), Platform::Linux).unwrap();
        callee.add_clobber(Writable::from_reg(xreg(0).to_real_reg().unwrap()));
    }

    #[test]
    fn caller_saved_tracker_red_zone() {
        // On Linux the 128-byte red zone below SP may hold the saves.
        let mut tracker = CallerSavedTracker::new(Platform::Linux);
        tracker.mark(xreg(0).to_real_reg().unwrap());
        tracker.mark(xreg(1).to_real_reg().unwrap());
        let (saves, bytes) = tracker.gen_saves(-32);
        assert_eq!(saves.len(), 1);
        assert_eq!(bytes, 16);
        assert_eq!(saves[0].show(), "stp x0, x1, [sp, #-32]");
        let restores = tracker.gen_restores(-32);
        assert_eq!(restores[0].show(), "ldp x0, x1, [sp, #-32]");
    }

    #[test]
    #[should_panic(expected = "red zone")]
    fn red_zone_rejected_on_darwin() {
        let mut tracker = CallerSavedTracker::new(Platform::Darwin);
        tracker.mark(xreg(0).to_real_reg().unwrap());
        tracker.gen_saves(-16);
    }

    #[test]
    fn caller_saved_tracker_pairs() {
        let mut tracker = CallerSavedTracker::new(Platform::Linux);
        tracker.mark(xreg(0).to_real_reg().unwrap());
        tracker.mark(xreg(1).to_real_reg().unwrap());
        tracker.mark(xreg(2).to_real_reg().unwrap());
        // x8 and x16 are not tracked.
        tracker.mark(xreg(8).to_real_reg().unwrap());
        tracker.mark(xreg(16).to_real_reg().unwrap());
        let (saves, bytes) = tracker.gen_saves(0);
        // One pair + one single, each reserving 16 bytes.
        assert_eq!(saves.len(), 2);
        assert_eq!(bytes, 32);
        let restores = tracker.gen_restores(0);
        assert_eq!(restores.len(), 2);
        tracker.clear();
        let (saves, bytes) = tracker.gen_saves(0);
        assert!(saves.is_empty());
        assert_eq!(bytes, 0);
    }
}
