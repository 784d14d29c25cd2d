//! AArch64 machine-code backend for the Oxbow compiler.
//!
//! This crate accepts a target-independent SSA-form intermediate
//! representation (see the [`ir`] module) together with a per-function
//! calling-convention descriptor, and produces relocatable ARMv8-A machine
//! code plus a frame layout consistent with the AAPCS64 procedure call
//! standard (Darwin and Linux variants) and two auxiliary conventions.
//!
//! The pipeline, per function:
//!
//! 1. The lowering engine (`isa::aarch64::lower`) matches IR instructions
//!    against prioritized rewrite rules, producing `VCode` over virtual
//!    registers.
//! 2. The register-allocator bridge (`regalloc`) extracts per-instruction
//!    operand records for an external allocator and maps its output back
//!    into the instructions.
//! 3. The ABI engine (`isa::aarch64::abi`) computes the frame layout and
//!    prepends/appends prologue and epilogue code.
//! 4. The emitter (`isa::aarch64::inst::emit`) encodes each instruction
//!    into little-endian 4-byte words in a `MachBuffer`, resolves label
//!    fixups, and appends the literal pool.

#![warn(
    missing_docs,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces
)]

pub mod ir;
pub mod isa;
pub mod machinst;
pub mod regalloc;

mod result;

pub use crate::result::{CodegenError, CodegenResult};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
