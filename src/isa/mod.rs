//! Instruction Set Architectures.
//!
//! This crate targets AArch64 only; this module holds the pieces that are
//! conceptually ISA-independent: the calling-convention and platform tags
//! and the top-level compilation entry point.

pub mod aarch64;

use std::fmt;

/// Calling convention identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallConv {
    /// The ARM 64-bit procedure call standard.
    Aapcs64,
    /// Internal convention exposing more argument registers (x0..x17,
    /// v0..v15) for hot intra-module calls.
    Fast,
    /// Convention preserving every allocatable register, for calls that
    /// must not disturb the caller's state (e.g. lazily-linked stubs).
    PreserveAll,
    /// Convention for rarely-executed code; saves everything like
    /// `PreserveAll` so the common path stays unencumbered.
    Cold,
}

impl CallConv {
    /// Does this convention use the preserve-everything callee-save set?
    pub fn preserves_all_regs(self) -> bool {
        matches!(self, CallConv::PreserveAll | CallConv::Cold)
    }
}

impl fmt::Display for CallConv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            CallConv::Aapcs64 => "aapcs64",
            CallConv::Fast => "fast",
            CallConv::PreserveAll => "preserve_all",
            CallConv::Cold => "cold",
        })
    }
}

/// The operating-system platform, as far as the backend cares: it decides
/// red-zone availability, X18 reservation, and callee-save trimming.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Apple platforms (macOS, iOS): no red zone, X18 reserved.
    Darwin,
    /// Linux: 128-byte red zone permitted, X18 allocatable.
    Linux,
}

impl Platform {
    /// May leaf functions use the 128-byte red zone below SP?
    pub fn has_red_zone(self) -> bool {
        match self {
            Platform::Darwin => false,
            Platform::Linux => true,
        }
    }

    /// Is X18 reserved by the platform ABI?
    pub fn reserves_x18(self) -> bool {
        match self {
            Platform::Darwin => true,
            Platform::Linux => false,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Platform::Darwin => "darwin",
            Platform::Linux => "linux",
        })
    }
}
