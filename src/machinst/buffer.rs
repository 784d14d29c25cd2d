//! In-memory representation of compiled machine code, with labels and
//! fixups to refer to those labels.
//!
//! The buffer grows monotonically during emission. Branch and PC-relative
//! load instructions that reference an unbound label record a fixup; after
//! all instructions of a function have been emitted and all labels bound,
//! `finish()` resolves every fixup exactly once by patching the
//! pre-reserved bit positions of the referencing word.

use crate::ir::ExternalName;
use crate::result::{CodegenError, CodegenResult};
use log::trace;
use rustc_hash::FxHashMap;
use std::u32;

/// An offset in bytes from the start of the function's code.
pub type CodeOffset = u32;

/// A label: a symbolic name for an offset that is not yet known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachLabel(u32);

impl MachLabel {
    /// Get a label for a basic block. (The first N labels are always
    /// reserved for the N blocks in the vcode.)
    pub fn from_block(bindex: u32) -> MachLabel {
        MachLabel(bindex)
    }

    /// The underlying label number.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// The kind of a label reference: how the resolved byte displacement is
/// folded into the referencing instruction word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelUse {
    /// 19-bit branch offset (conditional branches, CBZ/CBNZ). PC-relative,
    /// signed, in units of 4-byte words, shifted into bits [23:5].
    Branch19,
    /// 26-bit branch offset (unconditional branches, BL). PC-relative,
    /// signed, in units of 4-byte words, in bits [25:0].
    Branch26,
    /// 19-bit offset for `LDR (literal)`. Same field placement as
    /// `Branch19`.
    Ldr19,
    /// 21-bit offset for `ADR`, byte-granular, split into immlo/immhi.
    Adr21,
    /// 21-bit page offset for `ADRP`: the displacement between the page of
    /// the referencing instruction and the page of the target.
    Adrp21,
}

impl LabelUse {
    /// Maximum positive displacement in bytes.
    pub fn max_pos_range(self) -> CodeOffset {
        match self {
            // 19-bit signed word offset: +(2^18 - 1) words.
            LabelUse::Branch19 | LabelUse::Ldr19 => ((1 << 18) - 1) * 4,
            // 26-bit signed word offset.
            LabelUse::Branch26 => ((1 << 25) - 1) * 4,
            LabelUse::Adr21 => (1 << 20) - 1,
            // ADRP addresses +/- 4GiB in page units.
            LabelUse::Adrp21 => ((1u32 << 31) - 1) & !0xfff,
        }
    }

    /// Maximum negative displacement in bytes.
    pub fn max_neg_range(self) -> CodeOffset {
        match self {
            LabelUse::Branch19 | LabelUse::Ldr19 => (1 << 18) * 4,
            LabelUse::Branch26 => (1 << 25) * 4,
            LabelUse::Adr21 => 1 << 20,
            LabelUse::Adrp21 => 1 << 31,
        }
    }

    /// Patch the given instruction word with the displacement `delta`
    /// (target offset minus use offset, in bytes). The word's target field
    /// must be pre-reserved as zero.
    pub fn patch(self, insn_word: u32, delta: i64) -> u32 {
        match self {
            LabelUse::Branch19 | LabelUse::Ldr19 => {
                let off_words = (delta >> 2) as u32;
                insn_word | ((off_words & 0x7ffff) << 5)
            }
            LabelUse::Branch26 => {
                let off_words = (delta >> 2) as u32;
                insn_word | (off_words & 0x03ff_ffff)
            }
            LabelUse::Adr21 => {
                let delta = delta as u32;
                let immlo = delta & 3;
                let immhi = (delta >> 2) & 0x7ffff;
                insn_word | (immlo << 29) | (immhi << 5)
            }
            LabelUse::Adrp21 => {
                // Page delta; callers compute it from page-aligned
                // offsets, so bits [11:0] of delta are dropped.
                let pages = (delta >> 12) as u32;
                let immlo = pages & 3;
                let immhi = (pages >> 2) & 0x7ffff;
                insn_word | (immlo << 29) | (immhi << 5)
            }
        }
    }

    /// Check that `delta` is representable.
    pub fn in_range(self, delta: i64) -> bool {
        delta <= self.max_pos_range() as i64 && delta >= -(self.max_neg_range() as i64)
    }
}

/// A relocation kind for the object-file writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reloc {
    /// A 26-bit PC-relative call (BL) to an external symbol.
    Arm64Call,
    /// ADRP page reference to an external symbol.
    Aarch64AdrpPage21,
    /// The low 12 bits of an external symbol's address, used by the ADD or
    /// LDR paired with an ADRP.
    Aarch64AbsLo12,
}

/// A relocation resulting from compiling a function.
#[derive(Clone, Debug)]
pub struct MachReloc {
    /// The offset at which the relocation applies, relative to the start
    /// of the function's code.
    pub offset: CodeOffset,
    /// The kind of relocation.
    pub kind: Reloc,
    /// The external symbol being referenced.
    pub name: ExternalName,
    /// The addend to add to the symbol value.
    pub addend: i64,
}

#[derive(Clone, Debug)]
struct MachLabelFixup {
    /// Code offset of the referencing instruction word.
    offset: CodeOffset,
    /// The label referenced.
    label: MachLabel,
    /// How the displacement is folded into the word.
    kind: LabelUse,
}

const UNKNOWN_LABEL_OFFSET: CodeOffset = u32::MAX;

/// A buffer of output to be produced, fixed up, and then emitted to a
/// final form.
#[derive(Default)]
pub struct MachBuffer {
    /// The buffer contents, as raw bytes.
    data: Vec<u8>,
    /// Known offset of each label, or `UNKNOWN_LABEL_OFFSET`.
    label_offsets: Vec<CodeOffset>,
    /// Fixups pending resolution.
    fixups: Vec<MachLabelFixup>,
    /// Relocations for the object-file writer.
    relocs: Vec<MachReloc>,
}

/// A `MachBuffer` once emission is completed: holds the final bytes and
/// the relocation list the consumer inherits.
pub struct MachBufferFinalized {
    /// The buffer contents.
    pub data: Vec<u8>,
    /// Any relocations referring to this code.
    pub relocs: Vec<MachReloc>,
}

impl MachBuffer {
    /// Create a new, empty buffer.
    pub fn new() -> MachBuffer {
        MachBuffer::default()
    }

    /// Reserve the first `n` labels for the blocks of the vcode, so that
    /// `MachLabel::from_block(i)` is valid for `i < n`.
    pub fn reserve_labels_for_blocks(&mut self, n: u32) {
        debug_assert!(self.label_offsets.is_empty());
        self.label_offsets.resize(n as usize, UNKNOWN_LABEL_OFFSET);
    }

    /// Current offset from start of buffer.
    pub fn cur_offset(&self) -> CodeOffset {
        self.data.len() as CodeOffset
    }

    /// Add a 32-bit instruction word, little-endian.
    pub fn put4(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Add a 64-bit data word, little-endian.
    pub fn put8(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Add raw bytes.
    pub fn put_data(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    /// Allocate a fresh label.
    pub fn get_label(&mut self) -> MachLabel {
        let label = MachLabel(self.label_offsets.len() as u32);
        self.label_offsets.push(UNKNOWN_LABEL_OFFSET);
        label
    }

    /// Bind a label to the current offset.
    pub fn bind_label(&mut self, label: MachLabel) -> CodeOffset {
        trace!("bind label {:?} at offset {}", label, self.cur_offset());
        debug_assert_eq!(
            self.label_offsets[label.0 as usize],
            UNKNOWN_LABEL_OFFSET,
            "label {:?} bound twice",
            label
        );
        let off = self.cur_offset();
        self.label_offsets[label.0 as usize] = off;
        off
    }

    /// The bound offset of a label, if it has been bound.
    pub fn label_offset(&self, label: MachLabel) -> Option<CodeOffset> {
        match self.label_offsets[label.0 as usize] {
            UNKNOWN_LABEL_OFFSET => None,
            off => Some(off),
        }
    }

    /// Record a use of a label at the given instruction-word offset.
    pub fn use_label_at_offset(&mut self, offset: CodeOffset, label: MachLabel, kind: LabelUse) {
        debug_assert_eq!(offset % 4, 0);
        self.fixups.push(MachLabelFixup {
            offset,
            label,
            kind,
        });
    }

    /// Record a relocation at the current offset.
    pub fn add_reloc(&mut self, kind: Reloc, name: &ExternalName, addend: i64) {
        let offset = self.cur_offset();
        self.relocs.push(MachReloc {
            offset,
            kind,
            name: name.clone(),
            addend,
        });
    }

    /// Pad with the given fill word (a `nop` for code regions) until the
    /// buffer offset is aligned to `align` bytes.
    pub fn align_to(&mut self, align: CodeOffset, fill_word: u32) {
        debug_assert!(align.is_power_of_two() && align % 4 == 0);
        while self.cur_offset() & (align - 1) != 0 {
            self.put4(fill_word);
        }
    }

    /// Resolve all fixups and produce the final bytes and relocations.
    ///
    /// All `bind_label` calls must have happened before this; each fixup is
    /// resolved exactly once.
    pub fn finish(mut self) -> CodegenResult<MachBufferFinalized> {
        for fixup in std::mem::take(&mut self.fixups) {
            let target = self.label_offsets[fixup.label.0 as usize];
            if target == UNKNOWN_LABEL_OFFSET {
                panic!(
                    "unbound label {:?} referenced at offset {:#x}",
                    fixup.label, fixup.offset
                );
            }
            let delta = (target as i64) - (fixup.offset as i64);
            if !fixup.kind.in_range(delta) {
                return Err(CodegenError::LabelOutOfRange {
                    offset: fixup.offset,
                    label: fixup.label.0,
                });
            }
            let idx = fixup.offset as usize;
            let word = u32::from_le_bytes(self.data[idx..idx + 4].try_into().unwrap());
            let patched = fixup.kind.patch(word, delta);
            self.data[idx..idx + 4].copy_from_slice(&patched.to_le_bytes());
        }
        Ok(MachBufferFinalized {
            data: self.data,
            relocs: self.relocs,
        })
    }
}

/// A literal pool: 64-bit constants that could not be encoded in-line,
/// deduplicated by value and emitted little-endian after the function's
/// code. `LDR (literal)` instructions reference pool entries by label.
#[derive(Default)]
pub struct LitPool {
    entries: Vec<(u64, MachLabel)>,
    by_value: FxHashMap<u64, MachLabel>,
}

impl LitPool {
    /// Create an empty pool.
    pub fn new() -> LitPool {
        LitPool::default()
    }

    /// Add a constant to the pool, returning the label of its entry.
    /// Equal values share one entry; labels increase monotonically for
    /// distinct values.
    pub fn add_constant(&mut self, buffer: &mut MachBuffer, value: u64) -> MachLabel {
        if let Some(&label) = self.by_value.get(&value) {
            return label;
        }
        let label = buffer.get_label();
        self.entries.push((value, label));
        self.by_value.insert(value, label);
        label
    }

    /// Number of entries.
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Size in bytes of the emitted pool.
    pub fn size(&self) -> u32 {
        (self.entries.len() * 8) as u32
    }

    /// Emit the pool into the buffer, binding each entry's label. Entries
    /// are written in insertion order. The pool is 8-byte aligned using
    /// the given fill word.
    pub fn emit(&self, buffer: &mut MachBuffer, fill_word: u32) {
        if self.entries.is_empty() {
            return;
        }
        buffer.align_to(8, fill_word);
        for &(value, label) in &self.entries {
            buffer.bind_label(label);
            buffer.put8(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_fixup_forward_branch26() {
        let mut buf = MachBuffer::new();
        let label = buf.get_label();
        // b <label>
        buf.use_label_at_offset(buf.cur_offset(), label, LabelUse::Branch26);
        buf.put4(0b000101 << 26);
        buf.put4(0xd503201f); // nop
        buf.bind_label(label);
        buf.put4(0xd65f03c0); // ret
        let done = buf.finish().unwrap();
        let word = u32::from_le_bytes(done.data[0..4].try_into().unwrap());
        // Offset is 2 words forward.
        assert_eq!(word & 0x03ff_ffff, 2);
    }

    #[test]
    fn label_fixup_backward_branch19() {
        let mut buf = MachBuffer::new();
        let label = buf.get_label();
        buf.bind_label(label);
        buf.put4(0xd503201f);
        let off = buf.cur_offset();
        buf.use_label_at_offset(off, label, LabelUse::Branch19);
        buf.put4(0x54000000); // b.eq, offset field zero
        let done = buf.finish().unwrap();
        let word = u32::from_le_bytes(done.data[4..8].try_into().unwrap());
        // -1 word, masked to 19 bits.
        assert_eq!((word >> 5) & 0x7ffff, 0x7ffff);
    }

    #[test]
    fn branch19_out_of_range() {
        let mut buf = MachBuffer::new();
        let label = buf.get_label();
        buf.use_label_at_offset(buf.cur_offset(), label, LabelUse::Branch19);
        buf.put4(0x54000000);
        // Fill past the 19-bit branch range (1 MiB).
        for _ in 0..(1 << 18) {
            buf.put4(0xd503201f);
        }
        buf.bind_label(label);
        buf.put4(0xd65f03c0);
        match buf.finish() {
            Err(CodegenError::LabelOutOfRange { offset: 0, .. }) => {}
            other => panic!("expected LabelOutOfRange, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn litpool_dedup_and_layout() {
        let mut buf = MachBuffer::new();
        let mut pool = LitPool::new();
        let l1 = pool.add_constant(&mut buf, 0x1234_5678_9abc_def0);
        let l2 = pool.add_constant(&mut buf, 0x1234_5678_9abc_def0);
        let l3 = pool.add_constant(&mut buf, 42);
        assert_eq!(l1, l2);
        assert!(l3 > l1);
        assert_eq!(pool.num_entries(), 2);
        assert_eq!(pool.size(), 16);

        buf.put4(0xd503201f);
        pool.emit(&mut buf, 0xd503201f);
        let done = buf.finish().unwrap();
        // One nop, one alignment nop, then the two constants LE, in
        // insertion order.
        assert_eq!(done.data.len(), 8 + 16);
        assert_eq!(&done.data[8..16], &0x1234_5678_9abc_def0u64.to_le_bytes());
        assert_eq!(&done.data[16..24], &42u64.to_le_bytes());
    }
}
