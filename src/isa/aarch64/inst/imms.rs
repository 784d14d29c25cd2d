//! AArch64 ISA definitions: immediate constants.

use crate::isa::aarch64::inst::OperandSize;
use std::fmt;

/// An immediate that represents the NZCV flags.
#[derive(Clone, Copy, Debug)]
pub struct NZCV {
    /// The negative condition flag.
    n: bool,
    /// The zero condition flag.
    z: bool,
    /// The carry condition flag.
    c: bool,
    /// The overflow condition flag.
    v: bool,
}

impl NZCV {
    /// Create an NZCV flag immediate.
    pub fn new(n: bool, z: bool, c: bool, v: bool) -> NZCV {
        NZCV { n, z, c, v }
    }

    /// Bits for encoding.
    pub fn bits(&self) -> u32 {
        (u32::from(self.n) << 3)
            | (u32::from(self.z) << 2)
            | (u32::from(self.c) << 1)
            | u32::from(self.v)
    }
}

/// An unsigned 5-bit immediate.
#[derive(Clone, Copy, Debug)]
pub struct UImm5 {
    value: u8,
}

impl UImm5 {
    /// Create an unsigned 5-bit immediate from a u8, if possible.
    pub fn maybe_from_u8(value: u8) -> Option<UImm5> {
        if value < 32 {
            Some(UImm5 { value })
        } else {
            None
        }
    }

    /// Bits for encoding.
    pub fn bits(&self) -> u32 {
        u32::from(self.value)
    }
}

/// A signed, scaled 7-bit offset, used by load/store-pair instructions.
#[derive(Clone, Copy, Debug)]
pub struct SImm7Scaled {
    /// The value.
    pub value: i16,
    /// Multiplied by the size of this many bytes (4, 8 or 16).
    pub scale: u8,
}

impl SImm7Scaled {
    /// Create a SImm7Scaled from a raw offset and the known scale, if
    /// possible. A 64-bit pair access has scale 8 and legal offsets
    /// [-512, +504]; a 128-bit pair access has scale 16.
    pub fn maybe_from_i64(value: i64, scale: u8) -> Option<SImm7Scaled> {
        debug_assert!(scale.is_power_of_two());
        let scale = i64::from(scale);
        let upper_limit = 63 * scale;
        let lower_limit = -(64 * scale);
        if value >= lower_limit && value <= upper_limit && (value & (scale - 1)) == 0 {
            Some(SImm7Scaled {
                value: i16::try_from(value).unwrap(),
                scale: scale as u8,
            })
        } else {
            None
        }
    }

    /// Create a zero immediate of this format.
    pub fn zero(scale: u8) -> SImm7Scaled {
        SImm7Scaled { value: 0, scale }
    }

    /// Bits for encoding.
    pub fn bits(&self) -> u32 {
        let scaled: i16 = self.value / i16::from(self.scale);
        debug_assert!(scaled <= 63 && scaled >= -64);
        (scaled as u32) & 0x7f
    }
}

/// A signed 9-bit offset, used by unscaled and pre/post-indexed accesses.
#[derive(Clone, Copy, Debug)]
pub struct SImm9 {
    /// The value.
    pub value: i16,
}

impl SImm9 {
    /// Create a signed 9-bit offset from a full-range value, if possible.
    pub fn maybe_from_i64(value: i64) -> Option<SImm9> {
        if (-256..=255).contains(&value) {
            Some(SImm9 {
                value: value as i16,
            })
        } else {
            None
        }
    }

    /// Create a zero immediate of this format.
    pub fn zero() -> SImm9 {
        SImm9 { value: 0 }
    }

    /// Bits for encoding.
    pub fn bits(&self) -> u32 {
        (self.value as u32) & 0x1ff
    }
}

/// An unsigned, scaled 12-bit offset for register-plus-offset loads and
/// stores.
#[derive(Clone, Copy, Debug)]
pub struct UImm12Scaled {
    /// The value.
    pub value: u16,
    /// Multiplied by the access size in bytes.
    pub scale: u8,
}

impl UImm12Scaled {
    /// Create a UImm12Scaled from a raw offset and the access size, if
    /// possible. Offsets must be non-negative multiples of the access
    /// size, up to 4095 times that size.
    pub fn maybe_from_i64(value: i64, scale: u8) -> Option<UImm12Scaled> {
        debug_assert!(scale.is_power_of_two());
        let scale = i64::from(scale);
        let limit = 4095 * scale;
        if value >= 0 && value <= limit && (value & (scale - 1)) == 0 {
            Some(UImm12Scaled {
                value: value as u16,
                scale: scale as u8,
            })
        } else {
            None
        }
    }

    /// Create a zero immediate of this format.
    pub fn zero(scale: u8) -> UImm12Scaled {
        UImm12Scaled { value: 0, scale }
    }

    /// Encoded bits.
    pub fn bits(&self) -> u32 {
        (u32::from(self.value) / u32::from(self.scale)) & 0xfff
    }
}

/// A shifted immediate value in 'imm12' format: supports 12 bits, shifted
/// left by 0 or 12 places.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Imm12 {
    /// The immediate bits.
    pub bits: u16,
    /// Whether the immediate bits are shifted left by 12 or not.
    pub shift12: bool,
}

impl Imm12 {
    /// Compute an Imm12 from raw bits, if possible. A value is encodable
    /// iff it fits in 12 bits, or is a multiple of 0x1000 not exceeding
    /// 0xfff000.
    pub fn maybe_from_u64(val: u64) -> Option<Imm12> {
        if val <= 0xfff {
            Some(Imm12 {
                bits: val as u16,
                shift12: false,
            })
        } else if val <= 0xfff_000 && (val & 0xfff == 0) {
            Some(Imm12 {
                bits: (val >> 12) as u16,
                shift12: true,
            })
        } else {
            None
        }
    }

    /// Create a zero immediate of this format.
    pub fn zero() -> Imm12 {
        Imm12 {
            bits: 0,
            shift12: false,
        }
    }

    /// Bits for the 2-bit "shift" field in e.g. AddI.
    pub fn shift_bits(&self) -> u32 {
        if self.shift12 {
            0b01
        } else {
            0b00
        }
    }

    /// Bits for the 12-bit "imm" field in e.g. AddI.
    pub fn imm_bits(&self) -> u32 {
        u32::from(self.bits)
    }

    /// The value this immediate represents.
    pub fn value(&self) -> u64 {
        u64::from(self.bits) << if self.shift12 { 12 } else { 0 }
    }
}

/// An immediate for logical instructions.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct ImmLogic {
    /// The actual value.
    value: u64,
    /// `N` flag.
    pub n: bool,
    /// `R` field: rotate amount.
    pub r: u8,
    /// `S` field: element size and element bits.
    pub s: u8,
    /// Was this constructed for a 32-bit or 64-bit instruction?
    pub size: OperandSize,
}

impl ImmLogic {
    /// Compute an ImmLogic from raw bits, if possible.
    ///
    /// A logical immediate is a rotation of a pattern of k consecutive
    /// 1-bits repeated across the word at a power-of-two element size in
    /// {2, 4, 8, 16, 32, 64}. Zero and all-ones are not encodable. This
    /// function is a port of VIXL's `Assembler::IsImmLogical`.
    pub fn maybe_from_u64(value: u64, size: OperandSize) -> Option<ImmLogic> {
        let original_value = value;

        let value = if size == OperandSize::Size32 {
            // To handle 32-bit logical immediates, the easiest thing is to
            // repeat the input value twice to make a 64-bit word. The
            // correct encoding of that as a logical immediate will also be
            // the correct encoding of the 32-bit value.
            let value = value << 32;
            value | value >> 32
        } else {
            value
        };

        // Logical immediates are encoded using parameters n, imm_s and
        // imm_r using the following table:
        //
        //    N   imms    immr    size        S             R
        //    1  ssssss  rrrrrr    64    UInt(ssssss)  UInt(rrrrrr)
        //    0  0sssss  xrrrrr    32    UInt(sssss)   UInt(rrrrr)
        //    0  10ssss  xxrrrr    16    UInt(ssss)    UInt(rrrr)
        //    0  110sss  xxxrrr     8    UInt(sss)     UInt(rrr)
        //    0  1110ss  xxxxrr     4    UInt(ss)      UInt(rr)
        //    0  11110s  xxxxxr     2    UInt(s)       UInt(r)
        // (s bits must not be all set)
        //
        // A pattern is constructed of size bits, where the least
        // significant S+1 bits are set. The pattern is rotated right by R,
        // and repeated across a 32 or 64-bit value.
        //
        // The rotation parameter gives the possibility of the stretch of 1
        // bits going 'round the end' of the word; in any situation where
        // that happens, the bitwise NOT of the value is also a valid
        // logical immediate, so we invert the input whenever its low bit
        // is set and compensate at the end.
        let (value, inverted) = if value & 1 == 1 {
            (!value, true)
        } else {
            (value, false)
        };

        if value == 0 {
            return None;
        }

        // Find the lowest stretch of set bits: a is its lowest bit, b the
        // next 1 above it once the stretch is cleared, c the lowest bit of
        // the next stretch. The distance between a and c is the repeat
        // period.
        fn lowest_set_bit(value: u64) -> u64 {
            let bit = value.trailing_zeros();
            1u64.checked_shl(bit).unwrap_or(0)
        }
        let a = lowest_set_bit(value);
        debug_assert_ne!(0, a);
        let value_plus_a = value.wrapping_add(a);
        let b = lowest_set_bit(value_plus_a);
        let value_plus_a_minus_b = value_plus_a - b;
        let c = lowest_set_bit(value_plus_a_minus_b);

        let (d, clz_a, out_n, mask) = if c != 0 {
            // More than one stretch of set bits: compute the repeat
            // distance d and a mask covering the basic repeat unit. N is
            // zero in all these cases.
            let clz_a = a.leading_zeros();
            let clz_c = c.leading_zeros();
            let d = clz_a - clz_c;
            let mask = (1u64 << d) - 1;
            (d, clz_a, 0, mask)
        } else {
            (64, a.leading_zeros(), 1, u64::MAX)
        };

        // The repeat period must be a power of two.
        if !d.is_power_of_two() {
            return None;
        }

        if ((b.wrapping_sub(a)) & !mask) != 0 {
            // The bit stretch does not fit within the repeat period.
            return None;
        }

        // The only possible option is (b - a) repeated every d bits.
        // Construct that value and compare with the input.
        const MULTIPLIERS: [u64; 6] = [
            0x0000000000000001,
            0x0000000100000001,
            0x0001000100010001,
            0x0101010101010101,
            0x1111111111111111,
            0x5555555555555555,
        ];
        let multiplier = MULTIPLIERS[(u64::from(d).leading_zeros() - 57) as usize];
        let candidate = b.wrapping_sub(a).wrapping_mul(multiplier);

        if value != candidate {
            return None;
        }

        // Valid logical immediate; construct the encoding fields. The
        // clz(0) == -1 special case makes the answer come out right for
        // stretches that reach the very top of the word.
        let clz_b = if b == 0 {
            u32::MAX // -1
        } else {
            b.leading_zeros()
        };
        let s = clz_a.wrapping_sub(clz_b);

        // Rotation count placing the low bit of the stretch at position a;
        // if we inverted at the start, compensate: set-bit count becomes
        // clear-bit count and the rotation is based on b.
        let (s, r) = if inverted {
            (d - s, clz_b.wrapping_add(1) & (d - 1))
        } else {
            (s, (clz_a + 1) & (d - 1))
        };

        // Encode the S field so it gives both the number of set bits and
        // the length of the repeated segment: 'or' (2 * -d) with s - 1.
        let s = ((d * 2).wrapping_neg() | (s - 1)) & 0x3f;
        debug_assert!(u8::try_from(r).is_ok());
        debug_assert!(u8::try_from(s).is_ok());
        Some(ImmLogic {
            value: original_value,
            n: out_n != 0,
            r: r as u8,
            s: s as u8,
            size,
        })
    }

    /// Returns bits ready for encoding: (N:1, R:6, S:6).
    pub fn enc_bits(&self) -> u32 {
        ((self.n as u32) << 12) | ((self.r as u32) << 6) | (self.s as u32)
    }

    /// Returns the value that this immediate represents.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Return an immediate for the bitwise-inverted value. For every
    /// logical immediate, the inverse is also encodable.
    pub fn invert(&self) -> ImmLogic {
        let inv = match self.size {
            OperandSize::Size32 => u64::from(!(self.value as u32)),
            OperandSize::Size64 => !self.value,
        };
        Self::maybe_from_u64(inv, self.size).unwrap()
    }
}

/// An immediate for shift instructions.
#[derive(Clone, Copy, Debug)]
pub struct ImmShift {
    /// 6-bit shift amount.
    pub imm: u8,
}

impl ImmShift {
    /// Create an ImmShift from raw bits, if possible.
    pub fn maybe_from_u64(val: u64) -> Option<ImmShift> {
        if val < 64 {
            Some(ImmShift { imm: val as u8 })
        } else {
            None
        }
    }

    /// Get the immediate value.
    pub fn value(&self) -> u8 {
        self.imm
    }
}

/// A 16-bit immediate for MOVZ/MOVK/MOVN, with a {0,16,32,48}-bit shift.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveWideConst {
    /// The 16-bit chunk.
    pub bits: u16,
    /// Result is `bits` shifted 16*shift bits to the left.
    pub shift: u8,
}

impl MoveWideConst {
    /// Construct a MoveWideConst from an arbitrary 64-bit constant, if it
    /// is a single 16-bit chunk at one of the four positions.
    pub fn maybe_from_u64(value: u64) -> Option<MoveWideConst> {
        let mask0 = 0x0000_0000_0000_ffffu64;
        let mask1 = 0x0000_0000_ffff_0000u64;
        let mask2 = 0x0000_ffff_0000_0000u64;
        let mask3 = 0xffff_0000_0000_0000u64;

        if value == (value & mask0) {
            return Some(MoveWideConst {
                bits: (value & mask0) as u16,
                shift: 0,
            });
        }
        if value == (value & mask1) {
            return Some(MoveWideConst {
                bits: ((value >> 16) & mask0) as u16,
                shift: 1,
            });
        }
        if value == (value & mask2) {
            return Some(MoveWideConst {
                bits: ((value >> 32) & mask0) as u16,
                shift: 2,
            });
        }
        if value == (value & mask3) {
            return Some(MoveWideConst {
                bits: ((value >> 48) & mask0) as u16,
                shift: 3,
            });
        }
        None
    }

    /// Construct from a chunk and a bit-shift of 0, 16, 32 or 48.
    pub fn maybe_with_shift(imm: u16, shift: u8) -> Option<MoveWideConst> {
        if shift % 16 != 0 {
            return None;
        }
        let shift_enc = shift / 16;
        if shift_enc > 3 {
            None
        } else {
            Some(MoveWideConst {
                bits: imm,
                shift: shift_enc,
            })
        }
    }

    /// The zero constant.
    pub fn zero() -> MoveWideConst {
        MoveWideConst { bits: 0, shift: 0 }
    }

    /// Returns the value that this constant represents.
    pub fn value(&self) -> u64 {
        u64::from(self.bits) << (16 * self.shift)
    }
}

/// An 8-bit immediate for FMOV (scalar, immediate): 1 sign bit, 3
/// exponent bits restricted so the true exponent is in [-3, 4], and the
/// top 4 fraction bits of the mantissa. All lower mantissa bits must be
/// zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FpImm8 {
    enc: u8,
}

impl FpImm8 {
    /// Try to encode a 64-bit float.
    pub fn maybe_from_f64(value: f64) -> Option<FpImm8> {
        let bits = value.to_bits();
        // The low 48 mantissa bits must be zero.
        if bits & 0x0000_ffff_ffff_ffff != 0 {
            return None;
        }
        let sign = ((bits >> 63) & 1) as u8;
        let biased_exp = ((bits >> 52) & 0x7ff) as u32;
        let frac4 = ((bits >> 48) & 0xf) as u8;
        // Biased exponent must match the pattern NOT(b):bbbbbbbb:cd for
        // a true exponent in [-3, 4], i.e. 1020..=1027 for f64.
        if !(1020..=1027).contains(&biased_exp) {
            return None;
        }
        let b = u8::from(biased_exp < 1024);
        let cd = (biased_exp & 3) as u8;
        Some(FpImm8 {
            enc: (sign << 7) | (b << 6) | (cd << 4) | frac4,
        })
    }

    /// Try to encode a 32-bit float.
    pub fn maybe_from_f32(value: f32) -> Option<FpImm8> {
        let bits = value.to_bits();
        // The low 19 mantissa bits must be zero.
        if bits & 0x0007_ffff != 0 {
            return None;
        }
        let sign = ((bits >> 31) & 1) as u8;
        let biased_exp = (bits >> 23) & 0xff;
        let frac4 = ((bits >> 19) & 0xf) as u8;
        // True exponent in [-3, 4]: biased 124..=131 for f32.
        if !(124..=131).contains(&biased_exp) {
            return None;
        }
        let b = u8::from(biased_exp < 128);
        let cd = (biased_exp & 3) as u8;
        Some(FpImm8 {
            enc: (sign << 7) | (b << 6) | (cd << 4) | frac4,
        })
    }

    /// The 8 encoded bits.
    pub fn enc_bits(&self) -> u8 {
        self.enc
    }

    /// Reconstruct the f64 value this immediate represents.
    pub fn to_f64(&self) -> f64 {
        let sign = u64::from(self.enc >> 7);
        let b = u64::from((self.enc >> 6) & 1);
        let cd = u64::from((self.enc >> 4) & 3);
        let frac4 = u64::from(self.enc & 0xf);
        let biased_exp = if b == 1 { 1020 + cd } else { 1024 + cd };
        f64::from_bits((sign << 63) | (biased_exp << 52) | (frac4 << 48))
    }
}

impl fmt::Display for NZCV {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fmt_flag = |c: char, v| if v { c.to_ascii_uppercase() } else { c };
        write!(
            f,
            "#{}{}{}{}",
            fmt_flag('n', self.n),
            fmt_flag('z', self.z),
            fmt_flag('c', self.c),
            fmt_flag('v', self.v)
        )
    }
}

impl fmt::Display for UImm5 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.value)
    }
}

impl fmt::Display for Imm12 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.value())
    }
}

impl fmt::Display for SImm7Scaled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.value)
    }
}

impl fmt::Display for SImm9 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.value)
    }
}

impl fmt::Display for UImm12Scaled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.value)
    }
}

impl fmt::Display for ImmLogic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.value())
    }
}

impl fmt::Display for ImmShift {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.imm)
    }
}

impl fmt::Display for MoveWideConst {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.shift == 0 {
            write!(f, "#{}", self.bits)
        } else {
            write!(f, "#{}, LSL #{}", self.bits, self.shift * 16)
        }
    }
}

impl fmt::Display for FpImm8 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.to_f64())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn imm12_domain() {
        assert_eq!(
            Some(Imm12 {
                bits: 0,
                shift12: false
            }),
            Imm12::maybe_from_u64(0)
        );
        assert_eq!(
            Some(Imm12 {
                bits: 0xfff,
                shift12: false
            }),
            Imm12::maybe_from_u64(0xfff)
        );
        assert_eq!(
            Some(Imm12 {
                bits: 1,
                shift12: true
            }),
            Imm12::maybe_from_u64(0x1000)
        );
        assert_eq!(
            Some(Imm12 {
                bits: 0xfff,
                shift12: true
            }),
            Imm12::maybe_from_u64(0xfff000)
        );
        assert_eq!(None, Imm12::maybe_from_u64(0x1001));
        assert_eq!(None, Imm12::maybe_from_u64(0x1000000));

        // Round-trip: for any encodable value, value() recovers it and
        // re-encoding is stable.
        for v in [0u64, 1, 42, 0xfff, 0x1000, 0x42000, 0xfff000] {
            let imm = Imm12::maybe_from_u64(v).unwrap();
            assert_eq!(imm.value(), v);
            assert_eq!(Imm12::maybe_from_u64(imm.value()), Some(imm));
        }
    }

    #[test]
    fn imm_logical_test() {
        use OperandSize::*;
        assert_eq!(None, ImmLogic::maybe_from_u64(0, Size64));
        assert_eq!(None, ImmLogic::maybe_from_u64(u64::MAX, Size64));

        assert_eq!(
            Some(ImmLogic {
                value: 1,
                n: true,
                r: 0,
                s: 0,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(1, Size64)
        );

        assert_eq!(
            Some(ImmLogic {
                value: 2,
                n: true,
                r: 63,
                s: 0,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(2, Size64)
        );

        assert_eq!(None, ImmLogic::maybe_from_u64(5, Size64));
        assert_eq!(None, ImmLogic::maybe_from_u64(11, Size64));

        assert_eq!(
            Some(ImmLogic {
                value: 248,
                n: true,
                r: 61,
                s: 4,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(248, Size64)
        );

        assert_eq!(None, ImmLogic::maybe_from_u64(249, Size64));

        assert_eq!(
            Some(ImmLogic {
                value: 1920,
                n: true,
                r: 57,
                s: 3,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(1920, Size64)
        );

        assert_eq!(
            Some(ImmLogic {
                value: 0x7ffe,
                n: true,
                r: 63,
                s: 13,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(0x7ffe, Size64)
        );

        assert_eq!(
            Some(ImmLogic {
                value: 0x30000,
                n: true,
                r: 48,
                s: 1,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(0x30000, Size64)
        );

        assert_eq!(
            Some(ImmLogic {
                value: 0x100000,
                n: true,
                r: 44,
                s: 0,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(0x100000, Size64)
        );

        assert_eq!(
            Some(ImmLogic {
                value: u64::MAX - 1,
                n: true,
                r: 63,
                s: 62,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(u64::MAX - 1, Size64)
        );

        assert_eq!(
            Some(ImmLogic {
                value: 0xaaaaaaaaaaaaaaaa,
                n: false,
                r: 1,
                s: 60,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(0xaaaaaaaaaaaaaaaa, Size64)
        );

        assert_eq!(
            Some(ImmLogic {
                value: 0x8181818181818181,
                n: false,
                r: 1,
                s: 49,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(0x8181818181818181, Size64)
        );

        assert_eq!(
            Some(ImmLogic {
                value: 0xffc3ffc3ffc3ffc3,
                n: false,
                r: 10,
                s: 43,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(0xffc3ffc3ffc3ffc3, Size64)
        );

        assert_eq!(
            Some(ImmLogic {
                value: 0x100000001,
                n: false,
                r: 0,
                s: 0,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(0x100000001, Size64)
        );

        assert_eq!(
            Some(ImmLogic {
                value: 0x1111111111111111,
                n: false,
                r: 0,
                s: 56,
                size: Size64,
            }),
            ImmLogic::maybe_from_u64(0x1111111111111111, Size64)
        );

        // Exhaustive: decode every (n, s, r) encoding, re-encode, and
        // check the fields survive; also check the inverse is encodable.
        for n in 0..2 {
            let sizes: &[OperandSize] = if n == 0 {
                &[Size64, Size32]
            } else {
                &[Size64]
            };
            for s in 0..64 {
                for r in 0..64 {
                    let imm = get_logical_imm(n, s, r);
                    for &size in sizes {
                        let imm = if size == Size32 {
                            imm & 0xffff_ffff
                        } else {
                            imm
                        };
                        match ImmLogic::maybe_from_u64(imm, size) {
                            Some(ImmLogic { value, .. }) => {
                                assert_eq!(imm, value);
                                ImmLogic::maybe_from_u64(value, size).unwrap().invert();
                            }
                            None => assert_eq!(0, imm),
                        };
                    }
                }
            }
        }
    }

    // Repeat a value that has `width` bits across a 64-bit value.
    fn repeat(value: u64, width: u64) -> u64 {
        let mut result = value & ((1 << width) - 1);
        let mut i = width;
        while i < 64 {
            result |= result << i;
            i *= 2;
        }
        result
    }

    // Get the logical immediate, from the encoding N/R/S bits.
    fn get_logical_imm(n: u32, s: u32, r: u32) -> u64 {
        if n == 1 {
            if s == 0x3f {
                return 0;
            }
            let bits = (1u64 << (s + 1)) - 1;
            bits.rotate_right(r)
        } else {
            if (s >> 1) == 0x1f {
                return 0;
            }
            let mut width = 0x20;
            while width >= 0x2 {
                if (s & width) == 0 {
                    let mask = width - 1;
                    if (s & mask) == mask {
                        return 0;
                    }
                    let bits = (1u64 << ((s & mask) + 1)) - 1;
                    return repeat(bits.rotate_right(r & mask), width.into());
                }
                width >>= 1;
            }
            unreachable!();
        }
    }

    #[test]
    fn move_wide() {
        assert_eq!(
            Some(MoveWideConst { bits: 42, shift: 0 }),
            MoveWideConst::maybe_from_u64(42)
        );
        assert_eq!(
            Some(MoveWideConst {
                bits: 0xffff,
                shift: 3
            }),
            MoveWideConst::maybe_from_u64(0xffff_0000_0000_0000)
        );
        assert_eq!(None, MoveWideConst::maybe_from_u64(0x1_0001));
        let c = MoveWideConst::maybe_with_shift(7, 32).unwrap();
        assert_eq!(c.value(), 7u64 << 32);
    }

    #[test]
    fn fp_imm8() {
        // Exactly representable values round-trip.
        for v in [1.0f64, 2.0, 0.5, -1.0, 31.0, 0.125, -0.1875] {
            let imm = FpImm8::maybe_from_f64(v).unwrap();
            assert_eq!(imm.to_f64(), v);
        }
        // Out of exponent range or with too much mantissa.
        assert_eq!(None, FpImm8::maybe_from_f64(0.0));
        assert_eq!(None, FpImm8::maybe_from_f64(64.0));
        assert_eq!(None, FpImm8::maybe_from_f64(0.1));
        assert_eq!(None, FpImm8::maybe_from_f64(1.0 + f64::EPSILON));

        // f32 agrees with f64 where both apply.
        let a = FpImm8::maybe_from_f32(1.5f32).unwrap();
        let b = FpImm8::maybe_from_f64(1.5f64).unwrap();
        assert_eq!(a, b);
    }
}
