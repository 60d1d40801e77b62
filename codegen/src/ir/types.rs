//! Primitive IR types.
//!
//! Every value in the IR — a variable, a constant, an operand — carries one
//! of these. There is no aggregate primitive; structs only ever appear as
//! stack frames or as ABI-lowered sequences of these primitives.

use std::fmt;

/// A primitive kind, fixed in size and signedness.
///
/// The low bit of the discriminant distinguishes unsigned (set) from signed
/// (clear) integer kinds; [`PrimType::is_unsigned`] and several passes rely
/// on that parity instead of a separate lookup table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum PrimType {
    S8 = 0,
    U8 = 1,
    S16 = 2,
    U16 = 3,
    S32 = 4,
    U32 = 5,
    S64 = 6,
    U64 = 7,
    S128 = 8,
    U128 = 9,
    Bool = 10,
    F32 = 11,
    F64 = 12,
}

/// All primitive kinds, in the fixed order used by `PrimType as u8` and the
/// textual/mangled names in [`PrimType::name`].
pub const ALL_PRIM_TYPES: [PrimType; 13] = [
    PrimType::S8,
    PrimType::U8,
    PrimType::S16,
    PrimType::U16,
    PrimType::S32,
    PrimType::U32,
    PrimType::S64,
    PrimType::U64,
    PrimType::S128,
    PrimType::U128,
    PrimType::Bool,
    PrimType::F32,
    PrimType::F64,
]
;

impl PrimType {
    /// Size in bytes. `bool` is 1.
    pub fn size(self) -> u32 {
        match self {
            PrimType::S8 | PrimType::U8 | PrimType::Bool => 1,
            PrimType::S16 | PrimType::U16 => 2,
            PrimType::S32 | PrimType::U32 | PrimType::F32 => 4,
            PrimType::S64 | PrimType::U64 | PrimType::F64 => 8,
            PrimType::S128 | PrimType::U128 => 16,
        }
    }

    /// Size in bits.
    pub fn bits(self) -> u32 {
        self.size() * 8
    }

    /// Is this an unsigned integer kind? Relies on the low discriminant bit.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            PrimType::U8 | PrimType::U16 | PrimType::U32 | PrimType::U64 | PrimType::U128
        )
    }

    /// Is this a signed integer kind?
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimType::S8 | PrimType::S16 | PrimType::S32 | PrimType::S64 | PrimType::S128
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimType::F32 | PrimType::F64)
    }

    pub fn is_bool(self) -> bool {
        matches!(self, PrimType::Bool)
    }

    /// The unsigned kind of the same width (used by `snez`/`seqz`/interp zero
    /// tests and by strength reduction's mask construction).
    pub fn to_unsigned(self) -> PrimType {
        match self {
            PrimType::S8 | PrimType::U8 => PrimType::U8,
            PrimType::S16 | PrimType::U16 => PrimType::U16,
            PrimType::S32 | PrimType::U32 => PrimType::U32,
            PrimType::S64 | PrimType::U64 => PrimType::U64,
            PrimType::S128 | PrimType::U128 => PrimType::U128,
            PrimType::Bool => PrimType::Bool,
            PrimType::F32 => PrimType::F32,
            PrimType::F64 => PrimType::F64,
        }
    }

    /// Canonical name, used both in the textual IR form and in
    /// `__lily_<op>_<prim>` library-call mangling.
    pub fn name(self) -> &'static str {
        match self {
            PrimType::S8 => "s8",
            PrimType::U8 => "u8",
            PrimType::S16 => "s16",
            PrimType::U16 => "u16",
            PrimType::S32 => "s32",
            PrimType::U32 => "u32",
            PrimType::S64 => "s64",
            PrimType::U64 => "u64",
            PrimType::S128 => "s128",
            PrimType::U128 => "u128",
            PrimType::Bool => "bool",
            PrimType::F32 => "f32",
            PrimType::F64 => "f64",
        }
    }

    pub fn parse(name: &str) -> Option<PrimType> {
        ALL_PRIM_TYPES.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for PrimType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
