//! The seven RISC-V ABI variants and the register-file capabilities each one
//! implies.
//!
//! Grounded on `original_source/src/compiler/back/riscv/rv_abi.c`'s
//! `rv_abi_t` enumeration and the psABI's `ILP32`/`LP64` family tables: the
//! variant alone determines integer width, which floating-point registers
//! (if any) participate in argument passing, and the size at which structs
//! stop being register-candidates.

use std::fmt;

use crate::ir::types::PrimType;

/// One of the seven standard RISC-V ABI variants this backend targets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RiscvAbi {
    Ilp32,
    Ilp32E,
    Ilp32F,
    Ilp32D,
    Lp64,
    Lp64F,
    Lp64D,
}

impl RiscvAbi {
    /// Integer register width in bits: 32 for the `ILP32*` family, 64 for
    /// `LP64*`.
    pub fn xlen(self) -> u32 {
        match self {
            RiscvAbi::Ilp32 | RiscvAbi::Ilp32E | RiscvAbi::Ilp32F | RiscvAbi::Ilp32D => 32,
            RiscvAbi::Lp64 | RiscvAbi::Lp64F | RiscvAbi::Lp64D => 64,
        }
    }

    /// Widest floating-point value passed directly in an FPR, in bits. `0`
    /// means floats are passed in GPRs (soft-float as far as the calling
    /// convention is concerned).
    pub fn flen(self) -> u32 {
        match self {
            RiscvAbi::Ilp32 | RiscvAbi::Ilp32E | RiscvAbi::Lp64 => 0,
            RiscvAbi::Ilp32F | RiscvAbi::Lp64F => 32,
            RiscvAbi::Ilp32D | RiscvAbi::Lp64D => 64,
        }
    }

    /// Does this variant use the reduced 16-register "E" register file
    /// (`x0`-`x15` only, no `s2`-`s11`/`t3`-`t6`)?
    pub fn is_embedded(self) -> bool {
        matches!(self, RiscvAbi::Ilp32E)
    }

    /// Number of GPR argument registers available: 6 (`a0`-`a5`) for the `E`
    /// variant, 8 (`a0`-`a7`) otherwise.
    pub fn gpr_arg_count(self) -> usize {
        if self.is_embedded() {
            6
        } else {
            8
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RiscvAbi::Ilp32 => "ilp32",
            RiscvAbi::Ilp32E => "ilp32e",
            RiscvAbi::Ilp32F => "ilp32f",
            RiscvAbi::Ilp32D => "ilp32d",
            RiscvAbi::Lp64 => "lp64",
            RiscvAbi::Lp64F => "lp64f",
            RiscvAbi::Lp64D => "lp64d",
        }
    }
}

impl fmt::Display for RiscvAbi {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The fully-resolved target configuration instruction selection and the ABI
/// expander both read from. Built programmatically by the embedder; this
/// crate never parses a `-march`/`-mabi` string itself (see the crate's
/// configuration notes).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RiscvProfile {
    pub abi: RiscvAbi,
    /// Is the `M` (integer multiply/divide) extension present? When false,
    /// the codegen driver must soften `mul`/`div`/`rem` to library calls.
    pub has_m_ext: bool,
    /// Is the `F` (single-precision float) extension present? When false,
    /// `f32` arithmetic is softened to library calls regardless of how the
    /// ABI passes `f32` arguments.
    pub has_f_ext: bool,
    /// Is the `D` (double-precision float) extension present, same caveat
    /// as `has_f_ext` for `f64`.
    pub has_d_ext: bool,
}

impl RiscvProfile {
    /// A profile with every extension the ABI variant's float-register
    /// eligibility implies: `new(Ilp32)` has no hardware float at all,
    /// `new(Lp64D)` has both `F` and `D`. Callers targeting a core with a
    /// narrower hardware feature set than its ABI suggests (e.g. a soft-
    /// float `D` ABI on `M`-only hardware) override the fields directly.
    pub fn new(abi: RiscvAbi) -> Self {
        let flen = abi.flen();
        RiscvProfile { abi, has_m_ext: true, has_f_ext: flen >= 32, has_d_ext: flen >= 64 }
    }

    pub fn xlen(self) -> u32 {
        self.abi.xlen()
    }

    pub fn flen(self) -> u32 {
        self.abi.flen()
    }

    /// Does this profile pass floating-point arguments in FPRs at all?
    pub fn has_hardware_float(self) -> bool {
        self.abi.flen() > 0
    }

    /// Does this profile's hardware support arithmetic directly on `ty`?
    /// Always true for integer/bool kinds (the base `I` extension covers
    /// them); `f32`/`f64` defer to `has_f_ext`/`has_d_ext`.
    pub fn has_hardware_arith(self, ty: PrimType) -> bool {
        match ty {
            PrimType::F32 => self.has_f_ext,
            PrimType::F64 => self.has_d_ext,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_abi_has_six_arg_regs() {
        assert_eq!(RiscvAbi::Ilp32E.gpr_arg_count(), 6);
        assert_eq!(RiscvAbi::Lp64.gpr_arg_count(), 8);
    }

    #[test]
    fn lp64d_has_64_bit_float_args() {
        assert_eq!(RiscvAbi::Lp64D.flen(), 64);
        assert_eq!(RiscvAbi::Lp64.flen(), 0);
    }
}
